use clap::{Args, Parser, Subcommand};
use mse_common::{FeePercent, Money};
use settlement_engine::db_types::BillingInterval;

#[derive(Parser, Debug)]
#[command(name = "mse", version, about = "Operator tool for the merchant settlement engine")]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the current (non-secret) configuration
    Env,
    /// Apply any outstanding database migrations
    Migrate,
    #[command(subcommand)]
    Catalog(CatalogCommand),
    /// Record a new pending payment. Checkout normally does this.
    Payment(NewPaymentParams),
    /// Settle a pending payment after the gateway has confirmed it
    Settle(SettleParams),
    /// Mark a pending payment as failed
    Fail {
        payment_id: i64,
        #[arg(short, long)]
        reason: String,
    },
    /// Refund a settled payment
    Refund {
        payment_id: i64,
        #[arg(short, long)]
        reason: String,
        #[arg(short = 'a', long = "approved-by")]
        approved_by: String,
    },
    #[command(subcommand)]
    Payout(PayoutCommand),
    #[command(subcommand)]
    Subscription(SubscriptionCommand),
    #[command(subcommand)]
    Coupon(CouponCommand),
    /// Show a merchant's balances
    Balance { merchant_id: i64 },
    /// Show a merchant's ledger
    Ledger { merchant_id: i64 },
    /// Check that a merchant's balance matches the sum of its ledger
    Reconcile { merchant_id: i64 },
    /// Show a merchant's daily counters
    Stats {
        merchant_id: i64,
        /// How many days back to report, including today
        #[arg(short, long, default_value = "30")]
        days: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum CatalogCommand {
    /// Create a fee plan
    Plan { name: String, fee: FeePercent },
    Merchant {
        name: String,
        #[arg(short, long)]
        plan: Option<i64>,
    },
    Service { merchant_id: i64, name: String },
    Tier {
        service_id: i64,
        name: String,
        price: Money,
        /// Day, Week, Month, Year or Lifetime
        interval: BillingInterval,
        #[arg(short, long, default_value = "1")]
        count: i64,
    },
    Coupon {
        merchant_id: i64,
        code: String,
        /// Whole percent, 0 - 100
        discount: i64,
        #[arg(short, long)]
        max_uses: Option<i64>,
        /// Restrict the coupon to a single service
        #[arg(short, long)]
        service: Option<i64>,
    },
}

#[derive(Debug, Args)]
pub struct NewPaymentParams {
    /// The gateway's reference for the charge
    #[arg(short = 'g', long = "ref")]
    pub gateway_ref: String,
    #[arg(short, long)]
    pub payer: String,
    #[arg(short, long)]
    pub merchant: i64,
    #[arg(short, long)]
    pub service: i64,
    #[arg(short, long)]
    pub tier: i64,
    #[arg(short, long)]
    pub amount: Money,
    #[arg(short, long)]
    pub coupon: Option<i64>,
    /// The discount given at checkout. With --coupon it must be the coupon's discount on the tier price.
    #[arg(short, long, default_value = "0")]
    pub discount: Money,
}

#[derive(Debug, Args)]
pub struct SettleParams {
    /// The payment id, or the gateway reference when --by-ref is given
    pub payment: String,
    #[arg(short = 'r', long = "by-ref")]
    pub by_ref: bool,
    /// The gateway's transaction id
    #[arg(short = 'x', long = "tx")]
    pub provider_tx_id: String,
    /// The raw gateway response, as JSON
    #[arg(short = 'j', long = "response", default_value = "{}")]
    pub provider_response: String,
}

#[derive(Debug, Subcommand)]
pub enum PayoutCommand {
    Request {
        merchant_id: i64,
        amount: Money,
        #[arg(short, long, default_value = "bank_transfer")]
        method: String,
        #[arg(short, long)]
        destination: String,
    },
    Approve {
        payout_id: i64,
        #[arg(short, long)]
        reviewer: String,
    },
    Reject {
        payout_id: i64,
        #[arg(short = 'v', long)]
        reviewer: String,
        #[arg(short, long)]
        reason: String,
    },
    Complete { payout_id: i64 },
    List { merchant_id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum SubscriptionCommand {
    /// Grant one period of a tier without a settlement
    Grant {
        #[arg(short, long)]
        payer: String,
        #[arg(short, long)]
        merchant: i64,
        #[arg(short, long)]
        service: i64,
        #[arg(short, long)]
        tier: i64,
        /// Attach the subscription to this failed payment
        #[arg(short = 'y', long)]
        payment: Option<i64>,
    },
    List { payer: String },
}

#[derive(Debug, Subcommand)]
pub enum CouponCommand {
    Redeem {
        code: String,
        #[arg(short, long)]
        payer: String,
        #[arg(short, long)]
        subscription: i64,
    },
    Redemptions { code: String },
}

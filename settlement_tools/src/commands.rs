use std::env::{self, VarError};

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use log::*;
use settlement_engine::{
    db_types::{NewCoupon, NewMerchant, NewPayment, NewTier},
    events::EventProducers,
    AccountApi,
    CatalogManagement,
    CouponApi,
    InsertPaymentResult,
    PayoutApi,
    SettlementError,
    SettlementFlowApi,
    SqliteDatabase,
    SubscriptionApi,
};

use crate::{
    cli::{CatalogCommand, Command, CouponCommand, NewPaymentParams, PayoutCommand, SettleParams, SubscriptionCommand},
    config::EngineConfig,
    formatting::*,
};

pub async fn run(command: Command, config: EngineConfig) -> Result<()> {
    if let Command::Env = command {
        print_env(&config);
        return Ok(());
    }
    let force_migrations = matches!(command, Command::Migrate);
    let db = connect(&config, force_migrations).await?;
    match command {
        Command::Env | Command::Migrate => {},
        Command::Catalog(cmd) => run_catalog_command(&db, cmd).await?,
        Command::Payment(params) => insert_payment(&db, params).await?,
        Command::Settle(params) => settle(&db, &config, params).await?,
        Command::Fail { payment_id, reason } => {
            let payment = flow_api(&db, &config).fail_payment(payment_id, &reason).await?;
            println!("Payment #{} ({}) is now {}", payment.id, payment.gateway_ref, payment.status);
        },
        Command::Refund { payment_id, reason, approved_by } => {
            let outcome = flow_api(&db, &config).refund_payment(payment_id, &reason, &approved_by).await?;
            print!("{}", format_refund(&outcome)?);
        },
        Command::Payout(cmd) => run_payout_command(&db, cmd).await?,
        Command::Subscription(cmd) => run_subscription_command(&db, cmd).await?,
        Command::Coupon(cmd) => run_coupon_command(&db, cmd).await?,
        Command::Balance { merchant_id } => {
            let api = AccountApi::new(db.clone());
            let merchant =
                api.merchant(merchant_id).await?.ok_or(SettlementError::MerchantNotFound(merchant_id))?;
            print!("{}", format_merchant(&merchant)?);
            let mtd = api.month_to_date_revenue(merchant_id, Utc::now()).await?;
            println!("Revenue this month: {mtd}");
        },
        Command::Ledger { merchant_id } => {
            let statement = AccountApi::new(db.clone()).statement(merchant_id).await?;
            println!("Ledger for merchant #{}: {}", statement.merchant.id, statement.merchant.name);
            println!("{}", format_ledger(&statement.entries));
            println!("Credits: {}  Debits: {}", statement.total_credits(), statement.total_debits());
        },
        Command::Reconcile { merchant_id } => {
            let rec = AccountApi::new(db.clone()).reconcile(merchant_id).await?;
            println!("{}", format_reconciliation(&rec));
            if !rec.is_balanced() {
                return Err(anyhow!("Merchant #{merchant_id} failed reconciliation"));
            }
        },
        Command::Stats { merchant_id, days } => {
            let until = Utc::now();
            let since = until - Duration::days((days - 1).max(0));
            let stats = AccountApi::new(db.clone()).daily_stats(merchant_id, since, until).await?;
            println!("{}", format_stats(&stats));
        },
    }
    Ok(())
}

async fn connect(config: &EngineConfig, force_migrations: bool) -> Result<SqliteDatabase> {
    let db = SqliteDatabase::new_with_options(&config.database_url, config.max_connections, config.busy_timeout)
        .await
        .with_context(|| format!("Could not open the database at {}", config.database_url))?;
    if config.auto_migrate || force_migrations {
        db.run_migrations().await?;
    } else {
        debug!("🗃️ Skipping migrations. MSE_AUTO_MIGRATE is off");
    }
    Ok(db)
}

fn flow_api(db: &SqliteDatabase, config: &EngineConfig) -> SettlementFlowApi<SqliteDatabase> {
    SettlementFlowApi::new(db.clone(), EventProducers::default()).with_default_fee(config.default_fee)
}

async fn run_catalog_command(db: &SqliteDatabase, cmd: CatalogCommand) -> Result<()> {
    match cmd {
        CatalogCommand::Plan { name, fee } => {
            let plan = db.create_plan(&name, fee).await?;
            println!("Plan #{} '{}' created, charging {}", plan.id, plan.name, plan.fee_bps);
        },
        CatalogCommand::Merchant { name, plan } => {
            let mut merchant = NewMerchant::new(name);
            if let Some(plan_id) = plan {
                merchant = merchant.with_plan(plan_id);
            }
            let merchant = db.create_merchant(merchant).await?;
            println!("Merchant #{} '{}' created", merchant.id, merchant.name);
        },
        CatalogCommand::Service { merchant_id, name } => {
            let service = db.create_service(merchant_id, &name).await?;
            println!("Service #{} '{}' created for merchant #{merchant_id}", service.id, service.name);
        },
        CatalogCommand::Tier { service_id, name, price, interval, count } => {
            let tier = db.create_tier(NewTier::new(service_id, name, price, interval).with_interval_count(count)).await?;
            println!(
                "Tier #{} '{}' created: {} for {} x {}",
                tier.id, tier.name, tier.price, tier.interval_count, tier.billing_interval
            );
        },
        CatalogCommand::Coupon { merchant_id, code, discount, max_uses, service } => {
            let mut coupon = NewCoupon::new(merchant_id, code, discount);
            if let Some(max) = max_uses {
                coupon = coupon.with_max_uses(max);
            }
            if let Some(service_id) = service {
                coupon = coupon.for_service(service_id);
            }
            let coupon = db.create_coupon(coupon).await?;
            println!("Coupon #{} '{}' created: {}% off", coupon.id, coupon.code, coupon.discount_percent);
        },
    }
    Ok(())
}

async fn insert_payment(db: &SqliteDatabase, params: NewPaymentParams) -> Result<()> {
    let mut payment =
        NewPayment::new(params.gateway_ref, params.payer, params.merchant, params.service, params.tier, params.amount);
    if let Some(coupon_id) = params.coupon {
        payment = payment.with_coupon(coupon_id, params.discount);
    }
    match db.insert_payment(payment).await? {
        InsertPaymentResult::Inserted(id) => println!("Pending payment #{id} recorded"),
        InsertPaymentResult::AlreadyExists(id) => println!("Payment #{id} already exists with this reference"),
    }
    Ok(())
}

async fn settle(db: &SqliteDatabase, config: &EngineConfig, params: SettleParams) -> Result<()> {
    let response: serde_json::Value =
        serde_json::from_str(&params.provider_response).context("The gateway response is not valid JSON")?;
    let api = flow_api(db, config);
    let result = if params.by_ref {
        api.settle_by_gateway_ref(&params.payment, &params.provider_tx_id, &response).await
    } else {
        let id = params.payment.parse::<i64>().context("The payment id must be a number. Use --by-ref for references")?;
        api.settle_payment(id, &params.provider_tx_id, &response).await
    };
    match result {
        Ok(outcome) => print!("{}", format_settlement(&outcome)?),
        Err(e) if e.is_benign_duplicate() => println!("Nothing to do. {e}"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn run_payout_command(db: &SqliteDatabase, cmd: PayoutCommand) -> Result<()> {
    let api = PayoutApi::new(db.clone(), EventProducers::default());
    let payout = match cmd {
        PayoutCommand::Request { merchant_id, amount, method, destination } => {
            api.request_payout(merchant_id, amount, &method, &destination).await?
        },
        PayoutCommand::Approve { payout_id, reviewer } => api.approve_payout(payout_id, &reviewer).await?,
        PayoutCommand::Reject { payout_id, reviewer, reason } => {
            api.reject_payout(payout_id, &reviewer, &reason).await?
        },
        PayoutCommand::Complete { payout_id } => api.complete_payout(payout_id).await?,
        PayoutCommand::List { merchant_id } => {
            let payouts = AccountApi::new(db.clone()).payouts_for_merchant(merchant_id).await?;
            println!("{}", format_payouts(&payouts));
            return Ok(());
        },
    };
    println!("{}", format_payouts(&[payout]));
    Ok(())
}

async fn run_subscription_command(db: &SqliteDatabase, cmd: SubscriptionCommand) -> Result<()> {
    let api = SubscriptionApi::new(db.clone());
    match cmd {
        SubscriptionCommand::Grant { payer, merchant, service, tier, payment } => {
            let (sub, outcome) = api.create_or_extend(&payer, merchant, service, tier, payment).await?;
            println!("{outcome:?}");
            println!("{}", format_subscriptions(&[sub]));
        },
        SubscriptionCommand::List { payer } => {
            let subs = api.subscriptions_for_payer(&payer).await?;
            println!("{}", format_subscriptions(&subs));
        },
    }
    Ok(())
}

async fn run_coupon_command(db: &SqliteDatabase, cmd: CouponCommand) -> Result<()> {
    let api = CouponApi::new(db.clone());
    match cmd {
        CouponCommand::Redeem { code, payer, subscription } => {
            let redemption = api.redeem_code(&code, &payer, subscription).await?;
            println!("Redemption #{} recorded for {payer}", redemption.id);
        },
        CouponCommand::Redemptions { code } => {
            let coupon = api.coupon_by_code(&code).await?.ok_or_else(|| SettlementError::CouponNotFound(code))?;
            let redemptions = api.redemptions(coupon.id).await?;
            let max = coupon.max_uses.map(|m| m.to_string()).unwrap_or_else(|| "unlimited".into());
            println!("{}: {} of {max} uses", coupon.code, coupon.current_uses);
            redemptions.iter().for_each(|r| {
                println!("  #{:<6} {:<24} subscription #{} {}", r.id, r.payer_id, r.subscription_id, r.created_at);
            });
        },
    }
    Ok(())
}

fn print_env(config: &EngineConfig) {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 6] = [
        "RUST_LOG",
        "MSE_DATABASE_URL",
        "MSE_MAX_CONNECTIONS",
        "MSE_BUSY_TIMEOUT_MS",
        "MSE_DEFAULT_FEE_PERCENT",
        "MSE_AUTO_MIGRATE",
    ];
    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    });
    println!("Effective configuration:");
    println!("  {:<35} {}", "database url", config.database_url);
    println!("  {:<35} {}", "max connections", config.max_connections);
    println!("  {:<35} {}ms", "busy timeout", config.busy_timeout.as_millis());
    println!("  {:<35} {}", "default platform fee", config.default_fee);
    println!("  {:<35} {}", "auto migrate", config.auto_migrate);
}

use mse_common::Money;

use crate::{
    db::traits::SettlementError,
    db_types::{
        Coupon,
        CouponRedemption,
        LedgerEntry,
        MerchantAccount,
        MerchantDailyStats,
        Payment,
        PayoutRequest,
        RefundRecord,
        Subscription,
        Tier,
    },
};

/// The `AccountManagement` trait defines read-only queries over merchant accounts, their ledgers, and the payments,
/// subscriptions and payouts associated with them.
///
/// The [`SettlementDatabase`](crate::SettlementDatabase) trait handles the actual machinery of moving money.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    /// Fetches the merchant account, including the fee of its plan. If no account exists, `None` is returned.
    async fn fetch_merchant(&self, merchant_id: i64) -> Result<Option<MerchantAccount>, SettlementError>;

    /// All ledger entries for the merchant, oldest first.
    async fn fetch_ledger_for_merchant(&self, merchant_id: i64) -> Result<Vec<LedgerEntry>, SettlementError>;

    /// The signed sum of all ledger entries for the merchant.
    async fn fetch_ledger_total(&self, merchant_id: i64) -> Result<Money, SettlementError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, SettlementError>;

    async fn fetch_payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<Option<Payment>, SettlementError>;

    async fn fetch_subscription(&self, subscription_id: i64) -> Result<Option<Subscription>, SettlementError>;

    /// All subscriptions held by the payer, newest first.
    async fn fetch_subscriptions_for_payer(&self, payer_id: &str) -> Result<Vec<Subscription>, SettlementError>;

    async fn fetch_tier(&self, tier_id: i64) -> Result<Option<Tier>, SettlementError>;

    async fn fetch_coupon(&self, coupon_id: i64) -> Result<Option<Coupon>, SettlementError>;

    async fn fetch_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, SettlementError>;

    async fn fetch_redemptions_for_coupon(&self, coupon_id: i64) -> Result<Vec<CouponRedemption>, SettlementError>;

    async fn fetch_payout(&self, payout_id: i64) -> Result<Option<PayoutRequest>, SettlementError>;

    async fn fetch_payouts_for_merchant(&self, merchant_id: i64) -> Result<Vec<PayoutRequest>, SettlementError>;

    async fn fetch_refunds_for_payment(&self, payment_id: i64) -> Result<Vec<RefundRecord>, SettlementError>;

    /// Daily dashboard counters for the merchant for days in `[since, until]` (inclusive, `YYYY-MM-DD`).
    async fn fetch_daily_stats(
        &self,
        merchant_id: i64,
        since: &str,
        until: &str,
    ) -> Result<Vec<MerchantDailyStats>, SettlementError>;
}

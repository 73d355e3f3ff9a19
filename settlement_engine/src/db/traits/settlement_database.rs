use mse_common::{FeePercent, Money};

use crate::{
    db::traits::{RefundOutcome, SettlementError, SettlementOutcome, SubscriptionOutcome},
    db_types::{CouponRedemption, Payment, PayoutRequest, Subscription},
};

/// This trait defines the state-changing behaviour for backends supporting the settlement engine.
///
/// Every method is a single atomic unit of work: either all of its side effects are committed, or none are. Backends
/// must route every change to a merchant's available balance through one accounting primitive that writes the balance
/// and appends the matching ledger entry together.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Settles a `Pending` payment, in a single atomic transaction:
    /// * the payment is marked `Success` and the provider transaction id and response are stored,
    /// * the platform fee is calculated from the merchant's plan (or `default_fee` if there is no plan),
    /// * the payer's subscription for the service is created or extended,
    /// * the net amount is credited to the merchant's ledger,
    /// * the payment's coupon, if any, is redeemed.
    ///
    /// If the payment is not `Pending`, `AlreadyProcessed` is returned and nothing changes.
    async fn settle_payment(
        &self,
        payment_id: i64,
        provider_tx_id: &str,
        provider_response: &serde_json::Value,
        default_fee: FeePercent,
    ) -> Result<SettlementOutcome, SettlementError>;

    /// Marks a `Pending` payment as `Failed`. There is no balance effect.
    async fn fail_payment(&self, payment_id: i64, reason: &str) -> Result<Payment, SettlementError>;

    /// Reverses a `Success` payment. The full gross amount is debited from the merchant, a refund record is written
    /// and the associated subscription is cancelled.
    ///
    /// ## Failure modes:
    /// - `AlreadyProcessed` if the payment has already been refunded.
    /// - `InvalidState` if the payment is `Pending` or `Failed`.
    /// - `InsufficientFunds` if the merchant's available balance cannot cover the refund.
    async fn refund_payment(
        &self,
        payment_id: i64,
        reason: &str,
        approved_by: &str,
    ) -> Result<RefundOutcome, SettlementError>;

    /// Creates or extends the payer's subscription to `service_id` with the interval of `tier_id`, in its own
    /// transaction. The tier must belong to the service, and the service to the merchant.
    ///
    /// With a `payment_id`, the subscription is also linked to that payment. Only an unlinked `Failed` payment by the
    /// same payer to the same merchant and service can be linked. Anything else is an `InvalidState` and nothing is
    /// granted.
    async fn create_or_extend_subscription(
        &self,
        payer_id: &str,
        merchant_id: i64,
        service_id: i64,
        tier_id: i64,
        payment_id: Option<i64>,
    ) -> Result<(Subscription, SubscriptionOutcome), SettlementError>;

    /// Records the redemption of a coupon by a payer against a subscription, incrementing the coupon's use count.
    async fn redeem_coupon(
        &self,
        coupon_id: i64,
        payer_id: &str,
        subscription_id: i64,
    ) -> Result<CouponRedemption, SettlementError>;

    /// Reserves `amount` from the merchant's available balance and records a `Pending` payout request.
    async fn request_payout(
        &self,
        merchant_id: i64,
        amount: Money,
        method: &str,
        destination: &str,
    ) -> Result<PayoutRequest, SettlementError>;

    /// `Pending` -> `Approved`
    async fn approve_payout(&self, payout_id: i64, reviewer: &str) -> Result<PayoutRequest, SettlementError>;

    /// `Pending` -> `Rejected`. The reserved funds are credited back to the merchant in the same transaction.
    async fn reject_payout(&self, payout_id: i64, reviewer: &str, reason: &str)
        -> Result<PayoutRequest, SettlementError>;

    /// `Approved` -> `Completed`
    async fn complete_payout(&self, payout_id: i64) -> Result<PayoutRequest, SettlementError>;

    /// Updates the denormalised dashboard counters for a settlement. This is deliberately outside the settlement
    /// transaction and may lag behind the ledger.
    async fn record_settlement_stats(&self, outcome: &SettlementOutcome) -> Result<(), SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}

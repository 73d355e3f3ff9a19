use std::fmt::Debug;

use log::*;
use mse_common::FeePercent;

use crate::{
    db::traits::{AccountManagement, RefundOutcome, SettlementDatabase, SettlementError, SettlementOutcome},
    db_types::Payment,
    events::{EventProducers, PaymentRefundedEvent, PaymentSettledEvent},
};

/// `SettlementFlowApi` is the primary API for moving payments through their lifecycle in response to gateway
/// notifications and operator actions.
///
/// Each call is a single atomic unit of work in the backend. Side effects that are not part of the accounting record
/// (dashboard counters and event hooks) run only after the backend has committed.
pub struct SettlementFlowApi<B> {
    db: B,
    producers: EventProducers,
    default_fee: FeePercent,
}

impl<B> Debug for SettlementFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementFlowApi (default fee {})", self.default_fee)
    }
}

impl<B> SettlementFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, default_fee: FeePercent::default() }
    }

    /// Sets the fee charged to merchants that are not on a plan.
    pub fn with_default_fee(mut self, fee: FeePercent) -> Self {
        self.default_fee = fee;
        self
    }

    pub fn default_fee(&self) -> FeePercent {
        self.default_fee
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> SettlementFlowApi<B>
where B: SettlementDatabase
{
    /// Settles a pending payment after the gateway has confirmed the charge.
    ///
    /// The platform fee is deducted, the net amount is credited to the merchant, the payer's subscription is created or
    /// extended and the payment's coupon, if any, is redeemed. All of this happens exactly once: a second call for the
    /// same payment fails with `AlreadyProcessed` and changes nothing.
    pub async fn settle_payment(
        &self,
        payment_id: i64,
        provider_tx_id: &str,
        provider_response: &serde_json::Value,
    ) -> Result<SettlementOutcome, SettlementError> {
        trace!("💰️ Settling payment #{payment_id} (provider tx {provider_tx_id})");
        let outcome = self.db.settle_payment(payment_id, provider_tx_id, provider_response, self.default_fee).await?;
        info!(
            "💰️ Payment #{payment_id} settled. Merchant #{} credited {} after a fee of {}",
            outcome.payment.merchant_id, outcome.net_amount, outcome.platform_fee
        );
        if let Err(e) = self.db.record_settlement_stats(&outcome).await {
            warn!("💰️ Could not update the dashboard counters for payment #{payment_id}. {e}");
        }
        self.producers.publish_payment_settled(PaymentSettledEvent::new(outcome.clone())).await;
        Ok(outcome)
    }

    /// Marks a pending payment as failed. No money moves.
    pub async fn fail_payment(&self, payment_id: i64, reason: &str) -> Result<Payment, SettlementError> {
        let payment = self.db.fail_payment(payment_id, reason).await?;
        info!("💰️ Payment #{payment_id} failed: {reason}");
        Ok(payment)
    }

    /// Reverses a settled payment. The merchant is debited the full amount the payer was charged (the platform fee is
    /// not returned to the merchant), and the subscription the payment paid for is cancelled.
    pub async fn refund_payment(
        &self,
        payment_id: i64,
        reason: &str,
        approved_by: &str,
    ) -> Result<RefundOutcome, SettlementError> {
        trace!("↩️ Refunding payment #{payment_id} on the authority of {approved_by}");
        let outcome = self.db.refund_payment(payment_id, reason, approved_by).await?;
        info!(
            "↩️ Payment #{payment_id} refunded. {} debited from merchant #{}",
            outcome.refund.amount, outcome.payment.merchant_id
        );
        self.producers.publish_payment_refunded(PaymentRefundedEvent::new(outcome.clone())).await;
        Ok(outcome)
    }
}

impl<B> SettlementFlowApi<B>
where B: SettlementDatabase + AccountManagement
{
    /// Settles the payment identified by the gateway's reference, which is what gateway callbacks carry.
    pub async fn settle_by_gateway_ref(
        &self,
        gateway_ref: &str,
        provider_tx_id: &str,
        provider_response: &serde_json::Value,
    ) -> Result<SettlementOutcome, SettlementError> {
        let payment = self
            .db
            .fetch_payment_by_gateway_ref(gateway_ref)
            .await?
            .ok_or_else(|| SettlementError::PaymentNotFound(gateway_ref.to_string()))?;
        self.settle_payment(payment.id, provider_tx_id, provider_response).await
    }
}

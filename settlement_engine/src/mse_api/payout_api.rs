use std::fmt::Debug;

use log::*;
use mse_common::Money;

use crate::{
    db::traits::{SettlementDatabase, SettlementError},
    db_types::{PayoutRequest, PayoutStatus},
    events::{EventProducers, PayoutStatusChangedEvent},
};

/// Merchant withdrawals.
///
/// Requesting a payout reserves the funds immediately, so the same balance cannot be withdrawn twice while a request is
/// under review. The engine only tracks the review state; moving the money to the merchant happens elsewhere.
///
/// | From \ To | Approved | Rejected            | Completed |
/// |-----------|----------|---------------------|-----------|
/// | Pending   | Ok       | Ok, funds returned  | Err       |
/// | Approved  | Err      | Err                 | Ok        |
/// | Rejected  | Err      | Err                 | Err       |
/// | Completed | Err      | Err                 | Err       |
pub struct PayoutApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PayoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutApi")
    }
}

impl<B> PayoutApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> PayoutApi<B>
where B: SettlementDatabase
{
    /// Debits `amount` from the merchant's available balance and opens a `Pending` payout request for it.
    ///
    /// Fails with `InsufficientFunds` if the balance cannot cover the request. Nothing is written in that case.
    pub async fn request_payout(
        &self,
        merchant_id: i64,
        amount: Money,
        method: &str,
        destination: &str,
    ) -> Result<PayoutRequest, SettlementError> {
        let payout = self.db.request_payout(merchant_id, amount, method, destination).await?;
        info!("🏦️ Payout request #{} for {amount} opened for merchant #{merchant_id}", payout.id);
        Ok(payout)
    }

    pub async fn approve_payout(&self, payout_id: i64, reviewer: &str) -> Result<PayoutRequest, SettlementError> {
        let payout = self.db.approve_payout(payout_id, reviewer).await?;
        self.notify(payout.clone(), PayoutStatus::Pending).await;
        Ok(payout)
    }

    /// Rejects a pending request and returns the reserved funds to the merchant's available balance.
    pub async fn reject_payout(
        &self,
        payout_id: i64,
        reviewer: &str,
        reason: &str,
    ) -> Result<PayoutRequest, SettlementError> {
        let payout = self.db.reject_payout(payout_id, reviewer, reason).await?;
        self.notify(payout.clone(), PayoutStatus::Pending).await;
        Ok(payout)
    }

    /// Marks an approved request as paid out.
    pub async fn complete_payout(&self, payout_id: i64) -> Result<PayoutRequest, SettlementError> {
        let payout = self.db.complete_payout(payout_id).await?;
        self.notify(payout.clone(), PayoutStatus::Approved).await;
        Ok(payout)
    }

    async fn notify(&self, payout: PayoutRequest, old_status: PayoutStatus) {
        info!("🏦️ Payout request #{} is now {} (was {old_status})", payout.id, payout.status);
        self.producers.publish_payout_status_changed(PayoutStatusChangedEvent::new(payout, old_status)).await;
    }
}

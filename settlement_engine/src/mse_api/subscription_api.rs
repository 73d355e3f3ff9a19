use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db::traits::{AccountManagement, SettlementDatabase, SettlementError, SubscriptionOutcome},
    db_types::Subscription,
};

/// Subscription entitlements.
///
/// Paid subscriptions are normally granted by [`SettlementFlowApi`](crate::SettlementFlowApi) as part of settling a
/// payment. This API exposes the same lifecycle rules directly, for complimentary grants and support tooling.
pub struct SubscriptionApi<B> {
    db: B,
}

impl<B> Debug for SubscriptionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SubscriptionApi")
    }
}

impl<B> SubscriptionApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> SubscriptionApi<B>
where B: SettlementDatabase
{
    /// Grants one period of `tier_id` to the payer. A current subscription to the service is extended from its
    /// expiry date; otherwise a new subscription starts now.
    ///
    /// `payment_id` links the grant to a failed payment by the same payer that was fulfilled by hand.
    pub async fn create_or_extend(
        &self,
        payer_id: &str,
        merchant_id: i64,
        service_id: i64,
        tier_id: i64,
        payment_id: Option<i64>,
    ) -> Result<(Subscription, SubscriptionOutcome), SettlementError> {
        let (sub, outcome) =
            self.db.create_or_extend_subscription(payer_id, merchant_id, service_id, tier_id, payment_id).await?;
        info!("🗓️ Subscription #{} for {payer_id} {:?}", sub.id, outcome);
        Ok((sub, outcome))
    }
}

impl<B> SubscriptionApi<B>
where B: AccountManagement
{
    pub async fn subscriptions_for_payer(&self, payer_id: &str) -> Result<Vec<Subscription>, SettlementError> {
        self.db.fetch_subscriptions_for_payer(payer_id).await
    }

    /// The payer's current subscription to the service at `now`, if they have one.
    pub async fn current_subscription(
        &self,
        payer_id: &str,
        service_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, SettlementError> {
        let subs = self.db.fetch_subscriptions_for_payer(payer_id).await?;
        Ok(subs.into_iter().find(|s| s.service_id == service_id && s.is_current(now)))
    }
}

//! Unified read access to merchant accounts and the records that hang off them.

use std::fmt::Debug;

use chrono::{DateTime, Datelike, Utc};
use log::{error, trace};
use mse_common::Money;

use crate::{
    db::traits::{AccountManagement, SettlementError},
    db_types::{LedgerEntry, MerchantAccount, MerchantDailyStats, Payment, PayoutRequest, RefundRecord, Subscription},
    mse_api::account_objects::{day_range, MerchantStatement, Reconciliation},
};

/// The `AccountApi` provides read access to merchants, their ledgers and their customers' payments and subscriptions.
pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetches the merchant account for the given id. If no account exists, `None` is returned.
    pub async fn merchant(&self, merchant_id: i64) -> Result<Option<MerchantAccount>, SettlementError> {
        self.db.fetch_merchant(merchant_id).await
    }

    pub async fn ledger(&self, merchant_id: i64) -> Result<Vec<LedgerEntry>, SettlementError> {
        self.db.fetch_ledger_for_merchant(merchant_id).await
    }

    pub async fn ledger_total(&self, merchant_id: i64) -> Result<Money, SettlementError> {
        self.db.fetch_ledger_total(merchant_id).await
    }

    pub async fn statement(&self, merchant_id: i64) -> Result<MerchantStatement, SettlementError> {
        let merchant = self.merchant(merchant_id).await?.ok_or(SettlementError::MerchantNotFound(merchant_id))?;
        let entries = self.ledger(merchant_id).await?;
        Ok(MerchantStatement { merchant, entries })
    }

    /// Compares the merchant's available balance with the sum of its ledger entries. The two should always agree.
    pub async fn reconcile(&self, merchant_id: i64) -> Result<Reconciliation, SettlementError> {
        let merchant = self.merchant(merchant_id).await?.ok_or(SettlementError::MerchantNotFound(merchant_id))?;
        let ledger_total = self.ledger_total(merchant_id).await?;
        let result = Reconciliation { merchant_id, available_balance: merchant.available_balance, ledger_total };
        if !result.is_balanced() {
            error!(
                "📒️ Merchant #{merchant_id} is out of balance. Stored balance is {} but the ledger sums to {}",
                result.available_balance, result.ledger_total
            );
        }
        Ok(result)
    }

    pub async fn payment(&self, payment_id: i64) -> Result<Option<Payment>, SettlementError> {
        self.db.fetch_payment(payment_id).await
    }

    pub async fn payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<Option<Payment>, SettlementError> {
        self.db.fetch_payment_by_gateway_ref(gateway_ref).await
    }

    pub async fn subscriptions_for_payer(&self, payer_id: &str) -> Result<Vec<Subscription>, SettlementError> {
        self.db.fetch_subscriptions_for_payer(payer_id).await
    }

    pub async fn payouts_for_merchant(&self, merchant_id: i64) -> Result<Vec<PayoutRequest>, SettlementError> {
        self.db.fetch_payouts_for_merchant(merchant_id).await
    }

    pub async fn refunds_for_payment(&self, payment_id: i64) -> Result<Vec<RefundRecord>, SettlementError> {
        self.db.fetch_refunds_for_payment(payment_id).await
    }

    /// Daily counters for the merchant, for the days from `since` to `until` inclusive.
    pub async fn daily_stats(
        &self,
        merchant_id: i64,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<MerchantDailyStats>, SettlementError> {
        let (since, until) = day_range(since.date_naive(), until.date_naive());
        trace!("📒️ Fetching daily stats for merchant #{merchant_id} from {since} to {until}");
        self.db.fetch_daily_stats(merchant_id, &since, &until).await
    }

    /// Net revenue for the calendar month containing `now`, up to and including `now`'s day. Read from the dashboard
    /// counters, so it may briefly lag the ledger.
    pub async fn month_to_date_revenue(&self, merchant_id: i64, now: DateTime<Utc>) -> Result<Money, SettlementError> {
        let today = now.date_naive();
        let first = today.with_day(1).unwrap_or(today);
        let (since, until) = day_range(first, today);
        let stats = self.db.fetch_daily_stats(merchant_id, &since, &until).await?;
        Ok(stats.iter().map(|s| s.revenue).sum())
    }
}

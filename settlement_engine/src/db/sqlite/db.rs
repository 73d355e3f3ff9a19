use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;
use mse_common::{FeePercent, Money};
use sqlx::SqlitePool;

use super::{
    catalog,
    coupons,
    db_url,
    ledger,
    merchants,
    new_pool,
    payments,
    payouts,
    refunds,
    stats::{self, StatsDelta},
    subscriptions,
    DEFAULT_BUSY_TIMEOUT,
    DEFAULT_MAX_CONNECTIONS,
    MIGRATOR,
};
use crate::{
    db::traits::{
        AccountManagement,
        CatalogManagement,
        InsertPaymentResult,
        RefundOutcome,
        SettlementDatabase,
        SettlementError,
        SettlementOutcome,
        SubscriptionOutcome,
    },
    db_types::{
        Coupon,
        CouponRedemption,
        EntryType,
        LedgerEntry,
        MerchantAccount,
        MerchantDailyStats,
        MerchantPlan,
        NewCoupon,
        NewMerchant,
        NewPayment,
        NewSubscription,
        NewTier,
        Payment,
        PayoutRequest,
        PayoutStatus,
        RefundRecord,
        Service,
        Subscription,
        SubscriptionStatus,
        Tier,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn settle_payment(
        &self,
        payment_id: i64,
        provider_tx_id: &str,
        provider_response: &serde_json::Value,
        default_fee: FeePercent,
    ) -> Result<SettlementOutcome, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let response = provider_response.to_string();
        let payment = payments::mark_settled(payment_id, provider_tx_id, &response, &mut tx).await?;
        trace!("💰️ Payment #{payment_id} claimed for settlement ({})", payment.gateway_ref);
        let merchant = merchants::fetch_merchant(payment.merchant_id, &mut tx)
            .await?
            .ok_or(SettlementError::MerchantNotFound(payment.merchant_id))?;
        let tier =
            catalog::fetch_tier_for_service(payment.merchant_id, payment.service_id, payment.tier_id, &mut tx).await?;
        let fee = merchant.fee_percent(default_fee);
        let (platform_fee, net_amount) = fee.split(payment.amount);
        trace!("💰️ Payment #{payment_id}: {} gross, {platform_fee} fee at {fee}, {net_amount} net", payment.amount);

        let (subscription, subscription_outcome) =
            subscriptions::create_or_extend(&payment.payer_id, &tier, Utc::now(), &mut tx).await?;
        let ledger_entry = if net_amount.is_positive() {
            let description = format!("Payment for {}", tier.name);
            let entry =
                ledger::apply_entry(merchant.id, net_amount, EntryType::Credit, &description, Some(payment_id), &mut tx)
                    .await?;
            Some(entry)
        } else {
            warn!("💰️ The platform fee on payment #{payment_id} takes the full amount. Nothing is credited.");
            None
        };
        if let Some(coupon_id) = payment.coupon_id {
            coupons::redeem(
                coupon_id,
                &payment.payer_id,
                payment.merchant_id,
                payment.service_id,
                subscription.id,
                Some(payment_id),
                &mut tx,
            )
            .await?;
        }
        let payment = payments::record_settlement(payment_id, platform_fee, net_amount, subscription.id, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "💰️ Payment #{payment_id} settled. {net_amount} credited to merchant #{}. Subscription #{} {:?}",
            merchant.id, subscription.id, subscription_outcome
        );
        Ok(SettlementOutcome { payment, subscription, subscription_outcome, net_amount, platform_fee, ledger_entry })
    }

    async fn fail_payment(&self, payment_id: i64, reason: &str) -> Result<Payment, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::mark_failed(payment_id, reason, &mut tx).await?;
        tx.commit().await?;
        debug!("💰️ Payment #{payment_id} marked as failed: {reason}");
        Ok(payment)
    }

    async fn refund_payment(
        &self,
        payment_id: i64,
        reason: &str,
        approved_by: &str,
    ) -> Result<RefundOutcome, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::mark_refunded(payment_id, &mut tx).await?;
        let description = format!("Refund: {reason}");
        let ledger_entry = ledger::apply_entry(
            payment.merchant_id,
            payment.amount,
            EntryType::Debit,
            &description,
            Some(payment_id),
            &mut tx,
        )
        .await?;
        let refund =
            refunds::insert_refund(payment_id, payment.amount, reason, approved_by, ledger_entry.id, &mut tx).await?;
        let cancelled_subscription = match payment.subscription_id {
            Some(sub_id) => subscriptions::set_status(sub_id, SubscriptionStatus::Cancelled, &mut tx).await?,
            None => None,
        };
        tx.commit().await?;
        debug!(
            "↩️ Payment #{payment_id} refunded by {approved_by}. {} debited from merchant #{}",
            payment.amount, payment.merchant_id
        );
        Ok(RefundOutcome { refund, payment, ledger_entry, cancelled_subscription })
    }

    async fn create_or_extend_subscription(
        &self,
        payer_id: &str,
        merchant_id: i64,
        service_id: i64,
        tier_id: i64,
        payment_id: Option<i64>,
    ) -> Result<(Subscription, SubscriptionOutcome), SettlementError> {
        let mut tx = self.pool.begin().await?;
        ledger::lock_merchant(merchant_id, &mut tx).await?;
        let tier = catalog::fetch_tier_for_service(merchant_id, service_id, tier_id, &mut tx).await?;
        let result = subscriptions::create_or_extend(payer_id, &tier, Utc::now(), &mut tx).await?;
        if let Some(id) = payment_id {
            payments::attach_subscription(id, &result.0, merchant_id, &mut tx).await?;
            trace!("🗓️ Subscription #{} attached to payment #{id}", result.0.id);
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn redeem_coupon(
        &self,
        coupon_id: i64,
        payer_id: &str,
        subscription_id: i64,
    ) -> Result<CouponRedemption, SettlementError> {
        let mut tx = self.pool.begin().await?;
        // Claim the use before reading anything, so that the write lock is taken first
        let coupon = coupons::claim_use(coupon_id, &mut tx).await?;
        let sub = subscriptions::fetch_subscription(subscription_id, &mut tx)
            .await?
            .ok_or(SettlementError::SubscriptionNotFound(subscription_id))?;
        if sub.payer_id != payer_id {
            return Err(SettlementError::InvalidState(format!(
                "Subscription #{subscription_id} does not belong to {payer_id}"
            )));
        }
        let service = catalog::fetch_service(sub.service_id, &mut tx)
            .await?
            .ok_or(SettlementError::ServiceNotFound(sub.service_id))?;
        let redemption = coupons::record_redemption(
            &coupon,
            payer_id,
            service.merchant_id,
            sub.service_id,
            subscription_id,
            None,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        Ok(redemption)
    }

    async fn request_payout(
        &self,
        merchant_id: i64,
        amount: Money,
        method: &str,
        destination: &str,
    ) -> Result<PayoutRequest, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let entry = ledger::apply_entry(merchant_id, amount, EntryType::Debit, "Payout request", None, &mut tx).await?;
        let payout = payouts::insert_payout(merchant_id, amount, method, destination, entry.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🏦️ Merchant #{merchant_id} requested a payout of {amount} via {method}. Request #{}", payout.id);
        Ok(payout)
    }

    async fn approve_payout(&self, payout_id: i64, reviewer: &str) -> Result<PayoutRequest, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let payout =
            payouts::transition(payout_id, PayoutStatus::Pending, PayoutStatus::Approved, Some(reviewer), None, &mut tx)
                .await?;
        tx.commit().await?;
        debug!("🏦️ Payout request #{payout_id} approved by {reviewer}");
        Ok(payout)
    }

    async fn reject_payout(
        &self,
        payout_id: i64,
        reviewer: &str,
        reason: &str,
    ) -> Result<PayoutRequest, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let payout = payouts::transition(
            payout_id,
            PayoutStatus::Pending,
            PayoutStatus::Rejected,
            Some(reviewer),
            Some(reason),
            &mut tx,
        )
        .await?;
        let description = format!("Payout rejected: {reason}");
        ledger::apply_entry(payout.merchant_id, payout.amount, EntryType::Credit, &description, None, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🏦️ Payout request #{payout_id} rejected by {reviewer}. {} returned to merchant #{}",
            payout.amount, payout.merchant_id
        );
        Ok(payout)
    }

    async fn complete_payout(&self, payout_id: i64) -> Result<PayoutRequest, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let payout =
            payouts::transition(payout_id, PayoutStatus::Approved, PayoutStatus::Completed, None, None, &mut tx)
                .await?;
        tx.commit().await?;
        debug!("🏦️ Payout request #{payout_id} completed");
        Ok(payout)
    }

    async fn record_settlement_stats(&self, outcome: &SettlementOutcome) -> Result<(), SettlementError> {
        let day = outcome.payment.updated_at.format("%Y-%m-%d").to_string();
        let (new_subscriptions, renewals) = match outcome.subscription_outcome {
            SubscriptionOutcome::Created => (1, 0),
            SubscriptionOutcome::Extended => (0, 1),
        };
        let delta =
            StatsDelta { revenue: outcome.net_amount, gross: outcome.payment.amount, new_subscriptions, renewals };
        let mut conn = self.pool.acquire().await?;
        stats::add_to_day(outcome.payment.merchant_id, &day, delta, &mut conn).await?;
        trace!("📒️ Daily stats for merchant #{} on {day} updated", outcome.payment.merchant_id);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_merchant(&self, merchant_id: i64) -> Result<Option<MerchantAccount>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        merchants::fetch_merchant(merchant_id, &mut conn).await
    }

    async fn fetch_ledger_for_merchant(&self, merchant_id: i64) -> Result<Vec<LedgerEntry>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_entries_for_merchant(merchant_id, &mut conn).await
    }

    async fn fetch_ledger_total(&self, merchant_id: i64) -> Result<Money, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        ledger::ledger_total(merchant_id, &mut conn).await
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(payment_id, &mut conn).await
    }

    async fn fetch_payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<Option<Payment>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_by_gateway_ref(gateway_ref, &mut conn).await
    }

    async fn fetch_subscription(&self, subscription_id: i64) -> Result<Option<Subscription>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::fetch_subscription(subscription_id, &mut conn).await
    }

    async fn fetch_subscriptions_for_payer(&self, payer_id: &str) -> Result<Vec<Subscription>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::fetch_subscriptions_for_payer(payer_id, &mut conn).await
    }

    async fn fetch_tier(&self, tier_id: i64) -> Result<Option<Tier>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_tier(tier_id, &mut conn).await
    }

    async fn fetch_coupon(&self, coupon_id: i64) -> Result<Option<Coupon>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        coupons::fetch_coupon(coupon_id, &mut conn).await
    }

    async fn fetch_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        coupons::fetch_coupon_by_code(code, &mut conn).await
    }

    async fn fetch_redemptions_for_coupon(&self, coupon_id: i64) -> Result<Vec<CouponRedemption>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        coupons::fetch_redemptions_for_coupon(coupon_id, &mut conn).await
    }

    async fn fetch_payout(&self, payout_id: i64) -> Result<Option<PayoutRequest>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        payouts::fetch_payout(payout_id, &mut conn).await
    }

    async fn fetch_payouts_for_merchant(&self, merchant_id: i64) -> Result<Vec<PayoutRequest>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        payouts::fetch_payouts_for_merchant(merchant_id, &mut conn).await
    }

    async fn fetch_refunds_for_payment(&self, payment_id: i64) -> Result<Vec<RefundRecord>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        refunds::fetch_refunds_for_payment(payment_id, &mut conn).await
    }

    async fn fetch_daily_stats(
        &self,
        merchant_id: i64,
        since: &str,
        until: &str,
    ) -> Result<Vec<MerchantDailyStats>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        stats::fetch_range(merchant_id, since, until, &mut conn).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn create_plan(&self, name: &str, fee: FeePercent) -> Result<MerchantPlan, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        merchants::insert_plan(name, fee, &mut conn).await
    }

    async fn create_merchant(&self, merchant: NewMerchant) -> Result<MerchantAccount, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let merchant = merchants::insert_merchant(merchant, &mut tx).await?;
        tx.commit().await?;
        Ok(merchant)
    }

    async fn create_service(&self, merchant_id: i64, name: &str) -> Result<Service, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_service(merchant_id, name, &mut conn).await
    }

    async fn create_tier(&self, tier: NewTier) -> Result<Tier, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_tier(tier, &mut conn).await
    }

    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        coupons::insert_coupon(coupon, &mut conn).await
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<InsertPaymentResult, SettlementError> {
        {
            let mut conn = self.pool.acquire().await?;
            payments::check_discount(&payment, &mut conn).await?;
        }
        let mut tx = self.pool.begin().await?;
        let result = payments::idempotent_insert(payment, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn insert_subscription(&self, subscription: NewSubscription) -> Result<Subscription, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::insert_subscription(subscription, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using `MSE_DATABASE_URL` and the default pool settings
    pub async fn new() -> Result<Self, SettlementError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SettlementError> {
        SqliteDatabase::new_with_options(url, max_connections, DEFAULT_BUSY_TIMEOUT).await
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Result<Self, SettlementError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections, busy_timeout).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Applies any outstanding schema migrations.
    pub async fn run_migrations(&self) -> Result<(), SettlementError> {
        MIGRATOR.run(&self.pool).await.map_err(|e| SettlementError::DatabaseError(e.to_string()))?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

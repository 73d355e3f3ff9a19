use mse_common::{FeePercent, Money};
use settlement_engine::{
    db_types::{BillingInterval, MerchantAccount, NewMerchant, NewPayment, NewTier, Service, Tier},
    events::EventProducers,
    CatalogManagement,
    SettlementFlowApi,
    SqliteDatabase,
};

use super::prepare_env::{prepare_test_env, random_db_path};

/// A merchant with a single service sold in three tiers.
#[derive(Debug)]
pub struct Catalog {
    pub merchant: MerchantAccount,
    pub service: Service,
    /// 30 days for 10.00
    pub thirty_days: Tier,
    /// 1 calendar month for 100.00
    pub monthly: Tier,
    /// Never expires, 250.00
    pub lifetime: Tier,
}

#[derive(Debug)]
pub struct TestSystem {
    pub db: SqliteDatabase,
    pub catalog: Catalog,
}

impl TestSystem {
    /// A fresh database with a merchant on the default fee.
    pub async fn new() -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        let catalog = seed_catalog(&db, NewMerchant::new("Acme Streaming")).await;
        Self { db, catalog }
    }

    /// A fresh database with a merchant on a plan charging `fee`.
    pub async fn with_plan_fee(fee: FeePercent) -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        let plan = db.create_plan("Custom", fee).await.expect("Error creating plan");
        let catalog = seed_catalog(&db, NewMerchant::new("Acme Streaming").with_plan(plan.id)).await;
        Self { db, catalog }
    }

    pub fn flow_api(&self) -> SettlementFlowApi<SqliteDatabase> {
        SettlementFlowApi::new(self.db.clone(), EventProducers::default())
    }

    pub fn merchant_id(&self) -> i64 {
        self.catalog.merchant.id
    }

    /// Inserts a pending payment for `tier` at the tier's price.
    pub async fn pending_payment(&self, gateway_ref: &str, payer_id: &str, tier: &Tier) -> i64 {
        self.pending_payment_for(gateway_ref, payer_id, tier, tier.price).await
    }

    pub async fn pending_payment_for(&self, gateway_ref: &str, payer_id: &str, tier: &Tier, amount: Money) -> i64 {
        let payment = NewPayment::new(
            gateway_ref,
            payer_id,
            self.catalog.merchant.id,
            self.catalog.service.id,
            tier.id,
            amount,
        );
        self.db.insert_payment(payment).await.expect("Error inserting payment").id()
    }

    /// Inserts and settles a payment, returning the payment id.
    pub async fn settled_payment(&self, gateway_ref: &str, payer_id: &str, tier: &Tier) -> i64 {
        let id = self.pending_payment(gateway_ref, payer_id, tier).await;
        let response = serde_json::json!({ "status": "succeeded", "reference": gateway_ref });
        self.flow_api()
            .settle_payment(id, &format!("tx-{gateway_ref}"), &response)
            .await
            .expect("Error settling payment");
        id
    }
}

pub async fn seed_catalog(db: &SqliteDatabase, merchant: NewMerchant) -> Catalog {
    let merchant = db.create_merchant(merchant).await.expect("Error creating merchant");
    let service = db.create_service(merchant.id, "Premium Video").await.expect("Error creating service");
    let thirty_days = NewTier::new(service.id, "30 days", Money::from_major(10), BillingInterval::Day)
        .with_interval_count(30);
    let thirty_days = db.create_tier(thirty_days).await.expect("Error creating tier");
    let monthly = NewTier::new(service.id, "Monthly", Money::from_major(100), BillingInterval::Month);
    let monthly = db.create_tier(monthly).await.expect("Error creating tier");
    let lifetime = NewTier::new(service.id, "Lifetime", Money::from_major(250), BillingInterval::Lifetime);
    let lifetime = db.create_tier(lifetime).await.expect("Error creating tier");
    Catalog { merchant, service, thirty_days, monthly, lifetime }
}

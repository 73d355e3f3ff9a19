use mse_common::FeePercent;

use crate::{
    db::traits::{InsertPaymentResult, SettlementError},
    db_types::{
        Coupon,
        MerchantAccount,
        MerchantPlan,
        NewCoupon,
        NewMerchant,
        NewPayment,
        NewSubscription,
        NewTier,
        Service,
        Subscription,
        Tier,
    },
};

/// Reference data management.
///
/// In production, plans, services, tiers and coupons are maintained by the merchant dashboard, and pending payments
/// are created by the checkout flow. The engine only needs to read them, but administrative tooling and tests need a
/// way to create them.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn create_plan(&self, name: &str, fee: FeePercent) -> Result<MerchantPlan, SettlementError>;

    /// Creates a merchant with zero balances.
    async fn create_merchant(&self, merchant: NewMerchant) -> Result<MerchantAccount, SettlementError>;

    async fn create_service(&self, merchant_id: i64, name: &str) -> Result<Service, SettlementError>;

    async fn create_tier(&self, tier: NewTier) -> Result<Tier, SettlementError>;

    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, SettlementError>;

    /// Stores a new `Pending` payment. If a payment with the same gateway reference already exists, nothing is changed
    /// and the existing id is returned.
    async fn insert_payment(&self, payment: NewPayment) -> Result<InsertPaymentResult, SettlementError>;

    /// Writes a subscription row as-is, without applying the lifecycle rules.
    async fn insert_subscription(&self, subscription: NewSubscription) -> Result<Subscription, SettlementError>;
}

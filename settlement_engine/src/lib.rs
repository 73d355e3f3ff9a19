//! Merchant Settlement Engine
//!
//! The settlement engine takes payments that a gateway has confirmed and turns them into merchant revenue and payer
//! entitlements, exactly once. Settling a payment deducts the platform fee, credits the merchant's ledger, creates or
//! extends the payer's subscription and redeems any coupon, all in one atomic unit of work. Refunds and merchant
//! payouts debit the same balance through the same accounting primitive, so a merchant's available balance always
//! equals the sum of its ledger.
//!
//! The library is divided into two main sections:
//! 1. Database management ([`mod@db`]). SQLite is the supported backend. Backends implement the traits in
//!    [`db::traits`]; callers should use the public API rather than the database directly. The data types stored in the
//!    database are public and live in [`db_types`].
//! 2. The public API ([`mod@mse_api`]): settlement flow, payouts, subscriptions, coupons and account queries.
//!
//! The engine also publishes events after each committed settlement, refund and payout review. See [`events`] for how
//! to hook into them.
pub mod db;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod mse_api;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits::{
    AccountManagement,
    CatalogManagement,
    InsertPaymentResult,
    RefundOutcome,
    SettlementDatabase,
    SettlementError,
    SettlementOutcome,
    SubscriptionOutcome,
};
pub use mse_api::{
    account_objects,
    accounts_api::AccountApi,
    coupon_api::CouponApi,
    payout_api::PayoutApi,
    settlement_flow_api::SettlementFlowApi,
    subscription_api::SubscriptionApi,
};

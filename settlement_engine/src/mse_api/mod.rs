//! # Merchant settlement engine public API
//!
//! The `mse_api` module exposes the programmatic API for the settlement engine. The API is modular, so that clients can
//! pick the pieces they need.
//!
//! * [`settlement_flow_api`] is the primary API. It settles, fails and refunds payments in response to gateway
//!   notifications and operator actions.
//! * [`payout_api`] handles merchant withdrawal requests and their review.
//! * [`subscription_api`] grants and queries subscription entitlements outside the payment flow.
//! * [`coupon_api`] redeems coupons against existing subscriptions.
//! * [`accounts_api`] provides read access to merchant balances, ledgers, payments and dashboard counters.
//!
//! # API usage
//!
//! Every API is created by supplying a database backend that implements the backend traits the API needs.
//!
//! ```rust,ignore
//! use settlement_engine::{AccountApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/mse_store.db", 5).await?;
//! // SqliteDatabase implements AccountManagement
//! let api = AccountApi::new(db);
//! let check = api.reconcile(merchant_id).await?;
//! assert!(check.is_balanced());
//! ```

pub mod account_objects;
pub mod accounts_api;
pub mod coupon_api;
pub mod payout_api;
pub mod settlement_flow_api;
pub mod subscription_api;

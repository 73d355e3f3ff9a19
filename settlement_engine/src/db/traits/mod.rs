//! #  Database management and control.
//!
//! This module provides the interfaces that define the interface contracts of the settlement engine database
//! *backends*.
//!
//! ## Balances and the ledger
//! Every merchant has an available balance and an append-only ledger of signed entries. Backends must guarantee that
//! the balance is only ever changed together with a ledger entry, in the same transaction, so that the sum of the
//! ledger always reconstructs the balance.
//!
//! ## Traits
//! * [`SettlementDatabase`] defines the state-changing operations: settlement, refunds, payouts, subscriptions and
//!   coupon redemption. Each method is a single atomic unit of work.
//! * [`AccountManagement`] provides read-only queries over merchants, ledgers, payments and subscriptions.
//! * [`CatalogManagement`] creates the reference data (plans, merchants, services, tiers, coupons) and the pending
//!   payments that a checkout flow would normally produce.
mod account_management;
mod catalog_management;
mod data_objects;
mod errors;
mod settlement_database;

pub use account_management::AccountManagement;
pub use catalog_management::CatalogManagement;
pub use data_objects::{InsertPaymentResult, RefundOutcome, SettlementOutcome, SubscriptionOutcome};
pub use errors::SettlementError;
pub use settlement_database::SettlementDatabase;

use mse_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{LedgerEntry, Payment, RefundRecord, Subscription};

#[derive(Debug)]
pub enum InsertPaymentResult {
    Inserted(i64),
    AlreadyExists(i64),
}

impl InsertPaymentResult {
    pub fn id(&self) -> i64 {
        match self {
            InsertPaymentResult::Inserted(id) | InsertPaymentResult::AlreadyExists(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionOutcome {
    Created,
    Extended,
}

/// The result of settling a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementOutcome {
    /// The payment, now in `Success` with the subscription id attached
    pub payment: Payment,
    pub subscription: Subscription,
    pub subscription_outcome: SubscriptionOutcome,
    pub net_amount: Money,
    pub platform_fee: Money,
    /// The credit written to the merchant's ledger. `None` only when the platform fee takes the whole amount.
    pub ledger_entry: Option<LedgerEntry>,
}

/// The result of refunding a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundOutcome {
    pub refund: RefundRecord,
    /// The payment, now in `Refunded`
    pub payment: Payment,
    pub ledger_entry: LedgerEntry,
    /// The subscription that was cancelled, if the payment had one
    pub cancelled_subscription: Option<Subscription>,
}

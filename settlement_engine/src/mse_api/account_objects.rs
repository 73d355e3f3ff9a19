use chrono::NaiveDate;
use mse_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{LedgerEntry, MerchantAccount};

/// A comparison of a merchant's stored balance against the sum of its ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub merchant_id: i64,
    pub available_balance: Money,
    pub ledger_total: Money,
}

impl Reconciliation {
    pub fn is_balanced(&self) -> bool {
        self.available_balance == self.ledger_total
    }

    /// How far the stored balance is ahead of the ledger.
    pub fn discrepancy(&self) -> Money {
        self.available_balance - self.ledger_total
    }
}

/// A merchant account together with its full ledger history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantStatement {
    pub merchant: MerchantAccount,
    pub entries: Vec<LedgerEntry>,
}

impl MerchantStatement {
    pub fn total_credits(&self) -> Money {
        self.entries.iter().filter(|e| e.amount.is_positive()).map(|e| e.amount).sum()
    }

    pub fn total_debits(&self) -> Money {
        self.entries.iter().filter(|e| e.amount.is_negative()).map(|e| e.amount.abs()).sum()
    }
}

/// The `[first, last]` day range, formatted as stored in the daily stats table.
pub fn day_range(first: NaiveDate, last: NaiveDate) -> (String, String) {
    (first.format("%Y-%m-%d").to_string(), last.format("%Y-%m-%d").to_string())
}

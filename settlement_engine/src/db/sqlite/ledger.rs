//! The accounting primitive.
//!
//! [`apply_entry`] is the only function in the crate that writes `merchant_accounts.available_balance`. It changes the
//! balance and appends the matching ledger entry on the same connection, so as long as callers pass a transaction,
//! the two writes land together or not at all.
use chrono::Utc;
use log::{debug, trace, warn};
use mse_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db::traits::SettlementError,
    db_types::{EntryType, LedgerEntry},
};

/// Applies a credit or debit of `amount` (which must be positive) to the merchant's available balance and records it
/// in the ledger.
///
/// The balance update is a single guarded statement, so a debit that would overdraw the account never writes
/// anything. In SQLite the update also takes the database write lock, which serialises concurrent writers on the
/// balance for the remainder of the enclosing transaction.
///
/// ## Failure modes:
/// - `InvalidAmount` if `amount` is zero or negative.
/// - `MerchantNotFound` if the merchant does not exist.
/// - `InsufficientFunds` if a debit exceeds the available balance.
pub async fn apply_entry(
    merchant_id: i64,
    amount: Money,
    entry_type: EntryType,
    description: &str,
    payment_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, SettlementError> {
    if !amount.is_positive() {
        return Err(SettlementError::InvalidAmount(format!("Ledger entries must be for a positive amount, not {amount}")));
    }
    let delta = entry_type.signed(amount);
    let now = Utc::now();
    trace!("📒️ Applying {entry_type} of {amount} to merchant #{merchant_id}");
    let balance_after: Option<Money> = sqlx::query_scalar(
        r#"UPDATE merchant_accounts SET
            available_balance = available_balance + $1,
            updated_at = $2
        WHERE id = $3 AND available_balance + $1 >= 0
        RETURNING available_balance"#,
    )
    .bind(delta)
    .bind(now)
    .bind(merchant_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(balance_after) = balance_after else {
        let available = fetch_available_balance(merchant_id, &mut *conn)
            .await?
            .ok_or(SettlementError::MerchantNotFound(merchant_id))?;
        warn!("📒️ Merchant #{merchant_id} cannot cover a {entry_type} of {amount}. Available balance is {available}");
        return Err(SettlementError::InsufficientFunds { merchant_id, available, requested: amount });
    };
    let entry = sqlx::query_as::<_, LedgerEntry>(
        r#"INSERT INTO ledger_entries (merchant_id, payment_id, amount, entry_type, description, balance_after, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *"#,
    )
    .bind(merchant_id)
    .bind(payment_id)
    .bind(delta)
    .bind(entry_type)
    .bind(description)
    .bind(balance_after)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!(
        "📒️ Ledger entry #{} for merchant #{merchant_id}: {} ({description}). Balance is now {balance_after}",
        entry.id, entry.amount
    );
    Ok(entry)
}

/// Claims the merchant's row for the rest of the transaction without changing it. Use this as the first statement of a
/// transaction that needs to read merchant-scoped state before writing it.
pub async fn lock_merchant(merchant_id: i64, conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    let locked: Option<i64> =
        sqlx::query_scalar("UPDATE merchant_accounts SET updated_at = updated_at WHERE id = $1 RETURNING id")
            .bind(merchant_id)
            .fetch_optional(conn)
            .await?;
    locked.map(|_| ()).ok_or(SettlementError::MerchantNotFound(merchant_id))
}

pub async fn fetch_available_balance(
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Money>, SettlementError> {
    let balance = sqlx::query_scalar("SELECT available_balance FROM merchant_accounts WHERE id = $1")
        .bind(merchant_id)
        .fetch_optional(conn)
        .await?;
    Ok(balance)
}

pub async fn fetch_entries_for_merchant(
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, SettlementError> {
    let entries = sqlx::query_as("SELECT * FROM ledger_entries WHERE merchant_id = $1 ORDER BY id ASC")
        .bind(merchant_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

pub async fn ledger_total(merchant_id: i64, conn: &mut SqliteConnection) -> Result<Money, SettlementError> {
    let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE merchant_id = $1")
        .bind(merchant_id)
        .fetch_one(conn)
        .await?;
    Ok(Money::from(total))
}

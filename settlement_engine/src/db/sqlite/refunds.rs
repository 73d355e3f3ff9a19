use log::debug;
use mse_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db::traits::SettlementError,
    db_types::{RefundRecord, RefundStatus},
};

/// Records a refund against the ledger entry that reversed the payment. Refunds are created in `Pending`.
pub async fn insert_refund(
    payment_id: i64,
    amount: Money,
    reason: &str,
    approved_by: &str,
    ledger_entry_id: i64,
    conn: &mut SqliteConnection,
) -> Result<RefundRecord, SettlementError> {
    let refund: RefundRecord = sqlx::query_as(
        r#"INSERT INTO refunds (payment_id, amount, reason, approved_by, status, ledger_entry_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *"#,
    )
    .bind(payment_id)
    .bind(amount)
    .bind(reason)
    .bind(approved_by)
    .bind(RefundStatus::Pending)
    .bind(ledger_entry_id)
    .fetch_one(conn)
    .await?;
    debug!("↩️ Refund #{} of {amount} recorded for payment #{payment_id}", refund.id);
    Ok(refund)
}

pub async fn fetch_refunds_for_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<RefundRecord>, SettlementError> {
    let refunds = sqlx::query_as("SELECT * FROM refunds WHERE payment_id = $1 ORDER BY id ASC")
        .bind(payment_id)
        .fetch_all(conn)
        .await?;
    Ok(refunds)
}

use chrono::Utc;
use log::debug;
use mse_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db::traits::SettlementError,
    db_types::{PayoutRequest, PayoutStatus},
};

pub async fn insert_payout(
    merchant_id: i64,
    amount: Money,
    method: &str,
    destination: &str,
    ledger_entry_id: i64,
    conn: &mut SqliteConnection,
) -> Result<PayoutRequest, SettlementError> {
    let payout: PayoutRequest = sqlx::query_as(
        r#"INSERT INTO payout_requests (merchant_id, amount, method, destination, ledger_entry_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *"#,
    )
    .bind(merchant_id)
    .bind(amount)
    .bind(method)
    .bind(destination)
    .bind(ledger_entry_id)
    .fetch_one(conn)
    .await?;
    debug!("🏦️ Payout request #{} for {amount} stored for merchant #{merchant_id}", payout.id);
    Ok(payout)
}

pub async fn fetch_payout(payout_id: i64, conn: &mut SqliteConnection) -> Result<Option<PayoutRequest>, SettlementError> {
    let payout =
        sqlx::query_as("SELECT * FROM payout_requests WHERE id = $1").bind(payout_id).fetch_optional(conn).await?;
    Ok(payout)
}

pub async fn fetch_payouts_for_merchant(
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PayoutRequest>, SettlementError> {
    let payouts = sqlx::query_as("SELECT * FROM payout_requests WHERE merchant_id = $1 ORDER BY id ASC")
        .bind(merchant_id)
        .fetch_all(conn)
        .await?;
    Ok(payouts)
}

/// Moves a payout request from `from` to `to`. The reviewer and note are only overwritten when supplied.
///
/// Fails with `PayoutNotFound`, or `InvalidState` if the request is not in `from`.
pub async fn transition(
    payout_id: i64,
    from: PayoutStatus,
    to: PayoutStatus,
    reviewer: Option<&str>,
    note: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<PayoutRequest, SettlementError> {
    let payout: Option<PayoutRequest> = sqlx::query_as(
        r#"UPDATE payout_requests SET
            status = $1,
            reviewed_by = COALESCE($2, reviewed_by),
            note = COALESCE($3, note),
            updated_at = $4
        WHERE id = $5 AND status = $6
        RETURNING *"#,
    )
    .bind(to)
    .bind(reviewer)
    .bind(note)
    .bind(Utc::now())
    .bind(payout_id)
    .bind(from)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(payout) = payout {
        debug!("🏦️ Payout request #{payout_id} moved from {from} to {to}");
        return Ok(payout);
    }
    let current = fetch_payout(payout_id, conn).await?.ok_or(SettlementError::PayoutNotFound(payout_id))?;
    Err(SettlementError::InvalidState(format!(
        "Payout request #{payout_id} is {}, so it cannot move to {to}. It must be {from}.",
        current.status
    )))
}

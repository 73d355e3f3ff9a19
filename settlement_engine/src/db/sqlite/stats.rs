use chrono::Utc;
use mse_common::Money;
use sqlx::SqliteConnection;

use crate::{db::traits::SettlementError, db_types::MerchantDailyStats};

/// One settlement's contribution to a merchant's daily counters.
#[derive(Debug, Clone, Copy)]
pub struct StatsDelta {
    pub revenue: Money,
    pub gross: Money,
    pub new_subscriptions: i64,
    pub renewals: i64,
}

pub async fn add_to_day(
    merchant_id: i64,
    day: &str,
    delta: StatsDelta,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    sqlx::query(
        r#"INSERT INTO merchant_daily_stats (merchant_id, day, revenue, gross, settled_payments, new_subscriptions, renewals, updated_at)
        VALUES ($1, $2, $3, $4, 1, $5, $6, $7)
        ON CONFLICT (merchant_id, day) DO UPDATE SET
            revenue = revenue + excluded.revenue,
            gross = gross + excluded.gross,
            settled_payments = settled_payments + 1,
            new_subscriptions = new_subscriptions + excluded.new_subscriptions,
            renewals = renewals + excluded.renewals,
            updated_at = excluded.updated_at"#,
    )
    .bind(merchant_id)
    .bind(day)
    .bind(delta.revenue)
    .bind(delta.gross)
    .bind(delta.new_subscriptions)
    .bind(delta.renewals)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

/// Days are `YYYY-MM-DD` strings, so the inclusive range compares lexically.
pub async fn fetch_range(
    merchant_id: i64,
    since: &str,
    until: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<MerchantDailyStats>, SettlementError> {
    let stats = sqlx::query_as(
        r#"SELECT * FROM merchant_daily_stats
        WHERE merchant_id = $1 AND day >= $2 AND day <= $3
        ORDER BY day ASC"#,
    )
    .bind(merchant_id)
    .bind(since)
    .bind(until)
    .fetch_all(conn)
    .await?;
    Ok(stats)
}

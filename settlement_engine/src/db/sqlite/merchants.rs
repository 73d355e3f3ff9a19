use log::debug;
use mse_common::FeePercent;
use sqlx::SqliteConnection;

use crate::{
    db::traits::SettlementError,
    db_types::{MerchantAccount, MerchantPlan, NewMerchant},
};

const MERCHANT_COLUMNS: &str = r#"
    m.id,
    m.name,
    m.plan_id,
    p.fee_bps AS plan_fee,
    m.available_balance,
    m.pending_escrow,
    m.created_at,
    m.updated_at
    FROM merchant_accounts m LEFT JOIN merchant_plans p ON p.id = m.plan_id"#;

/// Fetches the merchant account along with the fee of the merchant's plan, if there is one.
pub async fn fetch_merchant(
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<MerchantAccount>, SettlementError> {
    let query = format!("SELECT {MERCHANT_COLUMNS} WHERE m.id = $1");
    let merchant = sqlx::query_as(&query).bind(merchant_id).fetch_optional(conn).await?;
    Ok(merchant)
}

pub async fn insert_plan(
    name: &str,
    fee: FeePercent,
    conn: &mut SqliteConnection,
) -> Result<MerchantPlan, SettlementError> {
    let plan: MerchantPlan = sqlx::query_as("INSERT INTO merchant_plans (name, fee_bps) VALUES ($1, $2) RETURNING *")
        .bind(name)
        .bind(fee)
        .fetch_one(conn)
        .await?;
    debug!("🏪️ Created merchant plan '{}' (#{}) with a fee of {}", plan.name, plan.id, plan.fee_bps);
    Ok(plan)
}

pub async fn insert_merchant(
    merchant: NewMerchant,
    conn: &mut SqliteConnection,
) -> Result<MerchantAccount, SettlementError> {
    let id: i64 = sqlx::query_scalar("INSERT INTO merchant_accounts (name, plan_id) VALUES ($1, $2) RETURNING id")
        .bind(&merchant.name)
        .bind(merchant.plan_id)
        .fetch_one(&mut *conn)
        .await?;
    debug!("🏪️ Created merchant account #{id} for '{}'", merchant.name);
    fetch_merchant(id, conn).await?.ok_or(SettlementError::MerchantNotFound(id))
}

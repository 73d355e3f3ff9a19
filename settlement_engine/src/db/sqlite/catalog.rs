use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db::traits::SettlementError,
    db_types::{NewTier, Service, Tier},
};

pub async fn insert_service(
    merchant_id: i64,
    name: &str,
    conn: &mut SqliteConnection,
) -> Result<Service, SettlementError> {
    let service: Service = sqlx::query_as("INSERT INTO services (merchant_id, name) VALUES ($1, $2) RETURNING *")
        .bind(merchant_id)
        .bind(name)
        .fetch_one(conn)
        .await?;
    debug!("🛍️ Created service #{} '{}' for merchant #{merchant_id}", service.id, service.name);
    Ok(service)
}

pub async fn fetch_service(service_id: i64, conn: &mut SqliteConnection) -> Result<Option<Service>, SettlementError> {
    let service = sqlx::query_as("SELECT * FROM services WHERE id = $1").bind(service_id).fetch_optional(conn).await?;
    Ok(service)
}

pub async fn insert_tier(tier: NewTier, conn: &mut SqliteConnection) -> Result<Tier, SettlementError> {
    if tier.interval_count < 1 {
        return Err(SettlementError::InvalidState(format!(
            "Tier '{}' must have an interval count of at least 1",
            tier.name
        )));
    }
    let tier: Tier = sqlx::query_as(
        r#"INSERT INTO tiers (service_id, name, price, billing_interval, interval_count)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *"#,
    )
    .bind(tier.service_id)
    .bind(&tier.name)
    .bind(tier.price)
    .bind(tier.billing_interval)
    .bind(tier.interval_count)
    .fetch_one(conn)
    .await?;
    debug!(
        "🛍️ Created tier #{} '{}' ({} x {}) for service #{}",
        tier.id, tier.name, tier.interval_count, tier.billing_interval, tier.service_id
    );
    Ok(tier)
}

pub async fn fetch_tier(tier_id: i64, conn: &mut SqliteConnection) -> Result<Option<Tier>, SettlementError> {
    let tier = sqlx::query_as("SELECT * FROM tiers WHERE id = $1").bind(tier_id).fetch_optional(conn).await?;
    Ok(tier)
}

/// Fetches the tier and checks that it is sold by `service_id`, and that the service belongs to `merchant_id`.
pub async fn fetch_tier_for_service(
    merchant_id: i64,
    service_id: i64,
    tier_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Tier, SettlementError> {
    let service = fetch_service(service_id, &mut *conn).await?.ok_or(SettlementError::ServiceNotFound(service_id))?;
    if service.merchant_id != merchant_id {
        return Err(SettlementError::InvalidState(format!(
            "Service #{service_id} belongs to merchant #{}, not merchant #{merchant_id}",
            service.merchant_id
        )));
    }
    let tier = fetch_tier(tier_id, conn).await?.ok_or(SettlementError::TierNotFound(tier_id))?;
    if tier.service_id != service_id {
        return Err(SettlementError::InvalidState(format!(
            "Tier #{tier_id} belongs to service #{}, not service #{service_id}",
            tier.service_id
        )));
    }
    Ok(tier)
}

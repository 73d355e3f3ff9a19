use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::SqliteConnection;

use crate::{
    db::traits::{SettlementError, SubscriptionOutcome},
    db_types::{NewSubscription, Subscription, SubscriptionStatus, Tier},
    helpers::{plan_subscription_change, SubscriptionChange},
};

pub async fn fetch_subscription(
    subscription_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, SettlementError> {
    let sub =
        sqlx::query_as("SELECT * FROM subscriptions WHERE id = $1").bind(subscription_id).fetch_optional(conn).await?;
    Ok(sub)
}

pub async fn fetch_subscriptions_for_payer(
    payer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Subscription>, SettlementError> {
    let subs = sqlx::query_as("SELECT * FROM subscriptions WHERE payer_id = $1 ORDER BY id DESC")
        .bind(payer_id)
        .fetch_all(conn)
        .await?;
    Ok(subs)
}

/// The payer's subscription to the service that a new payment should be measured against: the `Active` one if there
/// is one, otherwise the most recent.
pub async fn fetch_latest_for_service(
    payer_id: &str,
    service_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, SettlementError> {
    let sub = sqlx::query_as(
        r#"SELECT * FROM subscriptions
        WHERE payer_id = $1 AND service_id = $2
        ORDER BY (status = 'Active') DESC, id DESC
        LIMIT 1"#,
    )
    .bind(payer_id)
    .bind(service_id)
    .fetch_optional(conn)
    .await?;
    Ok(sub)
}

pub async fn insert_subscription(
    sub: NewSubscription,
    conn: &mut SqliteConnection,
) -> Result<Subscription, SettlementError> {
    let sub: Subscription = sqlx::query_as(
        r#"INSERT INTO subscriptions (payer_id, service_id, tier_id, status, starts_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *"#,
    )
    .bind(&sub.payer_id)
    .bind(sub.service_id)
    .bind(sub.tier_id)
    .bind(sub.status)
    .bind(sub.starts_at)
    .bind(sub.expires_at)
    .fetch_one(conn)
    .await?;
    debug!("🗓️ Subscription #{} ({}) stored for {}", sub.id, sub.status, sub.payer_id);
    Ok(sub)
}

/// Moves the expiry of a subscription and switches it to the tier that paid for the extension.
pub async fn extend_subscription(
    subscription_id: i64,
    tier_id: i64,
    expires_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Subscription, SettlementError> {
    let sub: Option<Subscription> = sqlx::query_as(
        r#"UPDATE subscriptions SET tier_id = $1, expires_at = $2, updated_at = $3
        WHERE id = $4
        RETURNING *"#,
    )
    .bind(tier_id)
    .bind(expires_at)
    .bind(Utc::now())
    .bind(subscription_id)
    .fetch_optional(conn)
    .await?;
    sub.ok_or(SettlementError::SubscriptionNotFound(subscription_id))
}

/// Sets the status of a subscription, returning the updated row. If the subscription already has the status, nothing
/// is written and `None` is returned.
pub async fn set_status(
    subscription_id: i64,
    status: SubscriptionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, SettlementError> {
    let sub = sqlx::query_as(
        r#"UPDATE subscriptions SET status = $1, updated_at = $2
        WHERE id = $3 AND status <> $1
        RETURNING *"#,
    )
    .bind(status)
    .bind(Utc::now())
    .bind(subscription_id)
    .fetch_optional(conn)
    .await?;
    Ok(sub)
}

/// Applies a paid-for period of `tier` to the payer's subscription for the tier's service.
///
/// The existing subscription is extended from its current expiry if it is still current, otherwise a new one is
/// created starting now. A stale row that is still flagged `Active` is marked `Expired` first, so that each payer has
/// at most one `Active` subscription per service.
///
/// This must run inside a transaction that already holds the write lock.
pub async fn create_or_extend(
    payer_id: &str,
    tier: &Tier,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(Subscription, SubscriptionOutcome), SettlementError> {
    let existing = fetch_latest_for_service(payer_id, tier.service_id, &mut *conn).await?;
    match plan_subscription_change(existing.as_ref(), tier, now)? {
        SubscriptionChange::Extend { subscription_id, expires_at } => {
            let sub = extend_subscription(subscription_id, tier.id, expires_at, conn).await?;
            info!(
                "🗓️ Subscription #{subscription_id} for {payer_id} extended to {}",
                sub.expires_at.map(|e| e.to_rfc3339()).unwrap_or_else(|| "forever".into())
            );
            Ok((sub, SubscriptionOutcome::Extended))
        },
        SubscriptionChange::Create { starts_at, expires_at, supersedes } => {
            if let Some(stale_id) = supersedes {
                set_status(stale_id, SubscriptionStatus::Expired, &mut *conn).await?;
                debug!("🗓️ Subscription #{stale_id} for {payer_id} had lapsed and has been marked as expired");
            }
            let new_sub = NewSubscription {
                payer_id: payer_id.to_string(),
                service_id: tier.service_id,
                tier_id: tier.id,
                status: SubscriptionStatus::Active,
                starts_at,
                expires_at,
            };
            let sub = insert_subscription(new_sub, conn).await?;
            info!("🗓️ New subscription #{} to service #{} created for {payer_id}", sub.id, sub.service_id);
            Ok((sub, SubscriptionOutcome::Created))
        },
    }
}

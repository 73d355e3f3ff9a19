//! Coupons and their redemptions.
//!
//! The use counter is claimed with a single guarded increment, so two payers racing for the last use of a coupon
//! cannot both get it. The `(coupon_id, payer_id)` unique index stops a payer redeeming the same coupon twice.
use log::{debug, warn};
use sqlx::SqliteConnection;

use crate::{
    db::traits::SettlementError,
    db_types::{Coupon, CouponRedemption, NewCoupon},
};

pub async fn insert_coupon(coupon: NewCoupon, conn: &mut SqliteConnection) -> Result<Coupon, SettlementError> {
    if !(0..=100).contains(&coupon.discount_percent) {
        return Err(SettlementError::InvalidAmount(format!(
            "Coupon discount must be between 0 and 100 percent, not {}",
            coupon.discount_percent
        )));
    }
    let coupon: Coupon = sqlx::query_as(
        r#"INSERT INTO coupons (merchant_id, code, discount_percent, max_uses, service_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *"#,
    )
    .bind(coupon.merchant_id)
    .bind(&coupon.code)
    .bind(coupon.discount_percent)
    .bind(coupon.max_uses)
    .bind(coupon.service_id)
    .fetch_one(conn)
    .await?;
    debug!("🎟️ Coupon {} (#{}) created for merchant #{}", coupon.code, coupon.id, coupon.merchant_id);
    Ok(coupon)
}

pub async fn fetch_coupon(coupon_id: i64, conn: &mut SqliteConnection) -> Result<Option<Coupon>, SettlementError> {
    let coupon = sqlx::query_as("SELECT * FROM coupons WHERE id = $1").bind(coupon_id).fetch_optional(conn).await?;
    Ok(coupon)
}

pub async fn fetch_coupon_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<Coupon>, SettlementError> {
    let coupon = sqlx::query_as("SELECT * FROM coupons WHERE code = $1").bind(code).fetch_optional(conn).await?;
    Ok(coupon)
}

pub async fn fetch_redemptions_for_coupon(
    coupon_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<CouponRedemption>, SettlementError> {
    let redemptions = sqlx::query_as("SELECT * FROM coupon_redemptions WHERE coupon_id = $1 ORDER BY id ASC")
        .bind(coupon_id)
        .fetch_all(conn)
        .await?;
    Ok(redemptions)
}

/// Takes one use of the coupon, failing with `CouponExhausted` if none are left.
pub async fn claim_use(coupon_id: i64, conn: &mut SqliteConnection) -> Result<Coupon, SettlementError> {
    let coupon: Option<Coupon> = sqlx::query_as(
        r#"UPDATE coupons SET current_uses = current_uses + 1
        WHERE id = $1 AND (max_uses IS NULL OR current_uses < max_uses)
        RETURNING *"#,
    )
    .bind(coupon_id)
    .fetch_optional(&mut *conn)
    .await?;
    match coupon {
        Some(c) => Ok(c),
        None => {
            let coupon = fetch_coupon(coupon_id, conn)
                .await?
                .ok_or_else(|| SettlementError::CouponNotFound(format!("#{coupon_id}")))?;
            warn!("🎟️ Coupon {} has been used {} times and cannot be redeemed again", coupon.code, coupon.current_uses);
            Err(SettlementError::CouponExhausted(coupon.code))
        },
    }
}

/// Claims a use of the coupon and records the redemption against `subscription_id`.
///
/// This must run inside a transaction so that a failed redemption releases the claimed use.
pub async fn redeem(
    coupon_id: i64,
    payer_id: &str,
    merchant_id: i64,
    service_id: i64,
    subscription_id: i64,
    payment_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<CouponRedemption, SettlementError> {
    let coupon = claim_use(coupon_id, &mut *conn).await?;
    record_redemption(&coupon, payer_id, merchant_id, service_id, subscription_id, payment_id, conn).await
}

/// Records the redemption of a coupon whose use has already been claimed in the current transaction.
///
/// The coupon must have been issued by `merchant_id`, the merchant that owns `service_id`. It must be scoped to
/// `service_id` (or unscoped), and the payer must not have redeemed it before.
pub async fn record_redemption(
    coupon: &Coupon,
    payer_id: &str,
    merchant_id: i64,
    service_id: i64,
    subscription_id: i64,
    payment_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<CouponRedemption, SettlementError> {
    if coupon.merchant_id != merchant_id {
        return Err(SettlementError::InvalidState(format!(
            "Coupon {} was issued by merchant #{} and cannot be used with merchant #{merchant_id}",
            coupon.code, coupon.merchant_id
        )));
    }
    if !coupon.applies_to_service(service_id) {
        return Err(SettlementError::InvalidState(format!(
            "Coupon {} cannot be used for service #{service_id}",
            coupon.code
        )));
    }
    let result = sqlx::query_as::<_, CouponRedemption>(
        r#"INSERT INTO coupon_redemptions (coupon_id, payer_id, subscription_id, payment_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *"#,
    )
    .bind(coupon.id)
    .bind(payer_id)
    .bind(subscription_id)
    .bind(payment_id)
    .fetch_one(conn)
    .await;
    match result {
        Ok(redemption) => {
            debug!(
                "🎟️ Coupon {} redeemed by {payer_id} ({} of {})",
                coupon.code,
                coupon.current_uses,
                coupon.max_uses.map(|m| m.to_string()).unwrap_or_else(|| "unlimited".into())
            );
            Ok(redemption)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            warn!("🎟️ {payer_id} tried to redeem coupon {} a second time", coupon.code);
            Err(SettlementError::CouponAlreadyRedeemed { coupon_id: coupon.id, payer_id: payer_id.to_string() })
        },
        Err(e) => Err(e.into()),
    }
}

//! Payment rows and their status transitions.
//!
//! Every transition is a guarded `UPDATE ... WHERE status = <expected>`, so two concurrent attempts to move the same
//! payment out of a state cannot both succeed. When the guard does not match, [`explain_missed_transition`] works out
//! whether the payment is missing or in the wrong state.
use chrono::Utc;
use log::{debug, trace};
use mse_common::Money;
use sqlx::SqliteConnection;

use super::{catalog, coupons};
use crate::{
    db::traits::{InsertPaymentResult, SettlementError},
    db_types::{NewPayment, Payment, PaymentStatus, Subscription},
};

pub async fn idempotent_insert(
    payment: NewPayment,
    conn: &mut SqliteConnection,
) -> Result<InsertPaymentResult, SettlementError> {
    if !payment.amount.is_positive() {
        return Err(SettlementError::InvalidAmount(format!(
            "Payment {} must be for a positive amount, not {}",
            payment.gateway_ref, payment.amount
        )));
    }
    let result = sqlx::query_scalar::<_, i64>(
        r#"INSERT INTO payments (
            gateway_ref,
            payer_id,
            merchant_id,
            service_id,
            tier_id,
            amount,
            currency,
            coupon_id,
            discount_amount
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id"#,
    )
    .bind(&payment.gateway_ref)
    .bind(&payment.payer_id)
    .bind(payment.merchant_id)
    .bind(payment.service_id)
    .bind(payment.tier_id)
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(payment.coupon_id)
    .bind(payment.discount_amount)
    .fetch_one(&mut *conn)
    .await;
    match result {
        Ok(id) => {
            debug!("🗃️ Payment [{}] stored as #{id}, pending settlement", payment.gateway_ref);
            Ok(InsertPaymentResult::Inserted(id))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = fetch_payment_by_gateway_ref(&payment.gateway_ref, conn)
                .await?
                .ok_or_else(|| SettlementError::PaymentNotFound(payment.gateway_ref.clone()))?;
            trace!("🗃️ Payment [{}] already exists as #{}", payment.gateway_ref, existing.id);
            Ok(InsertPaymentResult::AlreadyExists(existing.id))
        },
        Err(e) => Err(e.into()),
    }
}

/// Checks the discount claimed by a new payment. A coupon payment must carry exactly the discount its coupon gives on
/// the tier's list price, and the coupon must belong to the payment's merchant and service. A payment without a
/// coupon carries no discount.
///
/// This only reads, so it runs before the insert transaction is opened.
pub async fn check_discount(payment: &NewPayment, conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    let Some(coupon_id) = payment.coupon_id else {
        if payment.discount_amount.value() != 0 {
            return Err(SettlementError::InvalidAmount(format!(
                "Payment {} claims a discount of {} without a coupon",
                payment.gateway_ref, payment.discount_amount
            )));
        }
        return Ok(());
    };
    let coupon = coupons::fetch_coupon(coupon_id, &mut *conn)
        .await?
        .ok_or_else(|| SettlementError::CouponNotFound(format!("#{coupon_id}")))?;
    if coupon.merchant_id != payment.merchant_id || !coupon.applies_to_service(payment.service_id) {
        return Err(SettlementError::InvalidState(format!(
            "Coupon {} cannot be used for service #{} of merchant #{}",
            coupon.code, payment.service_id, payment.merchant_id
        )));
    }
    let tier = catalog::fetch_tier(payment.tier_id, conn).await?.ok_or(SettlementError::TierNotFound(payment.tier_id))?;
    let expected = coupon.discount_for(tier.price).ok_or_else(|| {
        SettlementError::InvalidAmount(format!("Coupon {} cannot discount a price of {}", coupon.code, tier.price))
    })?;
    if payment.discount_amount != expected {
        debug!(
            "🎟️ Payment {} claims {} off with coupon {}, which gives {expected}",
            payment.gateway_ref, payment.discount_amount, coupon.code
        );
        return Err(SettlementError::InvalidAmount(format!(
            "Coupon {} gives a discount of {expected} on {}, not {}",
            coupon.code, tier.name, payment.discount_amount
        )));
    }
    Ok(())
}

pub async fn fetch_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, SettlementError> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(payment_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_gateway_ref(
    gateway_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SettlementError> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE gateway_ref = $1").bind(gateway_ref).fetch_optional(conn).await?;
    Ok(payment)
}

/// `Pending` -> `Success`. This is the first write of a settlement, and the guard is what makes settlement idempotent.
pub async fn mark_settled(
    payment_id: i64,
    provider_tx_id: &str,
    provider_response: &str,
    conn: &mut SqliteConnection,
) -> Result<Payment, SettlementError> {
    let payment: Option<Payment> = sqlx::query_as(
        r#"UPDATE payments SET
            status = $1,
            provider_tx_id = $2,
            provider_response = $3,
            updated_at = $4
        WHERE id = $5 AND status = $6
        RETURNING *"#,
    )
    .bind(PaymentStatus::Success)
    .bind(provider_tx_id)
    .bind(provider_response)
    .bind(Utc::now())
    .bind(payment_id)
    .bind(PaymentStatus::Pending)
    .fetch_optional(&mut *conn)
    .await?;
    match payment {
        Some(p) => Ok(p),
        None => Err(explain_missed_transition(payment_id, PaymentStatus::Pending, conn).await),
    }
}

/// Records the settlement figures and the resulting subscription on a settled payment.
pub async fn record_settlement(
    payment_id: i64,
    platform_fee: Money,
    net_amount: Money,
    subscription_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Payment, SettlementError> {
    let payment = sqlx::query_as(
        r#"UPDATE payments SET
            platform_fee = $1,
            net_amount = $2,
            subscription_id = $3,
            updated_at = $4
        WHERE id = $5
        RETURNING *"#,
    )
    .bind(platform_fee)
    .bind(net_amount)
    .bind(subscription_id)
    .bind(Utc::now())
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    payment.ok_or_else(|| SettlementError::PaymentNotFound(format!("#{payment_id}")))
}

/// Links a manually granted subscription to a `Failed` payment, for payers who were fulfilled by hand after the gateway
/// gave up on their charge.
///
/// The payment must belong to the same payer, merchant and service as the grant, and must not be linked to a
/// subscription yet. `Pending` payments are refused, since settling them later would grant a second period. Settled
/// payments always carry the subscription they paid for, so they never match either.
pub async fn attach_subscription(
    payment_id: i64,
    subscription: &Subscription,
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    let result = sqlx::query(
        r#"UPDATE payments SET subscription_id = $1, updated_at = $2
        WHERE id = $3
            AND payer_id = $4
            AND merchant_id = $5
            AND service_id = $6
            AND status = $7
            AND subscription_id IS NULL"#,
    )
    .bind(subscription.id)
    .bind(Utc::now())
    .bind(payment_id)
    .bind(&subscription.payer_id)
    .bind(merchant_id)
    .bind(subscription.service_id)
    .bind(PaymentStatus::Failed)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 1 {
        return Ok(());
    }
    let payment =
        fetch_payment(payment_id, conn).await?.ok_or_else(|| SettlementError::PaymentNotFound(format!("#{payment_id}")))?;
    let reason = if payment.payer_id != subscription.payer_id {
        format!("it belongs to {}", payment.payer_id)
    } else if payment.merchant_id != merchant_id || payment.service_id != subscription.service_id {
        format!("it was made to service #{} of merchant #{}", payment.service_id, payment.merchant_id)
    } else if let Some(existing) = payment.subscription_id {
        format!("it is already linked to subscription #{existing}")
    } else {
        format!("it is {}", payment.status)
    };
    debug!("🗓️ Refusing to attach subscription #{} to payment #{payment_id}: {reason}", subscription.id);
    Err(SettlementError::InvalidState(format!(
        "Subscription #{} cannot be attached to payment #{payment_id}, because {reason}",
        subscription.id
    )))
}

/// `Pending` -> `Failed`
pub async fn mark_failed(payment_id: i64, reason: &str, conn: &mut SqliteConnection) -> Result<Payment, SettlementError> {
    let payment: Option<Payment> = sqlx::query_as(
        r#"UPDATE payments SET status = $1, failure_reason = $2, updated_at = $3
        WHERE id = $4 AND status = $5
        RETURNING *"#,
    )
    .bind(PaymentStatus::Failed)
    .bind(reason)
    .bind(Utc::now())
    .bind(payment_id)
    .bind(PaymentStatus::Pending)
    .fetch_optional(&mut *conn)
    .await?;
    match payment {
        Some(p) => Ok(p),
        None => Err(explain_missed_transition(payment_id, PaymentStatus::Pending, conn).await),
    }
}

/// `Success` -> `Refunded`
pub async fn mark_refunded(payment_id: i64, conn: &mut SqliteConnection) -> Result<Payment, SettlementError> {
    let payment: Option<Payment> = sqlx::query_as(
        r#"UPDATE payments SET status = $1, updated_at = $2
        WHERE id = $3 AND status = $4
        RETURNING *"#,
    )
    .bind(PaymentStatus::Refunded)
    .bind(Utc::now())
    .bind(payment_id)
    .bind(PaymentStatus::Success)
    .fetch_optional(&mut *conn)
    .await?;
    match payment {
        Some(p) => Ok(p),
        None => Err(explain_missed_transition(payment_id, PaymentStatus::Success, conn).await),
    }
}

/// Produces the error for a status transition whose guard did not match.
///
/// A payment that has already reached the state the caller was trying to leave towards (anything past `Pending` for
/// settlement, `Refunded` for refunds) is reported as `AlreadyProcessed`. Any other mismatch is an `InvalidState`.
async fn explain_missed_transition(
    payment_id: i64,
    expected: PaymentStatus,
    conn: &mut SqliteConnection,
) -> SettlementError {
    let payment = match fetch_payment(payment_id, conn).await {
        Ok(Some(p)) => p,
        Ok(None) => return SettlementError::PaymentNotFound(format!("#{payment_id}")),
        Err(e) => return e,
    };
    let status = payment.status;
    use PaymentStatus::*;
    match (expected, status) {
        (Pending, _) | (Success, Refunded) => {
            debug!("🗃️ Payment #{payment_id} is {status}. It has already been processed.");
            SettlementError::AlreadyProcessed { payment_id, status }
        },
        _ => SettlementError::InvalidState(format!(
            "Payment #{payment_id} is {status}, but it must be {expected} for this operation"
        )),
    }
}

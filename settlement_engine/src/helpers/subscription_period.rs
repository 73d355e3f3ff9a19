//! Subscription period arithmetic.
//!
//! Day and week intervals are fixed-length durations. Month and year intervals are calendar-aware: adding a month to
//! the 31st of January lands on the last day of February rather than an invalid (or silently rolled-over) date.
use chrono::{DateTime, Duration, Months, Utc};
use thiserror::Error;

use crate::db_types::{BillingInterval, Subscription, SubscriptionStatus, Tier};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("Interval count must be at least 1, but was {0}")]
    InvalidIntervalCount(i64),
    #[error("Adding {count} x {interval} to {from} is out of the supported date range")]
    OutOfRange { from: DateTime<Utc>, interval: BillingInterval, count: i64 },
}

/// Advances `from` by `count` billing intervals.
///
/// Returns `Ok(None)` for lifetime intervals, meaning "never expires".
pub fn advance_expiry(
    from: DateTime<Utc>,
    interval: BillingInterval,
    count: i64,
) -> Result<Option<DateTime<Utc>>, PeriodError> {
    if count < 1 {
        return Err(PeriodError::InvalidIntervalCount(count));
    }
    let out_of_range = || PeriodError::OutOfRange { from, interval, count };
    let months = |per_unit: i64| {
        count
            .checked_mul(per_unit)
            .and_then(|m| u32::try_from(m).ok())
            .and_then(|m| from.checked_add_months(Months::new(m)))
    };
    let result = match interval {
        BillingInterval::Day => Duration::try_days(count).and_then(|d| from.checked_add_signed(d)),
        BillingInterval::Week => Duration::try_weeks(count).and_then(|d| from.checked_add_signed(d)),
        BillingInterval::Month => months(1),
        BillingInterval::Year => months(12),
        BillingInterval::Lifetime => return Ok(None),
    };
    result.map(Some).ok_or_else(out_of_range)
}

/// What a successful payment does to the payer's subscription for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// Start a new subscription at `starts_at`.
    Create {
        starts_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        /// A lapsed subscription that is still flagged `Active` and must be marked `Expired`.
        supersedes: Option<i64>,
    },
    /// Push the expiry of an existing, current subscription further out.
    Extend { subscription_id: i64, expires_at: Option<DateTime<Utc>> },
}

/// Decides between creating a new subscription and extending `existing`.
///
/// A current subscription is extended from its existing expiry date, so time remaining on an early renewal is
/// preserved. Anything else (no subscription, a cancelled or expired one, or an `Active` one whose expiry has already
/// passed) results in a fresh subscription that starts at `now`.
pub fn plan_subscription_change(
    existing: Option<&Subscription>,
    tier: &Tier,
    now: DateTime<Utc>,
) -> Result<SubscriptionChange, PeriodError> {
    match existing {
        Some(sub) if sub.is_current(now) => {
            let expires_at = match sub.expires_at {
                None => None,
                Some(current) => advance_expiry(current, tier.billing_interval, tier.interval_count)?,
            };
            Ok(SubscriptionChange::Extend { subscription_id: sub.id, expires_at })
        },
        _ => {
            let expires_at = advance_expiry(now, tier.billing_interval, tier.interval_count)?;
            let supersedes = existing.filter(|s| s.status == SubscriptionStatus::Active).map(|s| s.id);
            Ok(SubscriptionChange::Create { starts_at: now, expires_at, supersedes })
        },
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use mse_common::Money;

    use super::*;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn tier(interval: BillingInterval, count: i64) -> Tier {
        Tier {
            id: 1,
            service_id: 1,
            name: "Gold".into(),
            price: Money::from_major(10),
            billing_interval: interval,
            interval_count: count,
            created_at: Utc::now(),
        }
    }

    fn subscription(status: SubscriptionStatus, expires_at: Option<DateTime<Utc>>) -> Subscription {
        Subscription {
            id: 42,
            payer_id: "alice".into(),
            service_id: 1,
            tier_id: 1,
            status,
            starts_at: utc(2024, 1, 1),
            expires_at,
            created_at: utc(2024, 1, 1),
            updated_at: utc(2024, 1, 1),
        }
    }

    #[test]
    fn month_end_is_clamped() {
        let next = advance_expiry(utc(2023, 1, 31), BillingInterval::Month, 1).unwrap();
        assert_eq!(next, Some(utc(2023, 2, 28)));
        let leap = advance_expiry(utc(2024, 1, 31), BillingInterval::Month, 1).unwrap();
        assert_eq!(leap, Some(utc(2024, 2, 29)));
        let quarter = advance_expiry(utc(2024, 11, 30), BillingInterval::Month, 3).unwrap();
        assert_eq!(quarter, Some(utc(2025, 2, 28)));
    }

    #[test]
    fn leap_day_plus_one_year() {
        let next = advance_expiry(utc(2024, 2, 29), BillingInterval::Year, 1).unwrap();
        assert_eq!(next, Some(utc(2025, 2, 28)));
    }

    #[test]
    fn fixed_length_intervals() {
        let from = utc(2024, 3, 1);
        assert_eq!(advance_expiry(from, BillingInterval::Day, 30).unwrap(), Some(utc(2024, 3, 31)));
        assert_eq!(advance_expiry(from, BillingInterval::Week, 2).unwrap(), Some(utc(2024, 3, 15)));
        assert_eq!(advance_expiry(from, BillingInterval::Lifetime, 1).unwrap(), None);
    }

    #[test]
    fn invalid_counts() {
        let from = utc(2024, 3, 1);
        assert_eq!(advance_expiry(from, BillingInterval::Day, 0), Err(PeriodError::InvalidIntervalCount(0)));
        assert!(matches!(
            advance_expiry(from, BillingInterval::Year, i64::MAX),
            Err(PeriodError::OutOfRange { .. })
        ));
    }

    #[test]
    fn no_subscription_creates() {
        let now = utc(2024, 5, 1);
        let change = plan_subscription_change(None, &tier(BillingInterval::Day, 30), now).unwrap();
        assert_eq!(change, SubscriptionChange::Create {
            starts_at: now,
            expires_at: Some(utc(2024, 5, 31)),
            supersedes: None
        });
    }

    #[test]
    fn current_subscription_stacks() {
        let now = utc(2024, 5, 1);
        let sub = subscription(SubscriptionStatus::Active, Some(now + Duration::days(10)));
        let change = plan_subscription_change(Some(&sub), &tier(BillingInterval::Day, 30), now).unwrap();
        assert_eq!(change, SubscriptionChange::Extend {
            subscription_id: 42,
            expires_at: Some(now + Duration::days(40))
        });
    }

    #[test]
    fn lapsed_subscription_resets_from_now() {
        let now = utc(2024, 5, 1);
        let sub = subscription(SubscriptionStatus::Active, Some(now - Duration::days(5)));
        let change = plan_subscription_change(Some(&sub), &tier(BillingInterval::Day, 30), now).unwrap();
        assert_eq!(change, SubscriptionChange::Create {
            starts_at: now,
            expires_at: Some(now + Duration::days(30)),
            supersedes: Some(42)
        });
    }

    #[test]
    fn cancelled_subscription_is_not_extended() {
        let now = utc(2024, 5, 1);
        let sub = subscription(SubscriptionStatus::Cancelled, Some(now + Duration::days(10)));
        let change = plan_subscription_change(Some(&sub), &tier(BillingInterval::Week, 1), now).unwrap();
        assert_eq!(change, SubscriptionChange::Create {
            starts_at: now,
            expires_at: Some(now + Duration::weeks(1)),
            supersedes: None
        });
    }

    #[test]
    fn lifetime_never_expires() {
        let now = utc(2024, 5, 1);
        let sub = subscription(SubscriptionStatus::Active, Some(now + Duration::days(3)));
        let change = plan_subscription_change(Some(&sub), &tier(BillingInterval::Lifetime, 1), now).unwrap();
        assert_eq!(change, SubscriptionChange::Extend { subscription_id: 42, expires_at: None });
        let forever = subscription(SubscriptionStatus::Active, None);
        let change = plan_subscription_change(Some(&forever), &tier(BillingInterval::Month, 1), now).unwrap();
        assert_eq!(change, SubscriptionChange::Extend { subscription_id: 42, expires_at: None });
    }
}

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::Money;

/// 5.00%, charged when a merchant has no plan record.
pub const DEFAULT_FEE_BPS: i64 = 500;
const BPS_PER_HUNDRED_PERCENT: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid fee percentage: {0}")]
pub struct FeePercentError(String);

//--------------------------------------     FeePercent      ---------------------------------------------------------
/// A percentage with two decimal places, stored as basis points (`500` is 5.00%).
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct FeePercent(i64);

impl Default for FeePercent {
    fn default() -> Self {
        Self(DEFAULT_FEE_BPS)
    }
}

impl FeePercent {
    pub fn from_bps(bps: i64) -> Result<Self, FeePercentError> {
        if (0..=BPS_PER_HUNDRED_PERCENT).contains(&bps) {
            Ok(Self(bps))
        } else {
            Err(FeePercentError(format!("{bps} basis points is outside 0% - 100%")))
        }
    }

    pub fn bps(&self) -> i64 {
        self.0
    }

    /// `amount * percent / 100`, rounded half away from zero to the nearest minor unit.
    pub fn fee_for(&self, amount: Money) -> Money {
        let scaled = i128::from(amount.value()) * i128::from(self.0);
        let divisor = i128::from(BPS_PER_HUNDRED_PERCENT);
        let half = divisor / 2;
        let rounded = if scaled >= 0 { (scaled + half) / divisor } else { (scaled - half) / divisor };
        // |fee| <= |amount| because the rate is capped at 100%, so this always fits
        Money::from(i64::try_from(rounded).unwrap_or(i64::MAX))
    }

    /// Splits a gross amount into `(platform_fee, net_amount)`.
    pub fn split(&self, gross: Money) -> (Money, Money) {
        let fee = self.fee_for(gross);
        (fee, gross - fee)
    }
}

impl Display for FeePercent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// Accepts `"5"`, `"2.5"`, `"12.75"` and an optional trailing `%`.
impl FromStr for FeePercent {
    type Err = FeePercentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('%');
        let as_money = trimmed.parse::<Money>().map_err(|_| FeePercentError(s.to_string()))?;
        Self::from_bps(as_money.value())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn five_percent_of_one_hundred() {
        let (fee, net) = FeePercent::default().split(Money::from_major(100));
        assert_eq!(fee, Money::from_major(5));
        assert_eq!(net, Money::from_major(95));
    }

    #[test]
    fn rounds_half_up_to_the_cent() {
        let rate = "2.5".parse::<FeePercent>().unwrap();
        assert_eq!(rate.bps(), 250);
        // 2.5% of 0.99 = 0.02475
        assert_eq!(rate.fee_for(Money::from(99)), Money::from(2));
        // 2.5% of 1.00 = 0.025
        assert_eq!(rate.fee_for(Money::from(100)), Money::from(3));
        assert_eq!(rate.fee_for(Money::from(-100)), Money::from(-3));
    }

    #[test]
    fn fee_plus_net_is_gross() {
        let rate = "7.35%".parse::<FeePercent>().unwrap();
        for cents in [1, 13, 999, 12_345, 1_000_001] {
            let (fee, net) = rate.split(Money::from(cents));
            assert_eq!(fee + net, Money::from(cents));
        }
    }

    #[test]
    fn bounds() {
        assert!(FeePercent::from_bps(-1).is_err());
        assert!(FeePercent::from_bps(10_001).is_err());
        assert!("abc".parse::<FeePercent>().is_err());
        assert_eq!(FeePercent::from_bps(10_000).unwrap().to_string(), "100.00%");
        assert_eq!(FeePercent::default().to_string(), "5.00%");
    }
}

use mse_common::Money;
use thiserror::Error;

use crate::{db_types::PaymentStatus, helpers::PeriodError};

/// Failures raised by the settlement engine.
///
/// Every operation is all-or-nothing, so whenever one of these is returned, no balance, ledger, payment, subscription
/// or coupon state has changed. Apart from `DatabaseError`, these are business-rule failures and retrying the same
/// request will produce the same result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("There was an error communicating with the database: {0}")]
    DatabaseError(String),
    #[error("The requested payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("The requested merchant account #{0} does not exist")]
    MerchantNotFound(i64),
    #[error("The requested subscription #{0} does not exist")]
    SubscriptionNotFound(i64),
    #[error("The requested coupon {0} does not exist")]
    CouponNotFound(String),
    #[error("The requested tier #{0} does not exist")]
    TierNotFound(i64),
    #[error("The requested service #{0} does not exist")]
    ServiceNotFound(i64),
    #[error("The requested payout request #{0} does not exist")]
    PayoutNotFound(i64),
    #[error("Payment #{payment_id} has already been processed. Its status is {status}")]
    AlreadyProcessed { payment_id: i64, status: PaymentStatus },
    #[error("Merchant #{merchant_id} has insufficient funds. Available: {available}, requested: {requested}")]
    InsufficientFunds { merchant_id: i64, available: Money, requested: Money },
    #[error("Invalid state. {0}")]
    InvalidState(String),
    #[error("Coupon {0} has reached its maximum number of uses")]
    CouponExhausted(String),
    #[error("Coupon #{coupon_id} has already been redeemed by {payer_id}")]
    CouponAlreadyRedeemed { coupon_id: i64, payer_id: String },
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
}

impl SettlementError {
    /// True for the family of "referenced entity does not exist" errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PaymentNotFound(_)
                | Self::MerchantNotFound(_)
                | Self::SubscriptionNotFound(_)
                | Self::CouponNotFound(_)
                | Self::TierNotFound(_)
                | Self::ServiceNotFound(_)
                | Self::PayoutNotFound(_)
        )
    }

    /// Webhook deliveries are retried by gateways. A duplicate delivery for a payment that has already been processed
    /// surfaces as `AlreadyProcessed`, which callers should acknowledge as a success.
    pub fn is_benign_duplicate(&self) -> bool {
        matches!(self, Self::AlreadyProcessed { .. })
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}

impl From<PeriodError> for SettlementError {
    fn from(e: PeriodError) -> Self {
        SettlementError::InvalidState(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification() {
        assert!(SettlementError::PaymentNotFound("#1".into()).is_not_found());
        assert!(SettlementError::PayoutNotFound(1).is_not_found());
        assert!(!SettlementError::CouponExhausted("X".into()).is_not_found());
        let dup = SettlementError::AlreadyProcessed { payment_id: 1, status: PaymentStatus::Success };
        assert!(dup.is_benign_duplicate());
        assert!(!dup.is_not_found());
        assert!(dup.to_string().contains("Success"));
    }
}

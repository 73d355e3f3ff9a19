use serde::{Deserialize, Serialize};

use crate::{
    db::traits::{RefundOutcome, SettlementOutcome},
    db_types::{PayoutRequest, PayoutStatus},
};

/// A payment has been settled: the merchant was credited and the subscription fulfilled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettledEvent {
    pub outcome: SettlementOutcome,
}

impl PaymentSettledEvent {
    pub fn new(outcome: SettlementOutcome) -> Self {
        Self { outcome }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundedEvent {
    pub outcome: RefundOutcome,
}

impl PaymentRefundedEvent {
    pub fn new(outcome: RefundOutcome) -> Self {
        Self { outcome }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutStatusChangedEvent {
    pub payout: PayoutRequest,
    pub old_status: PayoutStatus,
}

impl PayoutStatusChangedEvent {
    pub fn new(payout: PayoutRequest, old_status: PayoutStatus) -> Self {
        Self { payout, old_status }
    }

    pub fn new_status(&self) -> PayoutStatus {
        self.payout.status
    }
}

#[derive(Debug, Clone)]
pub enum EventType {
    PaymentSettled(PaymentSettledEvent),
    PaymentRefunded(PaymentRefundedEvent),
    PayoutStatusChanged(PayoutStatusChangedEvent),
}

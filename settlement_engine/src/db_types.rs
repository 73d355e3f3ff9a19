use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use mse_common::{FeePercent, Money};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {0} value: {1}")]
pub struct ConversionError(&'static str, String);

/// Display and FromStr for the enum columns. The string form is the variant name, which is also how sqlx stores the
/// value.
macro_rules! string_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str(stringify!($variant)),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(if s.eq_ignore_ascii_case(stringify!($variant)) {
                    return Ok(Self::$variant);
                })+
                Err(ConversionError(stringify!($name), s.to_string()))
            }
        }
    };
}

//--------------------------------------      EntryType      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EntryType {
    /// Increases the merchant's available balance
    Credit,
    /// Decreases the merchant's available balance
    Debit,
}

string_enum!(EntryType { Credit, Debit });

impl EntryType {
    /// Applies the sign convention of the ledger to a positive amount.
    pub fn signed(&self, amount: Money) -> Money {
        match self {
            EntryType::Credit => amount,
            EntryType::Debit => -amount,
        }
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Created by checkout, waiting for the gateway to confirm the charge.
    Pending,
    /// Settled. The merchant has been credited and the subscription fulfilled.
    Success,
    /// The gateway reported the charge as failed.
    Failed,
    /// Reversed after settlement.
    Refunded,
}

string_enum!(PaymentStatus { Pending, Success, Failed, Refunded });

//--------------------------------------  SubscriptionStatus ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
    Pending,
}

string_enum!(SubscriptionStatus { Active, Expired, Cancelled, Pending });

//--------------------------------------   BillingInterval   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum BillingInterval {
    Day,
    Week,
    Month,
    Year,
    /// A persistent entitlement that never expires
    Lifetime,
}

string_enum!(BillingInterval { Day, Week, Month, Year, Lifetime });

//--------------------------------------     RefundStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(RefundStatus { Pending, Approved, Rejected });

//--------------------------------------     PayoutStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Funds are reserved, waiting for review
    Pending,
    Approved,
    /// Funds have been returned to the merchant's available balance
    Rejected,
    /// The transfer has been executed by the disbursement process
    Completed,
}

string_enum!(PayoutStatus { Pending, Approved, Rejected, Completed });

//--------------------------------------     MerchantPlan    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MerchantPlan {
    pub id: i64,
    pub name: String,
    pub fee_bps: FeePercent,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   MerchantAccount   ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MerchantAccount {
    pub id: i64,
    pub name: String,
    pub plan_id: Option<i64>,
    /// The fee of the merchant's plan, if the merchant has one.
    pub plan_fee: Option<FeePercent>,
    /// Withdrawable funds. Only the ledger primitive writes this field.
    pub available_balance: Money,
    /// Funds held pending a fulfilment or dispute window.
    pub pending_escrow: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MerchantAccount {
    /// The platform fee charged to this merchant, falling back to `default` when the merchant has no plan.
    pub fn fee_percent(&self, default: FeePercent) -> FeePercent {
        self.plan_fee.unwrap_or(default)
    }
}

#[derive(Debug, Clone)]
pub struct NewMerchant {
    pub name: String,
    pub plan_id: Option<i64>,
}

impl NewMerchant {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), plan_id: None }
    }

    pub fn with_plan(mut self, plan_id: i64) -> Self {
        self.plan_id = Some(plan_id);
        self
    }
}

//--------------------------------------      Service        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Tier         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Tier {
    pub id: i64,
    pub service_id: i64,
    pub name: String,
    pub price: Money,
    pub billing_interval: BillingInterval,
    /// Number of `billing_interval` units bought by one payment. A 30-day tier is `Day` x 30.
    pub interval_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTier {
    pub service_id: i64,
    pub name: String,
    pub price: Money,
    pub billing_interval: BillingInterval,
    pub interval_count: i64,
}

impl NewTier {
    pub fn new<S: Into<String>>(service_id: i64, name: S, price: Money, billing_interval: BillingInterval) -> Self {
        Self { service_id, name: name.into(), price, billing_interval, interval_count: 1 }
    }

    pub fn with_interval_count(mut self, count: i64) -> Self {
        self.interval_count = count;
        self
    }
}

//--------------------------------------     LedgerEntry     ---------------------------------------------------------
/// An immutable, signed accounting record. Credits carry positive amounts and debits negative amounts, so the sum of a
/// merchant's entries is always equal to its available balance.
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub merchant_id: i64,
    pub payment_id: Option<i64>,
    pub amount: Money,
    pub entry_type: EntryType,
    pub description: String,
    /// Snapshot of the available balance immediately after this entry was applied
    pub balance_after: Money,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       Payment       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    /// The gateway's reference for the charge. Globally unique.
    pub gateway_ref: String,
    pub payer_id: String,
    pub merchant_id: i64,
    pub service_id: i64,
    pub tier_id: i64,
    /// The gross amount charged to the payer
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub coupon_id: Option<i64>,
    /// The discount that was applied at checkout
    pub discount_amount: Money,
    pub provider_tx_id: Option<String>,
    /// Raw gateway response, stored as JSON text
    pub provider_response: Option<String>,
    pub platform_fee: Option<Money>,
    pub net_amount: Option<Money>,
    pub failure_reason: Option<String>,
    pub subscription_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub gateway_ref: String,
    pub payer_id: String,
    pub merchant_id: i64,
    pub service_id: i64,
    pub tier_id: i64,
    pub amount: Money,
    pub currency: String,
    pub coupon_id: Option<i64>,
    pub discount_amount: Money,
}

impl NewPayment {
    pub fn new<S: Into<String>>(
        gateway_ref: S,
        payer_id: S,
        merchant_id: i64,
        service_id: i64,
        tier_id: i64,
        amount: Money,
    ) -> Self {
        Self {
            gateway_ref: gateway_ref.into(),
            payer_id: payer_id.into(),
            merchant_id,
            service_id,
            tier_id,
            amount,
            currency: mse_common::DEFAULT_CURRENCY_CODE.to_string(),
            coupon_id: None,
            discount_amount: Money::default(),
        }
    }

    pub fn with_coupon(mut self, coupon_id: i64, discount_amount: Money) -> Self {
        self.coupon_id = Some(coupon_id);
        self.discount_amount = discount_amount;
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }
}

//--------------------------------------    Subscription     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub payer_id: String,
    pub service_id: i64,
    pub tier_id: i64,
    pub status: SubscriptionStatus,
    pub starts_at: DateTime<Utc>,
    /// `None` means the subscription never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// True if the subscription is `Active` and has not passed its expiry date at `now`. A subscription that expires
    /// exactly at `now` is no longer current.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.expires_at.map_or(true, |exp| exp > now)
    }

    pub fn never_expires(&self) -> bool {
        self.expires_at.is_none()
    }
}

/// A subscription row written directly, bypassing the lifecycle rules. Used by administrative imports and tests.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub payer_id: String,
    pub service_id: i64,
    pub tier_id: i64,
    pub status: SubscriptionStatus,
    pub starts_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

//--------------------------------------       Coupon        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: i64,
    pub merchant_id: i64,
    pub code: String,
    /// Whole percent, 0 - 100
    pub discount_percent: i64,
    /// `None` means unlimited
    pub max_uses: Option<i64>,
    pub current_uses: i64,
    /// If set, the coupon can only be redeemed against this service
    pub service_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.map_or(false, |max| self.current_uses >= max)
    }

    pub fn applies_to_service(&self, service_id: i64) -> bool {
        self.service_id.map_or(true, |id| id == service_id)
    }

    /// The discount this coupon gives on `price`, rounded half-up to the minor unit. `None` if the price is too large
    /// to discount.
    pub fn discount_for(&self, price: Money) -> Option<Money> {
        price.value().checked_mul(self.discount_percent).and_then(|v| v.checked_add(50)).map(|v| Money::from(v / 100))
    }
}

#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub merchant_id: i64,
    pub code: String,
    pub discount_percent: i64,
    pub max_uses: Option<i64>,
    pub service_id: Option<i64>,
}

impl NewCoupon {
    pub fn new<S: Into<String>>(merchant_id: i64, code: S, discount_percent: i64) -> Self {
        Self { merchant_id, code: code.into(), discount_percent, max_uses: None, service_id: None }
    }

    pub fn with_max_uses(mut self, max_uses: i64) -> Self {
        self.max_uses = Some(max_uses);
        self
    }

    pub fn for_service(mut self, service_id: i64) -> Self {
        self.service_id = Some(service_id);
        self
    }
}

#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponRedemption {
    pub id: i64,
    pub coupon_id: i64,
    pub payer_id: String,
    pub subscription_id: i64,
    pub payment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    RefundRecord     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub id: i64,
    pub payment_id: i64,
    /// The gross amount debited from the merchant
    pub amount: Money,
    pub reason: String,
    pub approved_by: String,
    pub status: RefundStatus,
    pub ledger_entry_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    PayoutRequest    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: i64,
    pub merchant_id: i64,
    pub amount: Money,
    pub method: String,
    pub destination: String,
    pub status: PayoutStatus,
    pub reviewed_by: Option<String>,
    pub note: Option<String>,
    /// The ledger entry that reserved the funds
    pub ledger_entry_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------  MerchantDailyStats ---------------------------------------------------------
/// Denormalised dashboard counters. These are refreshed after each settlement commits and are not authoritative; the
/// ledger is.
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantDailyStats {
    pub merchant_id: i64,
    /// `YYYY-MM-DD`, UTC
    pub day: String,
    /// Sum of net amounts credited
    pub revenue: Money,
    /// Sum of gross amounts charged
    pub gross: Money,
    pub settled_payments: i64,
    pub new_subscriptions: i64,
    pub renewals: i64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn enum_strings() {
        assert_eq!(PaymentStatus::Refunded.to_string(), "Refunded");
        assert_eq!("success".parse::<PaymentStatus>().unwrap(), PaymentStatus::Success);
        assert_eq!("Lifetime".parse::<BillingInterval>().unwrap(), BillingInterval::Lifetime);
        assert!("Weekly".parse::<BillingInterval>().is_err());
    }

    #[test]
    fn entry_sign() {
        let amt = Money::from(1_000);
        assert_eq!(EntryType::Credit.signed(amt), amt);
        assert_eq!(EntryType::Debit.signed(amt), -amt);
    }

    #[test]
    fn coupon_helpers() {
        let coupon = Coupon {
            id: 1,
            merchant_id: 1,
            code: "SPRING".into(),
            discount_percent: 15,
            max_uses: Some(2),
            current_uses: 2,
            service_id: Some(7),
            created_at: Utc::now(),
        };
        assert!(coupon.is_exhausted());
        assert!(coupon.applies_to_service(7));
        assert!(!coupon.applies_to_service(8));
        assert_eq!(coupon.discount_for(Money::from_major(20)), Some(Money::from_major(3)));
        assert_eq!(coupon.discount_for(Money::from(999)), Some(Money::from(150)));
        assert_eq!(coupon.discount_for(Money::from(i64::MAX / 10)), None);
    }
}

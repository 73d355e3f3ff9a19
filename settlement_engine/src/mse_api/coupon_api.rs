use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{AccountManagement, SettlementDatabase, SettlementError},
    db_types::{Coupon, CouponRedemption},
};

/// Coupon redemption outside the payment flow.
///
/// When a pending payment carries a coupon, settlement redeems it automatically. This API redeems a coupon directly
/// against an existing subscription.
pub struct CouponApi<B> {
    db: B,
}

impl<B> Debug for CouponApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CouponApi")
    }
}

impl<B> CouponApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CouponApi<B>
where B: SettlementDatabase
{
    /// Redeems the coupon for the payer against the subscription.
    ///
    /// ## Failure modes:
    /// - `CouponExhausted` when the coupon has no uses left.
    /// - `CouponAlreadyRedeemed` when the payer has redeemed this coupon before.
    /// - `InvalidState` when the coupon is scoped to a different service, or the subscription is not the payer's.
    pub async fn redeem(
        &self,
        coupon_id: i64,
        payer_id: &str,
        subscription_id: i64,
    ) -> Result<CouponRedemption, SettlementError> {
        let redemption = self.db.redeem_coupon(coupon_id, payer_id, subscription_id).await?;
        info!("🎟️ Coupon #{coupon_id} redeemed by {payer_id} against subscription #{subscription_id}");
        Ok(redemption)
    }
}

impl<B> CouponApi<B>
where B: SettlementDatabase + AccountManagement
{
    pub async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, SettlementError> {
        self.db.fetch_coupon_by_code(code).await
    }

    pub async fn redeem_code(
        &self,
        code: &str,
        payer_id: &str,
        subscription_id: i64,
    ) -> Result<CouponRedemption, SettlementError> {
        let coupon =
            self.coupon_by_code(code).await?.ok_or_else(|| SettlementError::CouponNotFound(code.to_string()))?;
        self.redeem(coupon.id, payer_id, subscription_id).await
    }

    pub async fn redemptions(&self, coupon_id: i64) -> Result<Vec<CouponRedemption>, SettlementError> {
        self.db.fetch_redemptions_for_coupon(coupon_id).await
    }
}

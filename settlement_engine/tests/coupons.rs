use settlement_engine::{
    db_types::{NewCoupon, NewMerchant},
    AccountManagement,
    CatalogManagement,
    CouponApi,
    SettlementError,
    SqliteDatabase,
    SubscriptionApi,
};

use crate::support::{fixtures::TestSystem, prepare_env::tear_down};

mod support;

/// Grants `payer` a subscription to the fixture service and returns its id.
async fn subscribe(sys: &TestSystem, payer: &str) -> i64 {
    let c = &sys.catalog;
    let api = SubscriptionApi::new(sys.db.clone());
    let (sub, _) =
        api.create_or_extend(payer, c.merchant.id, c.service.id, c.thirty_days.id, None).await.expect("Error subscribing");
    sub.id
}

fn coupon_api(sys: &TestSystem) -> CouponApi<SqliteDatabase> {
    CouponApi::new(sys.db.clone())
}

#[tokio::test]
async fn redeeming_increments_the_use_count() {
    let sys = TestSystem::new().await;
    let coupon = sys.db.create_coupon(NewCoupon::new(sys.merchant_id(), "WELCOME", 10)).await.unwrap();
    let alice_sub = subscribe(&sys, "alice").await;
    let bob_sub = subscribe(&sys, "bob").await;
    let api = coupon_api(&sys);

    let redemption = api.redeem_code("WELCOME", "alice", alice_sub).await.unwrap();
    assert_eq!(redemption.coupon_id, coupon.id);
    assert_eq!(redemption.subscription_id, alice_sub);
    assert!(redemption.payment_id.is_none());
    api.redeem(coupon.id, "bob", bob_sub).await.unwrap();

    let coupon = sys.db.fetch_coupon(coupon.id).await.unwrap().unwrap();
    assert_eq!(coupon.current_uses, 2);
    assert!(!coupon.is_exhausted());
    assert_eq!(api.redemptions(coupon.id).await.unwrap().len(), 2);
    tear_down(sys.db).await;
}

#[tokio::test]
async fn a_payer_can_only_redeem_a_coupon_once() {
    let sys = TestSystem::new().await;
    let coupon = sys.db.create_coupon(NewCoupon::new(sys.merchant_id(), "ONCE", 10)).await.unwrap();
    let sub = subscribe(&sys, "alice").await;
    let api = coupon_api(&sys);
    api.redeem(coupon.id, "alice", sub).await.unwrap();

    let err = api.redeem(coupon.id, "alice", sub).await.unwrap_err();
    assert_eq!(err, SettlementError::CouponAlreadyRedeemed { coupon_id: coupon.id, payer_id: "alice".into() });
    // The failed attempt must not consume a use
    let coupon = sys.db.fetch_coupon(coupon.id).await.unwrap().unwrap();
    assert_eq!(coupon.current_uses, 1);
    tear_down(sys.db).await;
}

#[tokio::test]
async fn scoped_coupons_only_apply_to_their_service() {
    let sys = TestSystem::new().await;
    let other = sys.db.create_service(sys.merchant_id(), "Podcasts").await.unwrap();
    let coupon =
        sys.db.create_coupon(NewCoupon::new(sys.merchant_id(), "PODS", 25).for_service(other.id)).await.unwrap();
    let sub = subscribe(&sys, "alice").await;
    let err = coupon_api(&sys).redeem(coupon.id, "alice", sub).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidState(_)), "Unexpected error {err:?}");
    let coupon = sys.db.fetch_coupon(coupon.id).await.unwrap().unwrap();
    assert_eq!(coupon.current_uses, 0);
    tear_down(sys.db).await;
}

#[tokio::test]
async fn coupons_only_apply_to_their_own_merchant() {
    let sys = TestSystem::new().await;
    let rival = sys.db.create_merchant(NewMerchant::new("Rival")).await.unwrap();
    let coupon = sys.db.create_coupon(NewCoupon::new(rival.id, "RIVAL50", 50).with_max_uses(1)).await.unwrap();
    let sub = subscribe(&sys, "alice").await;
    let api = coupon_api(&sys);

    let err = api.redeem(coupon.id, "alice", sub).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidState(_)), "Unexpected error {err:?}");
    let err = api.redeem_code("RIVAL50", "alice", sub).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidState(_)), "Unexpected error {err:?}");
    // The rival's single use is still available
    let coupon = sys.db.fetch_coupon(coupon.id).await.unwrap().unwrap();
    assert_eq!(coupon.current_uses, 0);
    assert!(api.redemptions(coupon.id).await.unwrap().is_empty());
    tear_down(sys.db).await;
}

#[tokio::test]
async fn redemption_requires_the_payers_own_subscription() {
    let sys = TestSystem::new().await;
    let coupon = sys.db.create_coupon(NewCoupon::new(sys.merchant_id(), "MINE", 10)).await.unwrap();
    let bob_sub = subscribe(&sys, "bob").await;
    let api = coupon_api(&sys);
    let err = api.redeem(coupon.id, "alice", bob_sub).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidState(_)));
    let err = api.redeem(coupon.id, "alice", 9999).await.unwrap_err();
    assert_eq!(err, SettlementError::SubscriptionNotFound(9999));
    let err = api.redeem_code("NOPE", "alice", bob_sub).await.unwrap_err();
    assert_eq!(err, SettlementError::CouponNotFound("NOPE".into()));
    assert_eq!(sys.db.fetch_coupon(coupon.id).await.unwrap().unwrap().current_uses, 0);
    tear_down(sys.db).await;
}

#[tokio::test]
async fn invalid_discounts_are_rejected() {
    let sys = TestSystem::new().await;
    let err = sys.db.create_coupon(NewCoupon::new(sys.merchant_id(), "TOOMUCH", 150)).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidAmount(_)));
    tear_down(sys.db).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_use_goes_to_exactly_one_payer() {
    let sys = TestSystem::new().await;
    let coupon =
        sys.db.create_coupon(NewCoupon::new(sys.merchant_id(), "FIRSTCOME", 100).with_max_uses(1)).await.unwrap();
    let mut tasks = Vec::new();
    for payer in ["alice", "bob", "carol", "dave"] {
        let sub = subscribe(&sys, payer).await;
        let api = coupon_api(&sys);
        let coupon_id = coupon.id;
        tasks.push(tokio::spawn(async move { api.redeem(coupon_id, payer, sub).await }));
    }
    let mut winners = 0;
    for task in tasks {
        match task.await.expect("Task panicked") {
            Ok(_) => winners += 1,
            Err(SettlementError::CouponExhausted(code)) => assert_eq!(code, "FIRSTCOME"),
            Err(e) => panic!("Unexpected error: {e}"),
        }
    }
    assert_eq!(winners, 1);
    let coupon = sys.db.fetch_coupon(coupon.id).await.unwrap().unwrap();
    assert_eq!(coupon.current_uses, 1);
    assert!(coupon.is_exhausted());
    assert_eq!(sys.db.fetch_redemptions_for_coupon(coupon.id).await.unwrap().len(), 1);
    tear_down(sys.db).await;
}

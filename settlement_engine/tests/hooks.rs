use std::{
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use mse_common::{FeePercent, Money};
use settlement_engine::{
    db_types::PayoutStatus,
    events::{EventHandlers, EventHooks},
    PayoutApi,
    SettlementFlowApi,
};

use crate::support::{fixtures::TestSystem, prepare_env::tear_down};

mod support;

/// Polls `f` until it returns true, for up to 2 seconds.
async fn eventually<F: Fn() -> bool>(f: F) -> bool {
    for _ in 0..40 {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    f()
}

#[tokio::test]
async fn settlement_fires_the_hook_once() {
    let sys = TestSystem::new().await;
    let count = Arc::new(AtomicUsize::new(0));
    let credited = Arc::new(AtomicI64::new(0));
    let mut hooks = EventHooks::default();
    let (c, m) = (count.clone(), credited.clone());
    hooks.on_payment_settled(move |ev| {
        let (c, m) = (c.clone(), m.clone());
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            m.fetch_add(ev.outcome.net_amount.value(), Ordering::SeqCst);
        }
    });
    let handlers = EventHandlers::new(8, hooks);
    let api = SettlementFlowApi::new(sys.db.clone(), handlers.producers());
    handlers.start_handlers();

    let payment_id = sys.pending_payment("pi_hooked", "alice", &sys.catalog.monthly).await;
    let response = serde_json::json!({ "status": "succeeded" });
    api.settle_payment(payment_id, "tx-hooked", &response).await.unwrap();
    // A redelivered webhook must not notify anyone a second time
    let err = api.settle_payment(payment_id, "tx-hooked", &response).await.unwrap_err();
    assert!(err.is_benign_duplicate());

    assert!(eventually(|| count.load(Ordering::SeqCst) >= 1).await, "The settlement hook never fired");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(credited.load(Ordering::SeqCst), Money::from_major(95).value());
    tear_down(sys.db).await;
}

#[tokio::test]
async fn refunds_and_payouts_fire_their_hooks() {
    let sys = TestSystem::with_plan_fee(FeePercent::from_bps(0).unwrap()).await;
    let refunded = Arc::new(Mutex::new(Vec::new()));
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let mut hooks = EventHooks::default();
    let r = refunded.clone();
    hooks.on_payment_refunded(move |ev| {
        let r = r.clone();
        async move {
            r.lock().unwrap().push(ev.outcome.payment.id);
        }
    });
    let t = transitions.clone();
    hooks.on_payout_status_changed(move |ev| {
        let t = t.clone();
        async move {
            t.lock().unwrap().push((ev.old_status, ev.new_status()));
        }
    });
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers();
    let flow = SettlementFlowApi::new(sys.db.clone(), producers.clone());
    let payouts = PayoutApi::new(sys.db.clone(), producers);

    sys.settled_payment("pi_keep", "alice", &sys.catalog.monthly).await;
    let doomed = sys.settled_payment("pi_doomed", "bob", &sys.catalog.monthly).await;
    flow.refund_payment(doomed, "duplicate charge", "ops").await.unwrap();

    let payout = payouts.request_payout(sys.merchant_id(), Money::from_major(50), "bank", "GB00 1234").await.unwrap();
    payouts.approve_payout(payout.id, "finance").await.unwrap();
    payouts.complete_payout(payout.id).await.unwrap();

    assert!(eventually(|| refunded.lock().unwrap().len() == 1).await, "The refund hook never fired");
    assert_eq!(refunded.lock().unwrap()[0], doomed);
    assert!(eventually(|| transitions.lock().unwrap().len() == 2).await, "The payout hooks never fired");
    let mut seen = transitions.lock().unwrap().clone();
    // Each event runs on its own task, so arrival order is not guaranteed
    seen.sort_by_key(|(old, _)| *old != PayoutStatus::Pending);
    assert_eq!(seen, vec![
        (PayoutStatus::Pending, PayoutStatus::Approved),
        (PayoutStatus::Approved, PayoutStatus::Completed)
    ]);
    tear_down(sys.db).await;
}

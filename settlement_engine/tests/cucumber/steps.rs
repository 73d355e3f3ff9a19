use std::str::FromStr;

use cucumber::{then, when};
use mse_common::Money;
use settlement_engine::{
    db_types::{PaymentStatus, SubscriptionStatus},
    AccountApi,
    AccountManagement,
    SettlementError,
};

use crate::cucumber::SettlementWorld;

fn money(s: &str) -> Money {
    Money::from_str(s).expect("Not a valid amount")
}

fn error_kind(e: &SettlementError) -> &'static str {
    match e {
        SettlementError::AlreadyProcessed { .. } => "AlreadyProcessed",
        SettlementError::InsufficientFunds { .. } => "InsufficientFunds",
        SettlementError::InvalidState(_) => "InvalidState",
        SettlementError::InvalidAmount(_) => "InvalidAmount",
        SettlementError::CouponExhausted(_) => "CouponExhausted",
        SettlementError::CouponAlreadyRedeemed { .. } => "CouponAlreadyRedeemed",
        SettlementError::DatabaseError(_) => "DatabaseError",
        e if e.is_not_found() => "NotFound",
        _ => "Unknown",
    }
}

#[when(expr = "payer '{word}' starts a payment of {word} for the {string} tier with reference {word}")]
async fn start_payment(world: &mut SettlementWorld, payer: String, amount: String, tier: String, gateway_ref: String) {
    let tier = world.tier(&tier);
    let id = world.system().pending_payment_for(&gateway_ref, &payer, &tier, money(&amount)).await;
    world.payments.insert(gateway_ref, id);
}

#[when(expr = "the gateway confirms payment {word}")]
async fn confirm_payment(world: &mut SettlementWorld, gateway_ref: String) {
    let response = serde_json::json!({ "status": "succeeded", "reference": gateway_ref });
    let result = world.flow_api().settle_by_gateway_ref(&gateway_ref, &format!("tx-{gateway_ref}"), &response).await;
    world.record(result);
}

#[when(expr = "the gateway reports that payment {word} failed because {string}")]
async fn fail_payment(world: &mut SettlementWorld, gateway_ref: String, reason: String) {
    let id = world.payment_id(&gateway_ref);
    let result = world.flow_api().fail_payment(id, &reason).await;
    world.record(result);
}

#[when(expr = "payment {word} is refunded by '{word}' because {string}")]
async fn refund_payment(world: &mut SettlementWorld, gateway_ref: String, approver: String, reason: String) {
    let id = world.payment_id(&gateway_ref);
    let result = world.flow_api().refund_payment(id, &reason, &approver).await;
    world.record(result);
}

#[when(expr = "the merchant requests a payout of {word}")]
async fn request_payout(world: &mut SettlementWorld, amount: String) {
    let merchant_id = world.system().merchant_id();
    let result = world.payout_api().request_payout(merchant_id, money(&amount), "bank", "GB00 1234").await;
    if let Some(payout) = world.record(result) {
        world.last_payout = Some(payout.id);
    }
}

#[when(expr = "the payout is approved by '{word}'")]
async fn approve_payout(world: &mut SettlementWorld, reviewer: String) {
    let id = world.last_payout.expect("No payout has been requested");
    let result = world.payout_api().approve_payout(id, &reviewer).await;
    world.record(result);
}

#[when(expr = "the payout is rejected by '{word}' because {string}")]
async fn reject_payout(world: &mut SettlementWorld, reviewer: String, reason: String) {
    let id = world.last_payout.expect("No payout has been requested");
    let result = world.payout_api().reject_payout(id, &reviewer, &reason).await;
    world.record(result);
}

#[when("the payout is completed")]
async fn complete_payout(world: &mut SettlementWorld) {
    let id = world.last_payout.expect("No payout has been requested");
    let result = world.payout_api().complete_payout(id).await;
    world.record(result);
}

#[then("the last request succeeded")]
async fn last_request_succeeded(world: &mut SettlementWorld) {
    assert!(world.last_error.is_none(), "Request failed: {:?}", world.last_error);
}

#[then(expr = "the last request failed with {word}")]
async fn last_request_failed(world: &mut SettlementWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The last request did not fail");
    assert_eq!(error_kind(err), kind, "Unexpected error: {err}");
}

#[then(expr = "the merchant's available balance is {word}")]
async fn check_balance(world: &mut SettlementWorld, amount: String) {
    let sys = world.system();
    let merchant = sys.db.fetch_merchant(sys.merchant_id()).await.expect("Error fetching merchant");
    let merchant = merchant.expect("Merchant does not exist");
    assert_eq!(merchant.available_balance, money(&amount), "Available balance is incorrect");
}

#[then(expr = "the merchant's ledger has {int} entries")]
async fn check_ledger_length(world: &mut SettlementWorld, count: usize) {
    let sys = world.system();
    let ledger = sys.db.fetch_ledger_for_merchant(sys.merchant_id()).await.expect("Error fetching ledger");
    assert_eq!(ledger.len(), count, "Ledger length is incorrect");
}

#[then("the merchant's ledger reconciles")]
async fn check_reconciliation(world: &mut SettlementWorld) {
    let sys = world.system();
    let rec = AccountApi::new(sys.db.clone()).reconcile(sys.merchant_id()).await.expect("Error reconciling");
    assert!(rec.is_balanced(), "Ledger is out by {}", rec.discrepancy());
}

#[then(expr = "payment {word} has status {word}")]
async fn check_payment_status(world: &mut SettlementWorld, gateway_ref: String, status: String) {
    let id = world.payment_id(&gateway_ref);
    let payment = world.system().db.fetch_payment(id).await.expect("Error fetching payment");
    let payment = payment.expect("Payment does not exist");
    let expected = PaymentStatus::from_str(&status).expect("Not a valid payment status");
    assert_eq!(payment.status, expected, "Payment status is incorrect");
}

#[then(expr = "payer '{word}' has {int} subscription(s)")]
async fn check_subscription_count(world: &mut SettlementWorld, payer: String, count: usize) {
    let subs = world.system().db.fetch_subscriptions_for_payer(&payer).await.expect("Error fetching subscriptions");
    assert_eq!(subs.len(), count, "Number of subscriptions is incorrect");
}

#[then(expr = "payer '{word}' has a subscription that is {word}")]
async fn check_subscription_status(world: &mut SettlementWorld, payer: String, status: String) {
    let subs = world.system().db.fetch_subscriptions_for_payer(&payer).await.expect("Error fetching subscriptions");
    let latest = subs.first().unwrap_or_else(|| panic!("{payer} has no subscriptions"));
    let expected = SubscriptionStatus::from_str(&status).expect("Not a valid subscription status");
    assert_eq!(latest.status, expected, "Subscription status is incorrect");
}

use cucumber::given;
use mse_common::FeePercent;

use crate::{cucumber::SettlementWorld, support::fixtures::TestSystem};

#[given("a fresh install")]
async fn fresh_database(world: &mut SettlementWorld) {
    world.system = Some(TestSystem::new().await);
}

#[given(expr = "a fresh install where the merchant's plan charges {int}%")]
async fn fresh_database_with_plan(world: &mut SettlementWorld, percent: i64) {
    let fee = FeePercent::from_bps(percent * 100).expect("Invalid fee");
    world.system = Some(TestSystem::with_plan_fee(fee).await);
}

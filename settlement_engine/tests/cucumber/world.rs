use std::collections::HashMap;

use cucumber::World;
use settlement_engine::{
    db_types::Tier,
    events::EventProducers,
    PayoutApi,
    SettlementError,
    SettlementFlowApi,
    SqliteDatabase,
};

use crate::support::fixtures::TestSystem;

#[derive(Default, Debug, World)]
pub struct SettlementWorld {
    pub system: Option<TestSystem>,
    /// Payment ids, keyed by gateway reference
    pub payments: HashMap<String, i64>,
    pub last_payout: Option<i64>,
    pub last_error: Option<SettlementError>,
}

impl SettlementWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("Settlement system not initialised")
    }

    pub fn flow_api(&self) -> SettlementFlowApi<SqliteDatabase> {
        self.system().flow_api()
    }

    pub fn payout_api(&self) -> PayoutApi<SqliteDatabase> {
        PayoutApi::new(self.system().db.clone(), EventProducers::default())
    }

    pub fn payment_id(&self, gateway_ref: &str) -> i64 {
        *self.payments.get(gateway_ref).unwrap_or_else(|| panic!("No payment with reference {gateway_ref}"))
    }

    pub fn tier(&self, name: &str) -> Tier {
        let c = &self.system().catalog;
        [&c.thirty_days, &c.monthly, &c.lifetime]
            .into_iter()
            .find(|t| t.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("No tier named '{name}'"))
    }

    /// Stores the outcome of the last request so that later steps can make assertions about it.
    pub fn record<T>(&mut self, result: Result<T, SettlementError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                self.last_error = Some(e);
                None
            },
        }
    }
}

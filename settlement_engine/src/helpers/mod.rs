mod subscription_period;

pub use subscription_period::{advance_expiry, plan_subscription_change, PeriodError, SubscriptionChange};

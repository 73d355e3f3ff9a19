mod fee_percent;
mod money;

pub mod helpers;
pub mod op;

pub use fee_percent::{FeePercent, FeePercentError, DEFAULT_FEE_BPS};
pub use money::{Money, MoneyConversionError, DEFAULT_CURRENCY_CODE, MINOR_UNITS_PER_MAJOR};

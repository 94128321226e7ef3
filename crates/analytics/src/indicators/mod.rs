pub mod atr;
pub mod strength;
pub mod trend;
pub mod volatility;

pub use atr::{average_true_range, ATR_PERIOD};
pub use strength::{order_imbalance, relative_strength, RS_WINDOW};
pub use trend::{linear_regression, market_efficiency_ratio, trend_strength, Regression, TREND_WINDOW};
pub use volatility::{realized_volatility, returns, std_dev};

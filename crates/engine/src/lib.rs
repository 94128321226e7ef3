pub mod binance;
pub mod config;
pub mod lifecycle;
pub mod optimizer;
pub mod performance;
pub mod pipeline;
pub mod reporter;

pub use binance::TradeStream;
pub use config::EngineFileConfig;
pub use lifecycle::{Engine, EngineHandle};
pub use optimizer::{OptimizationReport, OptimizationResult, Optimizer, OptimizerConfig};
pub use performance::PerformanceTracker;
pub use pipeline::{Pipeline, ReplaySummary};
pub use reporter::StatusReporter;

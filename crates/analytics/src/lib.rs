pub mod config;
pub mod engine;
pub mod indicators;

pub use config::MetricsConfig;
pub use engine::{compute_metrics, MetricsEngine};

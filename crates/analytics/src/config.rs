use serde::{Deserialize, Serialize};

/// Gating and smoothing parameters for the metrics recompute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// History length at which the engine is trusted for decisions.
    pub warmup_ticks: usize,
    /// History length below which `process_tick` does nothing.
    pub min_ticks: usize,
    /// Number of trend-strength values averaged into `avg_trend_strength`.
    pub trend_window: usize,
    /// Values required in the trend window before an average is reported.
    pub trend_window_min: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            warmup_ticks: 300,
            min_ticks: 20,
            trend_window: 20,
            trend_window_min: 7,
        }
    }
}

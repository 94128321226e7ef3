use serde::{Deserialize, Serialize};

/// Entry and exit rule tables for the signal engine.
///
/// Loaded from the `[entry]` and `[exit]` sections of the engine config:
/// ```toml
/// [entry]
/// volatility_lo = 0.35
/// volatility_hi = 0.70
/// min_order_imbalance = 0.65
///
/// [exit]
/// trailing_stop_activation_pct = 1.0
/// max_hold_minutes = 240
/// ```
/// Missing keys keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub entry: EntryThresholds,
    pub exit: ExitThresholds,
}

/// Every bound must hold for a BUY.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryThresholds {
    pub volatility_lo: f64,
    pub volatility_hi: f64,
    pub relative_strength_lo: f64,
    pub relative_strength_hi: f64,
    pub min_trend_strength: f64,
    pub min_avg_trend_strength: f64,
    pub min_order_imbalance: f64,
    pub min_efficiency_ratio: f64,
}

impl Default for EntryThresholds {
    fn default() -> Self {
        Self {
            volatility_lo: 0.35,
            volatility_hi: 0.70,
            relative_strength_lo: 0.25,
            relative_strength_hi: 0.75,
            min_trend_strength: 5.0,
            min_avg_trend_strength: 3.0,
            min_order_imbalance: 0.65,
            min_efficiency_ratio: 0.93,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitThresholds {
    /// Profit (percent) at which the trailing stop engages. Also scales the
    /// trailing distance in ATR units.
    pub trailing_stop_activation_pct: f64,
    /// Take-profit distance as a multiple of the stop distance.
    pub profit_target_multiplier: f64,
    /// Stop distance in ATR units.
    pub trailing_stop_distance: f64,
    /// Trend strength below which a profitable trade is closed.
    pub trend_reversal_threshold: f64,
    /// Minimum profit (percent) for time and trend-reversal exits.
    pub min_profit_pct: f64,
    /// Holding time after which a profitable trade is closed.
    pub max_hold_minutes: u32,
    /// ATR floor as a fraction of price, so the stop never has zero width.
    pub min_atr_fraction: f64,
}

impl Default for ExitThresholds {
    fn default() -> Self {
        Self {
            trailing_stop_activation_pct: 1.0,
            profit_target_multiplier: 2.5,
            trailing_stop_distance: 1.5,
            trend_reversal_threshold: -7.0,
            min_profit_pct: 0.3,
            max_hold_minutes: 240,
            min_atr_fraction: 0.001,
        }
    }
}

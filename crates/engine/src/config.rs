use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use analytics::MetricsConfig;
use common::{Error, Result};
use market::StoreConfig;
use strategy::{EntryThresholds, ExitThresholds, SignalConfig};

use crate::optimizer::OptimizerConfig;

/// Engine parameters file (TOML).
///
/// Example `config/engine.toml`:
/// ```toml
/// [market]
/// capacity = 1000
///
/// [analytics]
/// warmup_ticks = 300
///
/// [entry]
/// min_trend_strength = 5.0
///
/// [exit]
/// trailing_stop_distance = 1.5
///
/// [optimizer]
/// max_combinations = 100
///
/// [optimizer.grid]
/// min_trend_strength = [2.0, 5.0, 8.0]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineFileConfig {
    pub market: StoreConfig,
    pub analytics: MetricsConfig,
    pub entry: EntryThresholds,
    pub exit: ExitThresholds,
    pub optimizer: OptimizerConfig,
}

impl EngineFileConfig {
    /// Load from a TOML file. A missing file yields the defaults; an
    /// unreadable or invalid one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Engine config not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let cfg = Self::from_toml(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        info!(path = %path.display(), "Loaded engine config");
        Ok(cfg)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn signal_config(&self) -> SignalConfig {
        SignalConfig {
            entry: self.entry.clone(),
            exit: self.exit.clone(),
        }
    }

    /// Reject combinations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let a = &self.analytics;
        if self.market.capacity == 0 {
            return Err(Error::Config("market.capacity must be > 0".into()));
        }
        if a.warmup_ticks > self.market.capacity {
            return Err(Error::Config(format!(
                "analytics.warmup_ticks ({}) exceeds market.capacity ({}); warmup could never complete",
                a.warmup_ticks, self.market.capacity
            )));
        }
        if a.min_ticks < 2 {
            return Err(Error::Config("analytics.min_ticks must be >= 2".into()));
        }
        if a.trend_window == 0 || a.trend_window_min > a.trend_window {
            return Err(Error::Config(
                "analytics.trend_window must be > 0 and >= trend_window_min".into(),
            ));
        }
        let e = &self.entry;
        if e.volatility_lo > e.volatility_hi || e.relative_strength_lo > e.relative_strength_hi {
            return Err(Error::Config("entry lower bounds must not exceed upper bounds".into()));
        }
        if self.exit.trailing_stop_distance <= 0.0 {
            return Err(Error::Config("exit.trailing_stop_distance must be > 0".into()));
        }
        self.optimizer.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = EngineFileConfig::from_toml("").unwrap();
        assert_eq!(cfg.market.capacity, 1000);
        assert_eq!(cfg.analytics.warmup_ticks, 300);
        assert_eq!(cfg.entry.min_efficiency_ratio, 0.93);
        assert_eq!(cfg.exit.max_hold_minutes, 240);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = EngineFileConfig::from_toml(
            r#"
            [market]
            capacity = 500

            [entry]
            min_trend_strength = 8.0

            [exit]
            trend_reversal_threshold = -3.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.market.capacity, 500);
        assert_eq!(cfg.entry.min_trend_strength, 8.0);
        assert_eq!(cfg.entry.min_avg_trend_strength, 3.0);
        assert_eq!(cfg.signal_config().exit.trend_reversal_threshold, -3.5);
        assert_eq!(cfg.exit.profit_target_multiplier, 2.5);
    }

    #[test]
    fn warmup_beyond_capacity_is_rejected() {
        let err = EngineFileConfig::from_toml("[market]\ncapacity = 100\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = EngineFileConfig::from_toml("[entry]\nvolatility_lo = 0.9\nvolatility_hi = 0.1\n")
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        assert!(matches!(
            EngineFileConfig::from_toml("[market\ncapacity = "),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let shipped = EngineFileConfig::from_toml(include_str!("../../../config/engine.toml")).unwrap();
        let defaults = EngineFileConfig::default();
        assert_eq!(
            toml::to_string(&shipped).unwrap(),
            toml::to_string(&defaults).unwrap()
        );
    }

    #[test]
    fn optimizer_section_is_parsed_and_validated() {
        let cfg = EngineFileConfig::from_toml(
            "[optimizer]\nmin_trades = 3\n\n[optimizer.grid]\ntrailing_stop_distance = [1.0]\n",
        )
        .unwrap();
        assert_eq!(cfg.optimizer.min_trades, 3);
        assert_eq!(cfg.optimizer.max_combinations, 100);
        assert_eq!(cfg.optimizer.grid.trailing_stop_distance, vec![1.0]);
        assert_eq!(cfg.optimizer.grid.min_trend_strength.len(), 8);

        assert!(matches!(
            EngineFileConfig::from_toml("[optimizer]\ntop_n = 0\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("engine-config-does-not-exist.toml");
        let cfg = EngineFileConfig::load(path).unwrap();
        assert_eq!(cfg.market.capacity, 1000);
    }
}

use std::time::Duration;

use crate::{Error, Result};

/// How the binary sources its ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Stream trades from the exchange WebSocket.
    Live,
    /// Replay a CSV dataset from `data_dir`.
    Backtest,
    /// Backtest a grid of thresholds on a dataset and rank the results.
    Optimize,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Live => write!(f, "live"),
            RunMode::Backtest => write!(f, "backtest"),
            RunMode::Optimize => write!(f, "optimize"),
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(RunMode::Live),
            "backtest" => Ok(RunMode::Backtest),
            "optimize" => Ok(RunMode::Optimize),
            other => Err(Error::Config(format!(
                "RUN_MODE must be 'live', 'backtest' or 'optimize', got: '{other}'"
            ))),
        }
    }
}

/// Process-level configuration loaded from environment variables at startup.
///
/// Engine thresholds live in the TOML file at `engine_config_path`, not here.
#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub run_mode: RunMode,
    pub engine_config_path: String,
    pub data_dir: String,
    pub status_interval: Duration,
}

impl Config {
    /// Load configuration from the environment, reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let run_mode = match optional_env("RUN_MODE") {
            Some(v) => v.parse()?,
            None => RunMode::Live,
        };

        let status_secs = match optional_env("STATUS_INTERVAL_SECS") {
            Some(v) => v.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("STATUS_INTERVAL_SECS is not a number: '{v}'"))
            })?,
            None => 30,
        };
        if status_secs == 0 {
            return Err(Error::Config("STATUS_INTERVAL_SECS must be > 0".into()));
        }

        Ok(Config {
            symbol: optional_env("TRADING_SYMBOL").unwrap_or_else(|| "BTCUSDT".to_string()),
            run_mode,
            engine_config_path: optional_env("ENGINE_CONFIG_PATH")
                .unwrap_or_else(|| "config/engine.toml".to_string()),
            data_dir: optional_env("DATA_DIR").unwrap_or_else(|| "data".to_string()),
            status_interval: Duration::from_secs(status_secs),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

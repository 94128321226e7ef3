//! Grid search over entry and exit thresholds.
//!
//! Every candidate is a full backtest of one dataset on a fresh [`Pipeline`].
//! Runs with too few trades are discarded and the rest are ranked by
//! `profit_factor * win_rate * total_trades / 100`.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::{Error, PerformanceMetrics, Result, Tick};
use market::read_ticks;
use strategy::{EntryThresholds, ExitThresholds};

use crate::config::EngineFileConfig;
use crate::pipeline::Pipeline;

/// Values tried for each tunable threshold.
///
/// An empty list keeps the base config's value for that threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGrid {
    pub volatility_lo: Vec<f64>,
    pub relative_strength_lo: Vec<f64>,
    pub min_trend_strength: Vec<f64>,
    pub min_order_imbalance: Vec<f64>,
    pub min_efficiency_ratio: Vec<f64>,
    pub profit_target_multiplier: Vec<f64>,
    pub trailing_stop_activation_pct: Vec<f64>,
    pub trailing_stop_distance: Vec<f64>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            volatility_lo: vec![0.1, 0.2, 0.3, 0.4, 0.5],
            relative_strength_lo: vec![0.1, 0.2, 0.3, 0.4, 0.5],
            min_trend_strength: vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
            min_order_imbalance: vec![0.1, 0.2, 0.3, 0.4],
            min_efficiency_ratio: vec![0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 1.1, 1.2, 1.3, 1.4],
            profit_target_multiplier: vec![1.5, 2.0, 2.5, 3.0, 3.5],
            trailing_stop_activation_pct: vec![0.5, 1.0, 1.5],
            trailing_stop_distance: vec![1.0, 1.5, 2.0, 2.5],
        }
    }
}

impl ParameterGrid {
    fn axes(&self) -> [&[f64]; 8] {
        [
            &self.volatility_lo,
            &self.relative_strength_lo,
            &self.min_trend_strength,
            &self.min_order_imbalance,
            &self.min_efficiency_ratio,
            &self.profit_target_multiplier,
            &self.trailing_stop_activation_pct,
            &self.trailing_stop_distance,
        ]
    }

    /// Number of combinations, `None` on overflow. Empty axes count as one.
    pub fn size(&self) -> Option<usize> {
        self.axes()
            .iter()
            .try_fold(1usize, |acc, axis| acc.checked_mul(axis.len().max(1)))
    }

    /// Apply the combination with mixed-radix index `index` to `base`.
    /// The last axis varies fastest.
    fn candidate(&self, base: &EngineFileConfig, mut index: usize) -> EngineFileConfig {
        let mut picked = [None; 8];
        for (slot, axis) in picked.iter_mut().zip(self.axes()).rev() {
            if axis.is_empty() {
                continue;
            }
            *slot = Some(axis[index % axis.len()]);
            index /= axis.len();
        }

        let mut cfg = base.clone();
        let e = &mut cfg.entry;
        let x = &mut cfg.exit;
        let targets: [&mut f64; 8] = [
            &mut e.volatility_lo,
            &mut e.relative_strength_lo,
            &mut e.min_trend_strength,
            &mut e.min_order_imbalance,
            &mut e.min_efficiency_ratio,
            &mut x.profit_target_multiplier,
            &mut x.trailing_stop_activation_pct,
            &mut x.trailing_stop_distance,
        ];
        for (target, value) in targets.into_iter().zip(picked) {
            if let Some(v) = value {
                *target = v;
            }
        }
        cfg
    }
}

/// The `[optimizer]` section of the engine config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Upper bound on backtests per run. Larger grids are sampled.
    pub max_combinations: usize,
    /// Runs closing fewer trades are discarded.
    pub min_trades: usize,
    /// Results kept after ranking.
    pub top_n: usize,
    /// Seed for grid sampling.
    pub seed: u64,
    pub grid: ParameterGrid,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_combinations: 100,
            min_trades: 5,
            top_n: 10,
            seed: 42,
            grid: ParameterGrid::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_combinations == 0 || self.top_n == 0 {
            return Err(Error::Config(
                "optimizer.max_combinations and optimizer.top_n must be > 0".into(),
            ));
        }
        if self.grid.size().is_none() {
            return Err(Error::Config("optimizer.grid has too many combinations".into()));
        }
        if self.grid.axes().iter().flat_map(|a| a.iter()).any(|v| !v.is_finite()) {
            return Err(Error::Config("optimizer.grid values must be finite".into()));
        }
        Ok(())
    }
}

/// One ranked backtest.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub entry: EntryThresholds,
    pub exit: ExitThresholds,
    pub performance: PerformanceMetrics,
    pub score: f64,
}

impl OptimizationResult {
    pub fn new(entry: EntryThresholds, exit: ExitThresholds, performance: PerformanceMetrics) -> Self {
        let p = &performance;
        let score = p.profit_factor * p.win_rate * p.total_trades as f64 / 100.0;
        Self {
            entry,
            exit,
            score: if score.is_nan() { 0.0 } else { score },
            performance,
        }
    }

    /// `base` with this result's thresholds.
    pub fn apply(&self, base: &EngineFileConfig) -> EngineFileConfig {
        let mut cfg = base.clone();
        cfg.entry = self.entry.clone();
        cfg.exit = self.exit.clone();
        cfg
    }
}

/// Saved output of an optimization run.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub dataset: String,
    pub generated_at: DateTime<Utc>,
    pub evaluated: usize,
    pub results: Vec<OptimizationResult>,
}

impl OptimizationReport {
    pub fn best(&self) -> Option<&OptimizationResult> {
        self.results.first()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!(path = %path.display(), "Optimization results saved");
        Ok(())
    }
}

/// Drop runs under `min_trades`, sort by score (best first), keep `top_n`.
pub fn rank(
    mut results: Vec<OptimizationResult>,
    min_trades: usize,
    top_n: usize,
) -> Vec<OptimizationResult> {
    results.retain(|r| r.performance.total_trades >= min_trades);
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_n);
    results
}

pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Configs to backtest: the whole grid when it fits under
    /// `max_combinations`, otherwise a seeded sample of distinct combinations.
    pub fn candidates(&self, base: &EngineFileConfig) -> Vec<EngineFileConfig> {
        let grid = &self.config.grid;
        let size = grid.size().unwrap_or(usize::MAX);
        let limit = self.config.max_combinations;

        let indices: Vec<usize> = if size <= limit {
            (0..size).collect()
        } else {
            let mut rng = StdRng::seed_from_u64(self.config.seed);
            let mut sampled = rand::seq::index::sample(&mut rng, size, limit).into_vec();
            sampled.sort_unstable();
            info!(grid = size, sampled = limit, "Grid exceeds limit, sampling combinations");
            sampled
        };
        indices.into_iter().map(|i| grid.candidate(base, i)).collect()
    }

    /// Backtest every candidate on `ticks` and rank the results.
    pub async fn run(&self, ticks: &[Tick], base: &EngineFileConfig) -> Vec<OptimizationResult> {
        let candidates = self.candidates(base);
        let total = candidates.len();
        let mut results = Vec::with_capacity(total);

        for (i, cfg) in candidates.iter().enumerate() {
            if let Err(e) = cfg.validate() {
                warn!(candidate = i, error = %e, "Skipping invalid combination");
                continue;
            }
            let pipeline = Pipeline::new(cfg);
            pipeline.replay(ticks.iter().copied()).await;
            let performance = pipeline.performance().metrics().await;
            debug!(
                candidate = i,
                trades = performance.total_trades,
                win_rate = performance.win_rate,
                profit_factor = performance.profit_factor,
                "Combination evaluated"
            );
            let used = pipeline.signal_engine().config();
            results.push(OptimizationResult::new(
                used.entry.clone(),
                used.exit.clone(),
                performance,
            ));
        }

        let ranked = rank(results, self.config.min_trades, self.config.top_n);
        info!(
            evaluated = total,
            kept = ranked.len(),
            min_trades = self.config.min_trades,
            "Optimization finished"
        );
        ranked
    }

    /// Load a CSV dataset and optimize over it.
    pub async fn run_file(
        &self,
        path: impl AsRef<Path>,
        base: &EngineFileConfig,
    ) -> Result<OptimizationReport> {
        let path = path.as_ref();
        let data = read_ticks(path)?;
        info!(
            path = %path.display(),
            ticks = data.ticks.len(),
            skipped = data.skipped,
            "Optimizing over dataset"
        );
        let evaluated = self.candidates(base).len();
        let results = self.run(&data.ticks, base).await;
        Ok(OptimizationReport {
            dataset: path.display().to_string(),
            generated_at: Utc::now(),
            evaluated,
            results,
        })
    }
}

/// Write `config` as TOML, for use as a later `ENGINE_CONFIG_PATH`.
pub fn save_config(config: &EngineFileConfig, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = toml::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))?;
    std::fs::write(path, content)?;
    info!(path = %path.display(), "Optimized engine config saved");
    Ok(())
}

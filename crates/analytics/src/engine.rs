use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use common::MarketMetrics;
use market::{HistorySnapshot, MarketDataStore};

use crate::config::MetricsConfig;
use crate::indicators::{
    average_true_range, market_efficiency_ratio, order_imbalance, realized_volatility,
    relative_strength, returns, trend_strength,
};

#[derive(Debug)]
struct MetricsState {
    metrics: MarketMetrics,
    trend_window: VecDeque<f64>,
    warmed_up: bool,
}

impl MetricsState {
    fn new(window: usize) -> Self {
        Self {
            metrics: MarketMetrics::default(),
            trend_window: VecDeque::with_capacity(window),
            warmed_up: false,
        }
    }
}

/// Recomputes the market metrics from the store's full history on every tick.
///
/// Metric fields are replaced together under the write lock; readers get a
/// copy under the read lock and never observe a half-updated snapshot.
pub struct MetricsEngine {
    store: Arc<MarketDataStore>,
    config: MetricsConfig,
    state: RwLock<MetricsState>,
}

impl MetricsEngine {
    pub fn new(store: Arc<MarketDataStore>, config: MetricsConfig) -> Self {
        let state = MetricsState::new(config.trend_window);
        Self {
            store,
            config,
            state: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Recompute all metrics from the current history.
    ///
    /// Returns `None` (and leaves the metrics untouched) while the history is
    /// shorter than `min_ticks`. Latches the warmed-up flag the first time the
    /// history reaches `warmup_ticks`.
    pub async fn process_tick(&self) -> Option<MarketMetrics> {
        let history = self.store.snapshot().await;
        if history.prices.len() < self.config.min_ticks {
            return None;
        }

        let mut state = self.state.write().await;
        let metrics = compute_metrics(&history, &mut state.trend_window, &self.config);
        state.metrics = metrics;

        if !state.warmed_up && history.prices.len() >= self.config.warmup_ticks {
            state.warmed_up = true;
            info!(ticks = history.prices.len(), "Warmup phase completed");
        }

        Some(metrics)
    }

    /// Copy of the latest metrics.
    pub async fn metrics(&self) -> MarketMetrics {
        self.state.read().await.metrics
    }

    /// Whether the warmup threshold has ever been reached since the last reset.
    pub async fn is_warmed_up(&self) -> bool {
        self.state.read().await.warmed_up
    }

    /// Restore neutral metrics, clear the trend window and the warmup latch.
    pub async fn reset(&self) {
        *self.state.write().await = MetricsState::new(self.config.trend_window);
        debug!("Metrics engine reset");
    }
}

/// Derive every metric from `history`, pushing the new trend strength into
/// `trend_window` (oldest evicted beyond `config.trend_window`).
pub fn compute_metrics(
    history: &HistorySnapshot,
    trend_window: &mut VecDeque<f64>,
    config: &MetricsConfig,
) -> MarketMetrics {
    let prices = &history.prices;
    let rets = returns(prices);

    let volatility = realized_volatility(&rets);
    let atr = average_true_range(prices, &history.highs, &history.lows, volatility);
    let trend = trend_strength(prices);

    if config.trend_window > 0 {
        while trend_window.len() >= config.trend_window {
            trend_window.pop_front();
        }
        trend_window.push_back(trend);
    }
    let avg_trend = if !trend_window.is_empty() && trend_window.len() >= config.trend_window_min {
        trend_window.iter().sum::<f64>() / trend_window.len() as f64
    } else {
        0.0
    };

    MarketMetrics {
        realized_volatility: volatility,
        atr,
        relative_strength: relative_strength(&rets),
        order_imbalance: order_imbalance(&history.bid_volumes, &history.ask_volumes),
        trend_strength: trend,
        avg_trend_strength: avg_trend,
        market_efficiency_ratio: market_efficiency_ratio(prices),
    }
}

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use analytics::MetricsEngine;
use common::{MarketState, PerformanceMetrics, Result, Signal, SignalAction, Tick};
use market::{read_ticks, MarketDataStore};
use strategy::SignalEngine;

use crate::config::EngineFileConfig;
use crate::performance::PerformanceTracker;

/// Outcome of replaying one dataset.
#[derive(Debug, Clone)]
pub struct ReplaySummary {
    pub ticks: usize,
    pub skipped: usize,
    pub signals: Vec<Signal>,
    pub performance: PerformanceMetrics,
}

/// Per-tick orchestration: store, metrics, then signals once warmed up.
///
/// Components are shared through `Arc` so the status reporter and the live
/// engine can read them while ticks flow. Emitted signals are returned from
/// `process_tick` and, when a sink is attached, queued on an mpsc channel.
pub struct Pipeline {
    store: Arc<MarketDataStore>,
    metrics: MetricsEngine,
    signals: SignalEngine,
    performance: PerformanceTracker,
    signal_tx: Option<mpsc::Sender<Signal>>,
}

impl Pipeline {
    pub fn new(config: &EngineFileConfig) -> Self {
        let store = Arc::new(MarketDataStore::new(&config.market));
        let metrics = MetricsEngine::new(store.clone(), config.analytics.clone());
        Self {
            store,
            metrics,
            signals: SignalEngine::new(config.signal_config()),
            performance: PerformanceTracker::new(),
            signal_tx: None,
        }
    }

    /// Queue every emitted signal on `tx`.
    ///
    /// Sends wait for queue capacity, so a consumer that falls behind by
    /// more than the channel bound stalls tick processing until it catches
    /// up. Signals are never dropped.
    pub fn with_signal_sink(mut self, tx: mpsc::Sender<Signal>) -> Self {
        self.signal_tx = Some(tx);
        self
    }

    pub fn store(&self) -> &Arc<MarketDataStore> {
        &self.store
    }

    pub fn metrics_engine(&self) -> &MetricsEngine {
        &self.metrics
    }

    pub fn signal_engine(&self) -> &SignalEngine {
        &self.signals
    }

    pub fn performance(&self) -> &PerformanceTracker {
        &self.performance
    }

    /// Run one tick through the whole chain.
    ///
    /// Signals are evaluated against the stored (rounded) price and only once
    /// the metrics engine has warmed up.
    pub async fn process_tick(&self, tick: Tick) -> Option<Signal> {
        if let Err(e) = tick.validate() {
            warn!(error = %e, "Dropping invalid tick");
            return None;
        }
        let stored = self.store.add_tick(tick).await;
        let metrics = self.metrics.process_tick().await?;

        if !self.metrics.is_warmed_up().await {
            return None;
        }

        let signal = self
            .signals
            .evaluate(stored.price, stored.timestamp, metrics)
            .await?;

        if signal.action == SignalAction::Close {
            self.performance.record_close(&signal).await;
        }

        if let Some(tx) = &self.signal_tx {
            if tx.send(signal.clone()).await.is_err() {
                warn!(action = %signal.action, "Signal receiver dropped");
            }
        }

        Some(signal)
    }

    /// Consume ticks until the sender side closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<Tick>) {
        let mut processed = 0usize;
        while let Some(tick) = rx.recv().await {
            self.process_tick(tick).await;
            processed += 1;
        }
        info!(ticks = processed, "Tick channel closed, pipeline stopped");
    }

    /// Feed `ticks` in order and collect the signals emitted.
    pub async fn replay(&self, ticks: impl IntoIterator<Item = Tick>) -> Vec<Signal> {
        let mut emitted = Vec::new();
        for tick in ticks {
            if let Some(signal) = self.process_tick(tick).await {
                emitted.push(signal);
            }
        }
        emitted
    }

    /// Reset all state, then replay a CSV dataset from start to end.
    pub async fn replay_file(&self, path: impl AsRef<Path>) -> Result<ReplaySummary> {
        let path = path.as_ref();
        let data = read_ticks(path)?;
        self.reset().await;

        info!(
            path = %path.display(),
            ticks = data.ticks.len(),
            skipped = data.skipped,
            warmup_ticks = self.metrics.config().warmup_ticks,
            "Replaying dataset"
        );
        let ticks = data.ticks.len();
        let signals = self.replay(data.ticks).await;
        let performance = self.performance.metrics().await;

        info!(
            signals = signals.len(),
            total_trades = performance.total_trades,
            total_pnl = performance.total_pnl,
            "Replay finished"
        );

        Ok(ReplaySummary {
            ticks,
            skipped: data.skipped,
            signals,
            performance,
        })
    }

    /// Clear history, metrics, the open trade and performance stats.
    pub async fn reset(&self) {
        self.store.reset().await;
        self.metrics.reset().await;
        self.signals.reset().await;
        self.performance.reset().await;
        debug!("Pipeline reset");
    }

    /// View for status reporting. Each component is read under its own
    /// shared lock.
    pub async fn market_state(&self) -> MarketState {
        MarketState {
            timestamp: Utc::now(),
            current_price: self.store.current_price().await,
            metrics: self.metrics.metrics().await,
            active_trade: self.signals.active_trade().await,
            warmed_up: self.metrics.is_warmed_up().await,
            performance: self.performance.metrics().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};
    use common::{ExitReason, TradeSide};
    use strategy::EntryThresholds;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn permissive() -> EngineFileConfig {
        let mut cfg = EngineFileConfig::default();
        cfg.analytics.warmup_ticks = 30;
        cfg.entry = EntryThresholds {
            volatility_lo: 0.0,
            volatility_hi: f64::MAX,
            relative_strength_lo: 0.0,
            relative_strength_hi: 1.0,
            min_trend_strength: -1e9,
            min_avg_trend_strength: -1e9,
            min_order_imbalance: 0.0,
            min_efficiency_ratio: 0.0,
        };
        cfg
    }

    /// Steady one-minute uptrend starting at 100.
    fn uptrend(n: usize) -> Vec<Tick> {
        (0..n)
            .map(|i| {
                Tick::new(
                    100.0 + 0.05 * i as f64,
                    1.0,
                    TradeSide::from_is_ask(i % 2 == 0),
                    base() + Duration::minutes(i as i64),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn no_signals_before_warmup() {
        let pipeline = Pipeline::new(&permissive());
        let signals = pipeline.replay(uptrend(29)).await;
        assert!(signals.is_empty());
        assert!(!pipeline.metrics_engine().is_warmed_up().await);
        assert!(!pipeline.signal_engine().is_active_trade().await);
    }

    #[tokio::test]
    async fn uptrend_buys_at_warmup_and_exits_on_time() {
        let pipeline = Pipeline::new(&permissive());
        let ticks = uptrend(300);
        let signals = pipeline.replay(ticks.clone()).await;

        assert_eq!(signals.len(), 2, "signals: {signals:?}");
        let buy = &signals[0];
        assert_eq!(buy.action, SignalAction::Buy);
        assert_eq!(buy.time, ticks[29].timestamp);
        assert!((buy.price - 101.45).abs() < 1e-9);

        let close = &signals[1];
        assert_eq!(close.action, SignalAction::Close);
        assert_eq!(close.reason, Some(ExitReason::TimeExit));
        assert_eq!(close.time, ticks[270].timestamp);
        assert!(close.profit_pct > 0.0);

        let perf = pipeline.performance().metrics().await;
        assert_eq!(perf.total_trades, 1);
        assert_eq!(perf.winning_trades, 1);
        assert_eq!(perf.win_rate, 1.0);
    }

    #[tokio::test]
    async fn signals_are_queued_on_the_sink() {
        let (tx, mut rx) = mpsc::channel(8);
        let pipeline = Pipeline::new(&permissive()).with_signal_sink(tx);
        pipeline.replay(uptrend(40)).await;

        let queued = rx.try_recv().unwrap();
        assert_eq!(queued.action, SignalAction::Buy);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_drains_channel_until_closed() {
        let pipeline = Pipeline::new(&permissive());
        let (tx, rx) = mpsc::channel(16);
        let feeder = tokio::spawn(async move {
            for tick in uptrend(50) {
                tx.send(tick).await.unwrap();
            }
        });
        pipeline.run(rx).await;
        feeder.await.unwrap();

        assert_eq!(pipeline.store().len().await, 50);
        assert!(pipeline.signal_engine().is_active_trade().await);
    }

    #[tokio::test]
    async fn market_state_reflects_components() {
        let pipeline = Pipeline::new(&permissive());
        pipeline.replay(uptrend(35)).await;

        let state = pipeline.market_state().await;
        assert!((state.current_price - 101.7).abs() < 1e-9);
        assert!(state.warmed_up);
        assert!(state.active_trade.active);
        assert!(state.metrics.trend_strength > 0.0);
        assert_eq!(state.performance.total_trades, 0);

        pipeline.reset().await;
        let state = pipeline.market_state().await;
        assert_eq!(state.current_price, 0.0);
        assert!(!state.warmed_up);
        assert!(!state.active_trade.active);
    }

    #[tokio::test]
    async fn replay_file_resets_and_reports() {
        let path = std::env::temp_dir().join(format!("pipeline-replay-{}.csv", std::process::id()));
        let mut csv = String::from("timestamp,price,volume,is_ask\n");
        for (i, tick) in uptrend(60).iter().enumerate() {
            csv.push_str(&format!(
                "{},{},{},{}\n",
                tick.timestamp.to_rfc3339(),
                tick.price,
                tick.volume,
                i % 2 == 0
            ));
        }
        csv.push_str("garbage,row,here,x\n");
        std::fs::write(&path, csv).unwrap();

        let pipeline = Pipeline::new(&permissive());
        pipeline.replay(uptrend(10)).await;

        let summary = pipeline.replay_file(&path).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(summary.ticks, 60);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.signals.len(), 1);
        assert_eq!(summary.signals[0].action, SignalAction::Buy);
        assert_eq!(pipeline.store().len().await, 60);
    }

    #[tokio::test]
    async fn replay_file_missing_is_error() {
        let pipeline = Pipeline::new(&permissive());
        let missing = std::env::temp_dir().join("pipeline-no-such-dataset.csv");
        assert!(pipeline.replay_file(missing).await.is_err());
    }

    #[tokio::test]
    async fn poisoned_rows_never_reach_the_metrics() {
        let path = std::env::temp_dir().join(format!("pipeline-poisoned-{}.csv", std::process::id()));
        let mut csv = String::from("timestamp,price,volume,is_ask\n");
        for (i, tick) in uptrend(40).iter().enumerate() {
            let (price, volume) = match i {
                10 => ("0".to_string(), "1".to_string()),
                11 => ("NaN".to_string(), "1".to_string()),
                12 => (tick.price.to_string(), "-50".to_string()),
                // Zig-zag so both gains and losses appear.
                _ if i % 3 == 0 => ((tick.price - 0.2).to_string(), "1".to_string()),
                _ => (tick.price.to_string(), "1".to_string()),
            };
            csv.push_str(&format!(
                "{},{price},{volume},{}\n",
                tick.timestamp.to_rfc3339(),
                i % 2 == 0
            ));
        }
        std::fs::write(&path, csv).unwrap();

        let pipeline = Pipeline::new(&permissive());
        let summary = pipeline.replay_file(&path).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.ticks, 37);
        let m = pipeline.metrics_engine().metrics().await;
        assert!((0.0..=1.0).contains(&m.relative_strength), "rs = {}", m.relative_strength);
        assert!((0.0..=1.0).contains(&m.order_imbalance), "oi = {}", m.order_imbalance);
        assert!(m.realized_volatility.is_finite());
        assert!(m.atr.is_finite());
    }

    #[tokio::test]
    async fn invalid_ticks_are_dropped_before_the_store() {
        let pipeline = Pipeline::new(&permissive());
        let t = base();
        let bad = [
            Tick::new(0.0, 1.0, TradeSide::Bid, t),
            Tick::new(f64::NAN, 1.0, TradeSide::Bid, t),
            Tick::new(100.0, -50.0, TradeSide::Ask, t),
        ];
        assert!(pipeline.replay(bad).await.is_empty());
        assert!(pipeline.store().is_empty().await);
        assert_eq!(pipeline.store().precision().await, None);
    }

    #[tokio::test]
    async fn slow_signal_consumer_delays_but_never_loses_signals() {
        let (tx, mut rx) = mpsc::channel(1);
        let pipeline = Arc::new(Pipeline::new(&permissive()).with_signal_sink(tx));

        let feeder = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.replay(uptrend(300)).await })
        };

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let returned = feeder.await.unwrap();

        assert_eq!(first.action, SignalAction::Buy);
        assert_eq!(second.action, SignalAction::Close);
        assert_eq!(returned, vec![first, second]);
    }
}

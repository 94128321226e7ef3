use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::pipeline::Pipeline;

/// Logs a market status line at a fixed interval until shutdown.
pub struct StatusReporter {
    pipeline: Arc<Pipeline>,
    interval: Duration,
}

impl StatusReporter {
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.report().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Status reporter stopped");
                        return;
                    }
                }
            }
        }
    }

    async fn report(&self) {
        let store = self.pipeline.store();
        let state = self.pipeline.market_state().await;
        let m = &state.metrics;
        let trade = &state.active_trade;
        let history = store.len().await;
        let precision = store.precision().await;
        info!(
            price = state.current_price,
            history = history,
            capacity = store.capacity(),
            precision = ?precision,
            warmed_up = state.warmed_up,
            volatility = m.realized_volatility,
            atr = m.atr,
            relative_strength = m.relative_strength,
            order_imbalance = m.order_imbalance,
            trend = m.trend_strength,
            avg_trend = m.avg_trend_strength,
            efficiency = m.market_efficiency_ratio,
            in_position = trade.active,
            entry_price = trade.entry_price,
            stop_loss = trade.stop_loss,
            pnl_pct = trade.current_pnl,
            trades = state.performance.total_trades,
            win_rate = state.performance.win_rate,
            "Market status"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineFileConfig;

    #[tokio::test(start_paused = true)]
    async fn stops_on_shutdown_signal() {
        let pipeline = Arc::new(Pipeline::new(&EngineFileConfig::default()));
        let (tx, rx) = watch::channel(false);
        let reporter = StatusReporter::new(pipeline, Duration::from_secs(30));
        let task = tokio::spawn(reporter.run(rx));

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert!(!task.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("reporter should stop promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn stops_when_sender_dropped() {
        let pipeline = Arc::new(Pipeline::new(&EngineFileConfig::default()));
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(StatusReporter::new(pipeline, Duration::from_secs(3600)).run(rx));
        drop(tx);
        task.await.unwrap();
    }
}

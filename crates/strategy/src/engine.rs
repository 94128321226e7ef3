use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use common::{MarketMetrics, OrderSide, Signal, TradeState};

use crate::config::SignalConfig;
use crate::entry::entry_conditions_met;
use crate::exit::check_exit;

/// Two-state machine (no position / position open) turning metrics into
/// BUY and CLOSE signals for a single long position.
///
/// `evaluate` holds the write lock for the whole check-then-act cycle, so
/// concurrent callers can never open or close the same position twice.
pub struct SignalEngine {
    config: SignalConfig,
    trade: RwLock<TradeState>,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            trade: RwLock::new(TradeState::default()),
        }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Evaluate one tick. Entry rules apply with no position, exit rules
    /// with one open. Returns the emitted signal, if any.
    pub async fn evaluate(
        &self,
        price: f64,
        time: DateTime<Utc>,
        metrics: MarketMetrics,
    ) -> Option<Signal> {
        let mut trade = self.trade.write().await;

        if !trade.active {
            if !entry_conditions_met(&self.config.entry, &metrics) {
                return None;
            }
            let exit = &self.config.exit;
            let effective_atr = metrics.atr.max(price * exit.min_atr_fraction);

            *trade = TradeState::open(OrderSide::Buy, price, time);
            trade.stop_loss = price - exit.trailing_stop_distance * effective_atr;

            info!(
                price,
                stop_loss = trade.stop_loss,
                volatility = metrics.realized_volatility,
                trend = metrics.trend_strength,
                imbalance = metrics.order_imbalance,
                "Buy conditions met"
            );
            return Some(Signal::buy(price, time, metrics));
        }

        let check = check_exit(&self.config.exit, &mut trade, price, time, &metrics);
        let reason = check.reason?;

        info!(
            price,
            reason = %reason,
            profit_pct = check.profit * 100.0,
            stop_loss = check.stop_loss,
            "Sell conditions met"
        );
        trade.active = false;

        Some(Signal::close(
            price,
            time,
            reason,
            check.profit * 100.0,
            check.stop_loss,
            metrics,
        ))
    }

    pub async fn is_active_trade(&self) -> bool {
        self.trade.read().await.active
    }

    /// Copy of the trade state.
    pub async fn active_trade(&self) -> TradeState {
        self.trade.read().await.clone()
    }

    /// Manually tighten the stop of the open trade.
    ///
    /// The level is merged into the trade's stop floor, which only ever
    /// rises: a level below an engaged trailing stop leaves it in place.
    /// Ignored with no open trade or a non-positive level.
    pub async fn update_stop_loss(&self, level: f64) {
        let mut trade = self.trade.write().await;
        if !trade.active || level <= 0.0 {
            return;
        }
        let floor = trade.trailing_stop.map_or(level, |f| f.max(level));
        trade.trailing_stop = Some(floor);
        trade.stop_loss = trade.stop_loss.max(floor);
        info!(requested = level, stop_loss = floor, "Stop loss updated");
    }

    /// Forget any open trade.
    pub async fn reset(&self) {
        *self.trade.write().await = TradeState::default();
    }
}

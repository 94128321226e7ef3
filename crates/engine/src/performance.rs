use tokio::sync::RwLock;
use tracing::info;

use common::{PerformanceMetrics, Signal, SignalAction};

#[derive(Default)]
struct Ledger {
    equity: f64,
    peak: f64,
    gross_profit: f64,
    gross_loss: f64,
    metrics: PerformanceMetrics,
}

/// Running statistics over closed trades.
///
/// Each CLOSE signal's `profit_pct` is one trade. Drawdown is measured on the
/// cumulative PnL curve, which starts at zero.
#[derive(Default)]
pub struct PerformanceTracker {
    ledger: RwLock<Ledger>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a CLOSE signal. BUY signals are ignored.
    pub async fn record_close(&self, signal: &Signal) {
        if signal.action != SignalAction::Close {
            return;
        }
        let pnl = signal.profit_pct;
        let mut ledger = self.ledger.write().await;
        ledger.equity += pnl;
        if pnl > 0.0 {
            ledger.gross_profit += pnl;
        } else {
            ledger.gross_loss -= pnl;
        }
        let profit_factor = if ledger.gross_loss > 0.0 {
            ledger.gross_profit / ledger.gross_loss
        } else if ledger.gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        ledger.peak = ledger.peak.max(ledger.equity);
        let drawdown = ledger.peak - ledger.equity;

        let m = &mut ledger.metrics;
        m.total_trades += 1;
        if pnl > 0.0 {
            m.winning_trades += 1;
        } else {
            m.losing_trades += 1;
        }
        m.total_pnl += pnl;
        m.win_rate = m.winning_trades as f64 / m.total_trades as f64;
        m.average_pnl = m.total_pnl / m.total_trades as f64;
        m.max_drawdown = m.max_drawdown.max(drawdown);
        m.profit_factor = profit_factor;

        info!(
            pnl_pct = pnl,
            total_trades = m.total_trades,
            win_rate = m.win_rate,
            total_pnl = m.total_pnl,
            "Trade recorded"
        );
    }

    pub async fn metrics(&self) -> PerformanceMetrics {
        self.ledger.read().await.metrics.clone()
    }

    pub async fn reset(&self) {
        *self.ledger.write().await = Ledger::default();
    }
}

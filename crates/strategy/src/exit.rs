use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use common::{ExitReason, MarketMetrics, TradeState};

use crate::config::ExitThresholds;

/// Outcome of one exit evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitCheck {
    pub reason: Option<ExitReason>,
    /// Profit as a fraction of the entry price.
    pub profit: f64,
    /// Effective stop after the trailing adjustment.
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Evaluate the exit rules for an open long trade at `price`.
///
/// Updates the trade's extrema, stop level, trailing stop and current PnL.
/// Stop and target are derived from the current price, so they move with it
/// every tick. Once engaged, the trailing stop is kept on the trade and acts
/// as a floor for the stop; it only ever moves up.
///
/// Exits are checked in priority order (stop-loss, take-profit, time,
/// trend reversal) and the first match wins. The trailing adjustment runs
/// regardless, so a closing trade reports its final stop.
pub fn check_exit(
    cfg: &ExitThresholds,
    trade: &mut TradeState,
    price: f64,
    now: DateTime<Utc>,
    metrics: &MarketMetrics,
) -> ExitCheck {
    trade.highest_price = trade.highest_price.max(price);
    trade.lowest_price = trade.lowest_price.min(price);

    let profit = if trade.entry_price > 0.0 {
        price / trade.entry_price - 1.0
    } else {
        0.0
    };
    let min_profit = cfg.min_profit_pct / 100.0;

    let effective_atr = metrics.atr.max(price * cfg.min_atr_fraction);
    let stop_distance = cfg.trailing_stop_distance * effective_atr;
    let take_profit = price + stop_distance * cfg.profit_target_multiplier;
    let mut stop_loss = match trade.trailing_stop {
        Some(floor) => (price - stop_distance).max(floor),
        None => price - stop_distance,
    };

    let mut reason = if price <= stop_loss {
        Some(ExitReason::StopLoss)
    } else if price >= take_profit {
        Some(ExitReason::TakeProfit)
    } else {
        None
    };

    if profit >= cfg.trailing_stop_activation_pct / 100.0 && trade.highest_price > 0.0 {
        let highest = trade.highest_price;
        let trail_level =
            highest * (1.0 - cfg.trailing_stop_activation_pct * (metrics.atr / highest));
        if trail_level > stop_loss {
            debug!(from = stop_loss, to = trail_level, "Trailing stop raised");
            stop_loss = trail_level;
            trade.trailing_stop = Some(trail_level);
        }
    }

    if reason.is_none() {
        let held_too_long = trade
            .entry_time
            .is_some_and(|t| now - t > Duration::minutes(i64::from(cfg.max_hold_minutes)));
        if held_too_long && profit >= min_profit {
            reason = Some(ExitReason::TimeExit);
        } else if metrics.trend_strength < cfg.trend_reversal_threshold && profit >= min_profit {
            reason = Some(ExitReason::TrendReversal);
        }
    }

    trade.stop_loss = stop_loss;
    trade.current_pnl = profit * 100.0;

    ExitCheck {
        reason,
        profit,
        stop_loss,
        take_profit,
    }
}

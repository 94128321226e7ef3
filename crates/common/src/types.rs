use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Which side of the book a trade hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Bid,
    Ask,
}

impl TradeSide {
    pub fn from_is_ask(is_ask: bool) -> Self {
        if is_ask {
            TradeSide::Ask
        } else {
            TradeSide::Bid
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Bid => write!(f, "bid"),
            TradeSide::Ask => write!(f, "ask"),
        }
    }
}

/// One trade event for the instrument, as normalized from the exchange
/// stream or a historical dataset row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub price: f64,
    pub volume: f64,
    pub side: TradeSide,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn new(price: f64, volume: f64, side: TradeSide, timestamp: DateTime<Utc>) -> Self {
        Self {
            price,
            volume,
            side,
            timestamp,
        }
    }

    /// Build a tick from untrusted input.
    ///
    /// The price must be finite and positive and the volume finite and
    /// non-negative; anything else would poison every metric derived from
    /// the history it lands in.
    pub fn checked(
        price: f64,
        volume: f64,
        side: TradeSide,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let tick = Self::new(price, volume, side, timestamp);
        tick.validate()?;
        Ok(tick)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(Error::Parse(format!("price must be finite and > 0, got {}", self.price)));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(Error::Parse(format!("volume must be finite and >= 0, got {}", self.volume)));
        }
        Ok(())
    }
}

/// Snapshot of the derived market metrics.
///
/// Ratio metrics start at the neutral 0.5; everything else starts at 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketMetrics {
    /// Annualized standard deviation of tick returns, in percent.
    pub realized_volatility: f64,
    pub atr: f64,
    /// Share of gains in total absolute movement, in [0, 1].
    pub relative_strength: f64,
    /// Share of bid volume in total volume, in [0, 1].
    pub order_imbalance: f64,
    pub trend_strength: f64,
    pub avg_trend_strength: f64,
    pub market_efficiency_ratio: f64,
}

impl Default for MarketMetrics {
    fn default() -> Self {
        Self {
            realized_volatility: 0.0,
            atr: 0.0,
            relative_strength: 0.5,
            order_imbalance: 0.5,
            trend_strength: 0.0,
            avg_trend_strength: 0.0,
            market_efficiency_ratio: 0.5,
        }
    }
}

/// Side of a position. The engine only opens long positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
        }
    }
}

/// The single position the signal engine can hold.
///
/// `active == false` means no position; the remaining fields then hold
/// whatever the last trade left behind and carry no meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeState {
    pub active: bool,
    pub direction: Option<OrderSide>,
    pub entry_price: f64,
    pub entry_time: Option<DateTime<Utc>>,
    pub highest_price: f64,
    pub lowest_price: f64,
    /// Effective stop level as of the last evaluated tick.
    pub stop_loss: f64,
    /// Trailing stop level once engaged. Never decreases while the trade is open.
    pub trailing_stop: Option<f64>,
    /// Profit of the last evaluated tick, in percent.
    pub current_pnl: f64,
}

impl TradeState {
    pub fn open(direction: OrderSide, price: f64, time: DateTime<Utc>) -> Self {
        Self {
            active: true,
            direction: Some(direction),
            entry_price: price,
            entry_time: Some(time),
            highest_price: price,
            lowest_price: price,
            stop_loss: 0.0,
            trailing_stop: None,
            current_pnl: 0.0,
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TimeExit,
    TrendReversal,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::TimeExit => write!(f, "time_exit"),
            ExitReason::TrendReversal => write!(f, "trend_reversal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Close,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "BUY"),
            SignalAction::Close => write!(f, "CLOSE"),
        }
    }
}

/// Decision emitted by the signal engine for the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: SignalAction,
    pub price: f64,
    pub time: DateTime<Utc>,
    /// Set on CLOSE only.
    pub reason: Option<ExitReason>,
    /// Realized profit in percent; 0 on BUY.
    pub profit_pct: f64,
    /// Final stop level at exit; `None` on BUY.
    pub updated_stop_loss: Option<f64>,
    pub metrics: MarketMetrics,
}

impl Signal {
    pub fn buy(price: f64, time: DateTime<Utc>, metrics: MarketMetrics) -> Self {
        Self {
            action: SignalAction::Buy,
            price,
            time,
            reason: None,
            profit_pct: 0.0,
            updated_stop_loss: None,
            metrics,
        }
    }

    pub fn close(
        price: f64,
        time: DateTime<Utc>,
        reason: ExitReason,
        profit_pct: f64,
        stop_loss: f64,
        metrics: MarketMetrics,
    ) -> Self {
        Self {
            action: SignalAction::Close,
            price,
            time,
            reason: Some(reason),
            profit_pct,
            updated_stop_loss: Some(stop_loss),
            metrics,
        }
    }
}

/// Aggregate statistics over closed trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// Mean profit per trade, in percent.
    pub average_pnl: f64,
    /// Sum of per-trade profits, in percent.
    pub total_pnl: f64,
    /// Gross profit over gross loss. Infinite with profits and no losses,
    /// 0 with neither.
    pub profit_factor: f64,
    /// Largest peak-to-trough fall of the cumulative PnL curve, in percent points.
    pub max_drawdown: f64,
}

/// Everything the status reporter shows in one view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    pub timestamp: DateTime<Utc>,
    pub current_price: f64,
    pub metrics: MarketMetrics,
    pub active_trade: TradeState,
    pub warmed_up: bool,
    pub performance: PerformanceMetrics,
}

/// Lifecycle state of the live engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Stopped,
    Running,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
        }
    }
}

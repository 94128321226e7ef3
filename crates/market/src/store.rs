use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use common::{Tick, TradeSide};

/// Sizing for the rolling history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of ticks retained per sequence.
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Independent copy of every history sequence, taken under one read lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    pub prices: Vec<f64>,
    pub volumes: Vec<f64>,
    pub bid_volumes: Vec<f64>,
    pub ask_volumes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct History {
    prices: VecDeque<f64>,
    volumes: VecDeque<f64>,
    // Side volumes only grow on ticks of their own side, so they are not
    // index-aligned with `prices`.
    bid_volumes: VecDeque<f64>,
    ask_volumes: VecDeque<f64>,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
    timestamps: VecDeque<DateTime<Utc>>,
    /// Decimal digits prices are rounded to. Inferred from the first tick.
    precision: Option<u32>,
}

impl History {
    fn clear(&mut self) {
        self.prices.clear();
        self.volumes.clear();
        self.bid_volumes.clear();
        self.ask_volumes.clear();
        self.highs.clear();
        self.lows.clear();
        self.timestamps.clear();
        self.precision = None;
    }
}

/// Bounded rolling history of one instrument's trades.
///
/// Writers take the exclusive lock for the whole append, so readers never
/// see a tick that is in some sequences but not in others.
pub struct MarketDataStore {
    capacity: usize,
    inner: RwLock<History>,
}

impl MarketDataStore {
    pub fn new(config: &StoreConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            capacity,
            inner: RwLock::new(History::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a tick to every sequence, evicting the oldest entry when full.
    ///
    /// Returns the tick as stored, i.e. with its price rounded to the
    /// store's inferred precision.
    pub async fn add_tick(&self, tick: Tick) -> Tick {
        let mut h = self.inner.write().await;

        let digits = match h.precision {
            Some(d) => d,
            None => {
                let d = infer_precision(tick.price);
                debug!(price = tick.price, digits = d, "Inferred price precision");
                h.precision = Some(d);
                d
            }
        };
        let price = round_to(tick.price, digits);
        let cap = self.capacity;

        let high = match h.highs.back() {
            Some(&prev) if price <= prev => prev,
            _ => price,
        };
        let low = match h.lows.back() {
            Some(&prev) if price >= prev => prev,
            _ => price,
        };

        push_bounded(&mut h.prices, price, cap);
        push_bounded(&mut h.volumes, tick.volume, cap);
        push_bounded(&mut h.timestamps, tick.timestamp, cap);
        push_bounded(&mut h.highs, high, cap);
        push_bounded(&mut h.lows, low, cap);
        match tick.side {
            TradeSide::Ask => push_bounded(&mut h.ask_volumes, tick.volume, cap),
            TradeSide::Bid => push_bounded(&mut h.bid_volumes, tick.volume, cap),
        }

        Tick { price, ..tick }
    }

    /// Copy of every sequence taken under a single shared lock.
    pub async fn snapshot(&self) -> HistorySnapshot {
        let h = self.inner.read().await;
        HistorySnapshot {
            prices: h.prices.iter().copied().collect(),
            volumes: h.volumes.iter().copied().collect(),
            bid_volumes: h.bid_volumes.iter().copied().collect(),
            ask_volumes: h.ask_volumes.iter().copied().collect(),
            highs: h.highs.iter().copied().collect(),
            lows: h.lows.iter().copied().collect(),
            timestamps: h.timestamps.iter().copied().collect(),
        }
    }

    pub async fn prices(&self) -> Vec<f64> {
        self.inner.read().await.prices.iter().copied().collect()
    }

    pub async fn volumes(&self) -> Vec<f64> {
        self.inner.read().await.volumes.iter().copied().collect()
    }

    pub async fn bid_volumes(&self) -> Vec<f64> {
        self.inner.read().await.bid_volumes.iter().copied().collect()
    }

    pub async fn ask_volumes(&self) -> Vec<f64> {
        self.inner.read().await.ask_volumes.iter().copied().collect()
    }

    pub async fn highs(&self) -> Vec<f64> {
        self.inner.read().await.highs.iter().copied().collect()
    }

    pub async fn lows(&self) -> Vec<f64> {
        self.inner.read().await.lows.iter().copied().collect()
    }

    pub async fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.inner.read().await.timestamps.iter().copied().collect()
    }

    /// Most recent stored price, or 0 when empty.
    pub async fn current_price(&self) -> f64 {
        self.inner.read().await.prices.back().copied().unwrap_or(0.0)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.prices.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.prices.is_empty()
    }

    pub async fn has_minimum_data(&self, min_ticks: usize) -> bool {
        self.inner.read().await.prices.len() >= min_ticks
    }

    /// Rounding precision in effect, if a tick has been seen since the last reset.
    pub async fn precision(&self) -> Option<u32> {
        self.inner.read().await.precision
    }

    /// Drop all history and forget the inferred precision.
    pub async fn reset(&self) {
        self.inner.write().await.clear();
        debug!("Market data store reset");
    }
}

fn push_bounded<T>(buf: &mut VecDeque<T>, value: T, capacity: usize) {
    if buf.len() >= capacity {
        buf.pop_front();
    }
    buf.push_back(value);
}

/// Decimal digits to keep for an instrument quoted around `price`:
/// `6 - integer digits`, clamped to [1, 8].
///
/// Fixed-point formatting is used so large or tiny magnitudes never fall
/// into exponent notation. Non-finite prices fall back to 2 digits.
pub fn infer_precision(price: f64) -> u32 {
    if !price.is_finite() {
        return 2;
    }
    let formatted = format!("{price:.6}");
    let int_digits = formatted.split('.').next().map_or(0, str::len) as i64;
    (6 - int_digits).clamp(1, 8) as u32
}

pub fn round_to(value: f64, digits: u32) -> f64 {
    let shift = 10f64.powi(digits as i32);
    (value * shift).round() / shift
}

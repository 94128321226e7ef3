use common::MarketMetrics;

use crate::config::EntryThresholds;

/// Whether `metrics` satisfy every entry bound.
///
/// On top of the absolute bounds, the current trend must be stronger than
/// its recent average.
pub fn entry_conditions_met(t: &EntryThresholds, m: &MarketMetrics) -> bool {
    (t.volatility_lo..=t.volatility_hi).contains(&m.realized_volatility)
        && (t.relative_strength_lo..=t.relative_strength_hi).contains(&m.relative_strength)
        && m.trend_strength >= t.min_trend_strength
        && m.avg_trend_strength >= t.min_avg_trend_strength
        && m.trend_strength > m.avg_trend_strength
        && m.order_imbalance >= t.min_order_imbalance
        && m.market_efficiency_ratio >= t.min_efficiency_ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullish() -> MarketMetrics {
        MarketMetrics {
            realized_volatility: 0.5,
            atr: 1.0,
            relative_strength: 0.6,
            order_imbalance: 0.7,
            trend_strength: 10.0,
            avg_trend_strength: 4.0,
            market_efficiency_ratio: 0.95,
        }
    }

    #[test]
    fn bullish_metrics_pass() {
        assert!(entry_conditions_met(&EntryThresholds::default(), &bullish()));
    }

    #[test]
    fn bounds_are_inclusive() {
        let t = EntryThresholds::default();
        let m = MarketMetrics {
            realized_volatility: t.volatility_hi,
            relative_strength: t.relative_strength_lo,
            order_imbalance: t.min_order_imbalance,
            market_efficiency_ratio: t.min_efficiency_ratio,
            ..bullish()
        };
        assert!(entry_conditions_met(&t, &m));
    }

    #[test]
    fn each_failing_predicate_blocks_entry() {
        let t = EntryThresholds::default();
        let failing = [
            MarketMetrics { realized_volatility: 0.2, ..bullish() },
            MarketMetrics { realized_volatility: 0.9, ..bullish() },
            MarketMetrics { relative_strength: 0.1, ..bullish() },
            MarketMetrics { relative_strength: 0.8, ..bullish() },
            MarketMetrics { trend_strength: 4.0, ..bullish() },
            MarketMetrics { avg_trend_strength: 2.0, ..bullish() },
            MarketMetrics { order_imbalance: 0.6, ..bullish() },
            MarketMetrics { market_efficiency_ratio: 0.9, ..bullish() },
        ];
        for m in failing {
            assert!(!entry_conditions_met(&t, &m), "should not enter on {m:?}");
        }
    }

    #[test]
    fn trend_must_exceed_its_average() {
        let t = EntryThresholds::default();
        let m = MarketMetrics {
            trend_strength: 6.0,
            avg_trend_strength: 6.0,
            ..bullish()
        };
        assert!(!entry_conditions_met(&t, &m));
    }
}

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use common::{Tick, TradeSide};
use market::store::{infer_precision, round_to};
use market::{MarketDataStore, StoreConfig};

proptest! {
    /// History never grows past capacity and always keeps the newest ticks.
    #[test]
    fn history_is_bounded_fifo(
        capacity in 1usize..50,
        prices in prop::collection::vec(1.0f64..1000.0, 1..200),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = MarketDataStore::new(&StoreConfig { capacity });
            let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let mut stored = Vec::new();

            for (i, &p) in prices.iter().enumerate() {
                let tick = Tick::new(p, 1.0, TradeSide::from_is_ask(i % 2 == 0), base + Duration::seconds(i as i64));
                stored.push(store.add_tick(tick).await.price);

                let snap = store.snapshot().await;
                prop_assert!(snap.prices.len() <= capacity);
                prop_assert_eq!(snap.prices.len(), snap.volumes.len());
                prop_assert_eq!(snap.prices.len(), snap.highs.len());
                prop_assert_eq!(snap.prices.len(), snap.lows.len());
                prop_assert_eq!(snap.prices.len(), snap.timestamps.len());
                prop_assert!(snap.bid_volumes.len() <= capacity);
                prop_assert!(snap.ask_volumes.len() <= capacity);
            }

            let expected: Vec<f64> = stored[stored.len().saturating_sub(capacity)..].to_vec();
            prop_assert_eq!(store.prices().await, expected);
            Ok(())
        })?;
    }

    /// Running highs never fall and running lows never rise.
    #[test]
    fn running_extrema_are_monotonic(prices in prop::collection::vec(0.01f64..1_000_000.0, 2..100)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = MarketDataStore::new(&StoreConfig { capacity: 1000 });
            for &p in &prices {
                store.add_tick(Tick::new(p, 1.0, TradeSide::Bid, Utc::now())).await;
            }
            let highs = store.highs().await;
            let lows = store.lows().await;
            prop_assert!(highs.windows(2).all(|w| w[1] >= w[0]));
            prop_assert!(lows.windows(2).all(|w| w[1] <= w[0]));
            Ok(())
        })?;
    }

    /// Precision inference stays in range for any magnitude, including
    /// values that would print in exponent notation.
    #[test]
    fn precision_is_clamped_for_extreme_prices(price in prop::num::f64::ANY) {
        let digits = infer_precision(price);
        prop_assert!((1..=8).contains(&digits));
        let rounded = round_to(price, digits);
        if price.is_finite() && price.abs() < 1e12 {
            prop_assert!((rounded - price).abs() <= 0.5 * 10f64.powi(-(digits as i32)) + price.abs() * 1e-15);
        }
    }
}

/// Number of true ranges averaged.
pub const ATR_PERIOD: usize = 14;

/// Average True Range over the last [`ATR_PERIOD`] samples.
///
/// `highs` and `lows` are the store's running extrema, aligned with
/// `prices`. Each true range compares the sample with the previous close.
/// Without enough history (a previous close is needed for every sample)
/// the ATR is approximated from volatility: `volatility% * last price / 100`.
pub fn average_true_range(prices: &[f64], highs: &[f64], lows: &[f64], realized_volatility: f64) -> f64 {
    let n = prices.len();
    if n <= ATR_PERIOD || highs.len() < ATR_PERIOD || lows.len() < ATR_PERIOD {
        return prices
            .last()
            .map_or(0.0, |last| realized_volatility * last / 100.0);
    }

    let highs = &highs[highs.len() - ATR_PERIOD..];
    let lows = &lows[lows.len() - ATR_PERIOD..];
    let prev_closes = &prices[n - ATR_PERIOD - 1..n - 1];

    let total: f64 = highs
        .iter()
        .zip(lows)
        .zip(prev_closes)
        .map(|((&h, &l), &c)| (h - l).max((h - c).abs()).max((l - c).abs()))
        .sum();

    total / ATR_PERIOD as f64
}

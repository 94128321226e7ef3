/// Minutes in a trading year, used to annualize per-tick return dispersion.
const ANNUALIZATION_PERIODS: f64 = 252.0 * 1440.0;

/// Simple returns `p[i] / p[i-1] - 1` for consecutive prices (oldest first).
pub fn returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Population standard deviation. 0 for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// Annualized volatility of `returns`, in percent.
pub fn realized_volatility(returns: &[f64]) -> f64 {
    std_dev(returns) * ANNUALIZATION_PERIODS.sqrt() * 100.0
}

/// Number of most recent prices the trend and efficiency measures look at.
pub const TREND_WINDOW: usize = 30;

/// Scale applied to the R²-weighted, price-normalized slope.
const TREND_SCALE: f64 = 100_000.0;

/// Ordinary least-squares fit `y = slope * x + intercept`, plus Pearson `r`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r: f64,
}

/// Closed-form least squares from the sums of x, y, xy, x² and y².
///
/// All-zero result for mismatched lengths, fewer than two points or a
/// degenerate x spread. A flat y is a horizontal line with `r = 0`.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Regression {
    if x.len() != y.len() || x.len() < 2 {
        return Regression::default();
    }
    // Raw sums leave rounding residue on flat input; short-circuit it.
    if y.iter().all(|&v| v == y[0]) && x.iter().any(|&v| v != x[0]) {
        return Regression {
            slope: 0.0,
            intercept: y[0],
            r: 0.0,
        };
    }
    let n = x.len() as f64;

    let (mut sx, mut sy, mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        sx += xi;
        sy += yi;
        sxy += xi * yi;
        sxx += xi * xi;
        syy += yi * yi;
    }

    let cov = n * sxy - sx * sy;
    let var_x = n * sxx - sx * sx;
    if var_x == 0.0 {
        return Regression::default();
    }
    let slope = cov / var_x;
    let intercept = (sy - slope * sx) / n;

    let denom = (var_x * (n * syy - sy * sy)).sqrt();
    let r = if denom == 0.0 || !denom.is_finite() { 0.0 } else { cov / denom };

    Regression { slope, intercept, r }
}

/// Signed trend strength of the last [`TREND_WINDOW`] prices:
/// `slope * r² * (window / mean price) * 100_000`. 0 with too few prices.
pub fn trend_strength(prices: &[f64]) -> f64 {
    if prices.len() < TREND_WINDOW {
        return 0.0;
    }
    let window = &prices[prices.len() - TREND_WINDOW..];
    let x: Vec<f64> = (0..TREND_WINDOW).map(|i| i as f64).collect();
    let fit = linear_regression(&x, window);

    let mean = window.iter().sum::<f64>() / TREND_WINDOW as f64;
    if mean == 0.0 {
        return 0.0;
    }
    fit.slope * fit.r * fit.r * (TREND_WINDOW as f64 / mean) * TREND_SCALE
}

/// Net move over path length across the last [`TREND_WINDOW`] prices.
///
/// Both the net move and the path (29 deltas) span the same window, so the
/// ratio lies in [0, 1]. Neutral 0.5 with too few prices or a flat path.
pub fn market_efficiency_ratio(prices: &[f64]) -> f64 {
    let n = prices.len();
    if n < TREND_WINDOW {
        return 0.5;
    }
    let net = (prices[n - 1] - prices[n - TREND_WINDOW]).abs();
    let path: f64 = prices[n - TREND_WINDOW..]
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .sum();

    if path == 0.0 {
        return 0.5;
    }
    net / path
}

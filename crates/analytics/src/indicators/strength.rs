/// Maximum number of recent returns considered by [`relative_strength`].
pub const RS_WINDOW: usize = 500;

/// Gains over total absolute movement for the last [`RS_WINDOW`] returns.
///
/// Neutral 0.5 with fewer than two returns or no movement at all.
pub fn relative_strength(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.5;
    }
    let window = &returns[returns.len().saturating_sub(RS_WINDOW)..];

    let (gains, losses) = window.iter().fold((0.0, 0.0), |(g, l), &r| {
        if r > 0.0 {
            (g + r, l)
        } else {
            (g, l - r)
        }
    });

    if gains + losses == 0.0 {
        return 0.5;
    }
    gains / (gains + losses)
}

/// Bid share of all retained traded volume. Neutral 0.5 with no volume.
pub fn order_imbalance(bid_volumes: &[f64], ask_volumes: &[f64]) -> f64 {
    let bid: f64 = bid_volumes.iter().sum();
    let ask: f64 = ask_volumes.iter().sum();
    if bid + ask == 0.0 {
        return 0.5;
    }
    bid / (bid + ask)
}

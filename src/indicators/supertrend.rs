use super::atr::calculate_atr;

/// Supertrend line: current price minus multiplier × ATR(period).
///
/// With only close prices this is the lower-band form of the indicator; a
/// price holding above it reads as an uptrend.
pub fn calculate_supertrend(
    prices: &[i64],
    current_price: i64,
    period: usize,
    multiplier: f64,
) -> Option<f64> {
    let atr = calculate_atr(prices, period)?;
    Some(current_price as f64 - multiplier * atr)
}

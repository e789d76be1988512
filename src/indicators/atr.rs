/// Average True Range (ATR), close-only proxy
///
/// Only close prices are available in a price history, so the true range of
/// one step degenerates to the absolute price delta. ATR is the mean of the
/// last `period` absolute deltas.
pub fn calculate_atr(prices: &[i64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let start = prices.len() - period - 1;
    let mut sum = 0.0;
    for i in (start + 1)..prices.len() {
        sum += (prices[i] - prices[i - 1]).abs() as f64;
    }

    Some(sum / period as f64)
}

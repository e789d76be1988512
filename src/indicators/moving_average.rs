/// Calculate Simple Moving Average (SMA) over the last `period` prices.
///
/// Prices are in minor currency units (cents); the average is fractional.
pub fn calculate_sma(prices: &[i64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: i64 = prices.iter().rev().take(period).sum();
    Some(sum as f64 / period as f64)
}

use super::moving_average::calculate_sma;

/// Bollinger bands: SMA ± multiplier × population standard deviation over
/// the last `period` prices. Returns (upper, lower).
pub fn calculate_bollinger(prices: &[i64], period: usize, multiplier: f64) -> Option<(f64, f64)> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sma = calculate_sma(prices, period)?;

    let window = &prices[prices.len() - period..];
    let variance: f64 = window
        .iter()
        .map(|&p| {
            let diff = p as f64 - sma;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;
    let std_dev = variance.sqrt();

    Some((sma + multiplier * std_dev, sma - multiplier * std_dev))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bollinger_bands() {
        // Window 100, 200: mean 150, population stddev 50
        let prices = vec![999, 100, 200];
        let (upper, lower) = calculate_bollinger(&prices, 2, 2.0).unwrap();
        assert_eq!(upper, 250.0);
        assert_eq!(lower, 50.0);
    }

    #[test]
    fn test_bollinger_flat_prices_collapse_to_sma() {
        let prices = vec![10000; 20];
        let (upper, lower) = calculate_bollinger(&prices, 20, 2.0).unwrap();
        assert_eq!(upper, 10000.0);
        assert_eq!(lower, 10000.0);
    }

    #[test]
    fn test_bollinger_insufficient_data() {
        let prices = vec![10000, 10100];
        assert!(calculate_bollinger(&prices, 20, 2.0).is_none());
    }
}

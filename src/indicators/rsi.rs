/// Calculate Relative Strength Index (RSI)
///
/// Wilder-style RSI over the last `period` price deltas: the average gain
/// divided by the average loss of the window. When the window has no losses
/// the RSI is 100.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
pub fn calculate_rsi(prices: &[i64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;

    // Last `period` deltas
    let start = prices.len() - period - 1;
    for i in (start + 1)..prices.len() {
        let change = (prices[i] - prices[i - 1]) as f64;
        if change > 0.0 {
            gain_sum += change;
        } else {
            loss_sum += change.abs();
        }
    }

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_calculation() {
        let prices = vec![
            4400, 4425, 4450, 4375, 4400, 4450, 4500, 4550, 4525, 4550, 4600, 4650, 4625, 4600,
            4650,
        ];

        let rsi = calculate_rsi(&prices, 14);
        assert!(rsi.is_some());

        let rsi_value = rsi.unwrap();
        assert!(rsi_value > 0.0 && rsi_value < 100.0);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let prices = vec![10000, 10200, 10100];
        let rsi = calculate_rsi(&prices, 14);
        assert!(rsi.is_none());
    }

    #[test]
    fn test_rsi_all_gains() {
        let prices = vec![10000, 10100, 10200, 10300, 10400, 10500];
        let rsi = calculate_rsi(&prices, 5);
        assert_eq!(rsi, Some(100.0)); // No losses in the window
    }

    #[test]
    fn test_rsi_balanced_window_is_50() {
        // Alternating +100 / -100 deltas: average gain equals average loss
        let prices = vec![10000, 10100, 10000, 10100, 10000];
        let rsi = calculate_rsi(&prices, 4);
        assert_eq!(rsi, Some(50.0));
    }
}

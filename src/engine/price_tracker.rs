use std::collections::{HashMap, VecDeque};

/// Per-instrument rolling history cap. Oldest entries are evicted first.
pub const MAX_PRICE_HISTORY: usize = 200;

/// Trend context derived from two consecutive observations of an
/// instrument. `last_minute_average` is filled in by the tick from the
/// gateway's recent-trade aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceContext {
    pub current_price: i64,
    pub previous_price: i64,
    pub is_price_up: bool,
    pub is_price_down: bool,
    pub last_minute_average: Option<i64>,
    pub price_history: Vec<i64>,
}

/// Rolling price history and trend derivation for the instruments one
/// session sees.
///
/// Deliberately not thread-safe: each session owns its own tracker, so no
/// state is shared across sessions.
#[derive(Debug, Default)]
pub struct PriceTracker {
    history: HashMap<String, VecDeque<i64>>,
}

impl PriceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current_price` for an instrument and derive its trend
    /// context. The first observation of an instrument records the price
    /// but returns `None`: there is no trend yet.
    pub fn observe(&mut self, instrument_id: &str, current_price: i64) -> Option<PriceContext> {
        let prices = self
            .history
            .entry(instrument_id.to_string())
            .or_insert_with(VecDeque::new);

        let previous_price = match prices.back() {
            Some(&p) => p,
            None => {
                prices.push_back(current_price);
                return None;
            }
        };

        prices.push_back(current_price);
        while prices.len() > MAX_PRICE_HISTORY {
            prices.pop_front();
        }

        Some(PriceContext {
            current_price,
            previous_price,
            is_price_up: current_price > previous_price,
            is_price_down: current_price < previous_price,
            last_minute_average: None,
            price_history: prices.iter().copied().collect(),
        })
    }

    /// Current history for an instrument, oldest first.
    pub fn history(&self, instrument_id: &str) -> Vec<i64> {
        self.history
            .get(instrument_id)
            .map(|prices| prices.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Forget everything. Used between test runs.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

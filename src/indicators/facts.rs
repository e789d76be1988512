use crate::indicators::{
    calculate_atr, calculate_bollinger, calculate_rsi, calculate_sma, calculate_supertrend,
};
use crate::rules::{Facts, FactValue};

// Default parameters used when a rule references a bare indicator name.
const DEFAULT_MA_PERIOD: usize = 20;
const DEFAULT_RSI_PERIOD: usize = 14;
const DEFAULT_BOLLINGER_PERIOD: usize = 20;
const DEFAULT_BOLLINGER_MULTIPLIER: f64 = 2.0;
const DEFAULT_ATR_PERIOD: usize = 14;
const DEFAULT_SUPERTREND_PERIOD: usize = 10;
const DEFAULT_SUPERTREND_MULTIPLIER: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    Ma,
    Rsi,
    BollingerUpper,
    BollingerLower,
    Atr,
    Supertrend,
}

/// A parsed indicator fact key of the form `name:period[:multiplier]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorKey {
    pub kind: IndicatorKind,
    pub period: usize,
    pub multiplier: f64,
}

/// Parse an indicator key, resolving bare base names to their documented
/// default period / multiplier. Returns `None` for anything that is not a
/// recognized indicator key.
pub fn parse_indicator_key(key: &str) -> Option<IndicatorKey> {
    let mut parts = key.split(':');
    let base = parts.next()?;

    let (kind, default_period, default_multiplier) = match base {
        "ma" => (IndicatorKind::Ma, DEFAULT_MA_PERIOD, 1.0),
        "rsi" => (IndicatorKind::Rsi, DEFAULT_RSI_PERIOD, 1.0),
        "bollingerUpper" => (
            IndicatorKind::BollingerUpper,
            DEFAULT_BOLLINGER_PERIOD,
            DEFAULT_BOLLINGER_MULTIPLIER,
        ),
        "bollingerLower" => (
            IndicatorKind::BollingerLower,
            DEFAULT_BOLLINGER_PERIOD,
            DEFAULT_BOLLINGER_MULTIPLIER,
        ),
        "atr" => (IndicatorKind::Atr, DEFAULT_ATR_PERIOD, 1.0),
        "supertrend" => (
            IndicatorKind::Supertrend,
            DEFAULT_SUPERTREND_PERIOD,
            DEFAULT_SUPERTREND_MULTIPLIER,
        ),
        _ => return None,
    };

    let period = match parts.next() {
        Some(raw) => raw.parse::<usize>().ok().filter(|p| *p > 0)?,
        None => default_period,
    };
    let multiplier = match parts.next() {
        Some(raw) => raw.parse::<f64>().ok().filter(|m| m.is_finite())?,
        None => default_multiplier,
    };
    if parts.next().is_some() {
        return None;
    }

    Some(IndicatorKey {
        kind,
        period,
        multiplier,
    })
}

/// Compute one indicator value, applying the documented fallback when the
/// history is too short: RSI → 50 (neutral), ATR → 0, everything else →
/// current price.
pub fn compute_indicator(key: &IndicatorKey, history: &[i64], current_price: i64) -> f64 {
    match key.kind {
        IndicatorKind::Ma => {
            calculate_sma(history, key.period).unwrap_or(current_price as f64)
        }
        IndicatorKind::Rsi => calculate_rsi(history, key.period).unwrap_or(50.0),
        IndicatorKind::BollingerUpper => calculate_bollinger(history, key.period, key.multiplier)
            .map(|(upper, _)| upper)
            .unwrap_or(current_price as f64),
        IndicatorKind::BollingerLower => calculate_bollinger(history, key.period, key.multiplier)
            .map(|(_, lower)| lower)
            .unwrap_or(current_price as f64),
        IndicatorKind::Atr => calculate_atr(history, key.period).unwrap_or(0.0),
        IndicatorKind::Supertrend => {
            calculate_supertrend(history, current_price, key.period, key.multiplier)
                .unwrap_or(current_price as f64)
        }
    }
}

/// Resolve every requested key into a fact map entry under its original
/// spelling. Keys that are not recognized indicator keys are skipped.
///
/// Called once per (bot, instrument) per tick with exactly the keys the
/// bot's rule set references.
pub fn compute_facts(history: &[i64], current_price: i64, requested: &[String]) -> Facts {
    let mut facts = Facts::new();
    for raw_key in requested {
        if let Some(key) = parse_indicator_key(raw_key) {
            let value = compute_indicator(&key, history, current_price);
            facts.insert(raw_key.clone(), FactValue::Num(value));
        }
    }
    facts
}

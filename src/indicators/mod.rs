// Technical indicators module
// Streaming indicator math over bounded price histories (minor-unit prices)

pub mod atr;
pub mod bollinger;
pub mod facts;
pub mod moving_average;
pub mod rsi;
pub mod supertrend;

pub use atr::calculate_atr;
pub use bollinger::calculate_bollinger;
pub use facts::{compute_facts, compute_indicator, parse_indicator_key, IndicatorKey, IndicatorKind};
pub use moving_average::calculate_sma;
pub use rsi::calculate_rsi;
pub use supertrend::calculate_supertrend;

// Bot tick engine: price tracking, per-pair decision pipeline, tick loop body
pub mod pipeline;
pub mod price_tracker;
pub mod tick;

pub use pipeline::{process_pair, PairContext, TickBatch};
pub use price_tracker::{PriceContext, PriceTracker, MAX_PRICE_HISTORY};
pub use tick::{run_tick, CachedStrategy, EvaluatorCache, TickOutcome};

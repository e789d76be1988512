use serde::Deserialize;

/// Engine configuration, read once at construction. Sessions copy it; it
/// never changes mid-flight.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Target period of one tick. Best-effort, not a hard deadline.
    pub tick_interval_ms: u64,
    /// Floor on the inter-tick sleep even when a tick ran long.
    pub min_rest_delay_ms: u64,
    /// Cap on orders inserted per tick; overflow is truncated with a warning.
    pub max_orders_per_batch: usize,
    /// Base URL of the market data gateway.
    pub gateway_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            min_rest_delay_ms: 250,
            max_orders_per_batch: 50,
            gateway_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from `BOTFLEET_*` environment variables layered over defaults,
    /// e.g. `BOTFLEET_TICK_INTERVAL_MS=1000`.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let settings = config::Config::builder()
            .set_default("tick_interval_ms", defaults.tick_interval_ms as i64)?
            .set_default("min_rest_delay_ms", defaults.min_rest_delay_ms as i64)?
            .set_default("max_orders_per_batch", defaults.max_orders_per_batch as i64)?
            .set_default("gateway_url", defaults.gateway_url)?
            .add_source(config::Environment::with_prefix("BOTFLEET"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

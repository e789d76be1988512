// Market data gateway: the one external collaborator the engine talks to
pub mod http;

pub use http::HttpGateway;

use async_trait::async_trait;

use crate::models::{MarketSnapshot, OrderInsert};

/// The store the engine reads from and writes to once per tick. Both calls
/// are treated as all-or-nothing from the engine's perspective; actual
/// atomicity is the gateway's contract to honor.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Fetch everything a tick needs: bots, instruments, open orders,
    /// portfolio positions, rule sets, recent-trade averages.
    async fn fetch_snapshot(&self) -> anyhow::Result<MarketSnapshot>;

    /// Apply one tick's cancellations and inserts as a single batch.
    async fn apply_batch(
        &self,
        cancel_order_ids: &[String],
        new_orders: &[OrderInsert],
    ) -> anyhow::Result<()>;
}

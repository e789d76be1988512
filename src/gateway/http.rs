use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::time::{sleep, Duration};

use super::MarketGateway;
use crate::models::{MarketSnapshot, OrderInsert};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

/// HTTP client for a market data store exposing the snapshot/batch API.
///
/// Snapshot fetches retry with exponential backoff since they are
/// side-effect free. Batch applies are never retried: a failed apply fails
/// the tick, and the next tick re-derives its decisions from fresh store
/// state.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<'a> {
    cancel_order_ids: &'a [String],
    new_orders: &'a [OrderInsert],
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch_snapshot_once(&self) -> anyhow::Result<MarketSnapshot> {
        let url = format!("{}/snapshot", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("snapshot request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("snapshot request returned {}", response.status()));
        }

        response
            .json::<MarketSnapshot>()
            .await
            .context("decoding snapshot body")
    }
}

#[async_trait]
impl MarketGateway for HttpGateway {
    async fn fetch_snapshot(&self) -> anyhow::Result<MarketSnapshot> {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.fetch_snapshot_once().await {
                Ok(snapshot) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "snapshot fetch recovered");
                    }
                    return Ok(snapshot);
                }
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
                        tracing::warn!(
                            attempt,
                            max = MAX_RETRIES,
                            error = %e,
                            backoff_ms,
                            "snapshot fetch failed, retrying"
                        );
                        sleep(Duration::from_millis(backoff_ms)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("snapshot fetch failed")))
    }

    async fn apply_batch(
        &self,
        cancel_order_ids: &[String],
        new_orders: &[OrderInsert],
    ) -> anyhow::Result<()> {
        let url = format!("{}/orders/batch", self.base_url);
        let body = BatchRequest {
            cancel_order_ids,
            new_orders,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("batch request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("batch request returned {}", response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderSide, OrderStatus};

    #[tokio::test]
    async fn test_fetch_snapshot_decodes_store_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/snapshot")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "bots": [{"id": "b1", "ownerId": "u1", "availableBalance": 10000,
                              "strategyId": "default", "isBot": true}],
                    "instruments": [{"id": "i1", "symbol": "ACME", "currentPrice": 105}],
                    "openOrders": [],
                    "portfolios": [],
                    "recentTradeAverages": [{"instrumentId": "i1", "averagePrice": 103}]
                }"#,
            )
            .create_async()
            .await;

        let gateway = HttpGateway::new(server.url());
        let snapshot = gateway.fetch_snapshot().await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.bots.len(), 1);
        assert_eq!(snapshot.recent_trade_averages[0].average_price, 103);
    }

    #[tokio::test]
    async fn test_fetch_snapshot_retries_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("GET", "/snapshot")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/snapshot")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"bots": [], "instruments": [], "openOrders": [], "portfolios": []}"#)
            .create_async()
            .await;

        let gateway = HttpGateway::new(server.url());
        let snapshot = gateway.fetch_snapshot().await.unwrap();

        failing.assert_async().await;
        ok.assert_async().await;
        assert!(snapshot.bots.is_empty());
    }

    #[tokio::test]
    async fn test_apply_batch_posts_camel_case_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders/batch")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "cancelOrderIds": ["o1"],
                "newOrders": [{
                    "instrumentId": "i1",
                    "botId": "b1",
                    "side": "BUY",
                    "limitPrice": 105,
                    "quantity": 2,
                    "status": "OPEN"
                }]
            })))
            .with_status(204)
            .create_async()
            .await;

        let gateway = HttpGateway::new(server.url());
        let inserts = vec![OrderInsert {
            instrument_id: "i1".to_string(),
            bot_id: "b1".to_string(),
            side: OrderSide::Buy,
            limit_price: 105,
            quantity: 2,
            status: OrderStatus::Open,
        }];
        gateway
            .apply_batch(&["o1".to_string()], &inserts)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_apply_batch_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders/batch")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let gateway = HttpGateway::new(server.url());
        let result = gateway.apply_batch(&["o1".to_string()], &[]).await;

        mock.assert_async().await;
        assert!(result.is_err());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A trading bot as stored by the market data gateway.
///
/// `available_balance` is authoritative in the store; the tick engine keeps
/// an ephemeral per-tick copy so one tick cannot overdraft across
/// instruments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bot {
    pub id: String,
    pub owner_id: Option<String>,
    /// Minor currency units (cents).
    pub available_balance: i64,
    pub strategy_id: String,
    pub is_bot: bool,
}

/// A tradable instrument with its current price in minor units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub id: String,
    pub symbol: String,
    pub current_price: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "FILLED")]
    Filled,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

/// An order resting in the store. The engine only ever creates and cancels
/// bot-owned orders; fills happen elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub instrument_id: String,
    pub bot_id: String,
    pub side: OrderSide,
    pub limit_price: i64,
    pub quantity: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// A new order to be inserted by the gateway at the end of a tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderInsert {
    pub instrument_id: String,
    pub bot_id: String,
    pub side: OrderSide,
    pub limit_price: i64,
    pub quantity: i64,
    pub status: OrderStatus,
}

/// Shares owned by one bot in one instrument. Read-only input; mutated
/// externally on fills.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPosition {
    pub bot_id: String,
    pub instrument_id: String,
    pub shares: i64,
}

/// Average trade price over the last minute for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradeAverage {
    pub instrument_id: String,
    pub average_price: i64,
}

/// A persisted rule set, keyed by strategy id. Rules stay as raw JSON until
/// the validating parse boundary in `rules::parser` turns them into a
/// `StrategyEvaluator`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyRuleSet {
    pub strategy_id: String,
    pub rules: serde_json::Value,
}

/// Everything the engine reads from the gateway at the start of a tick.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub bots: Vec<Bot>,
    pub instruments: Vec<Instrument>,
    pub open_orders: Vec<Order>,
    pub portfolios: Vec<PortfolioPosition>,
    #[serde(default)]
    pub rule_sets_by_strategy: Vec<StrategyRuleSet>,
    #[serde(default)]
    pub recent_trade_averages: Vec<TradeAverage>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Public view of a session, returned by every control-surface call instead
/// of the live object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub owner_id: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_tick_duration_ms: Option<u64>,
    pub tick_count: u64,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_side_wire_format() {
        assert_eq!(serde_json::to_string(&OrderSide::Buy).unwrap(), "\"BUY\"");
        assert_eq!(
            serde_json::from_str::<OrderSide>("\"SELL\"").unwrap(),
            OrderSide::Sell
        );
    }

    #[test]
    fn test_snapshot_camel_case() {
        let json = r#"{
            "bots": [{"id": "b1", "ownerId": null, "availableBalance": 10000,
                      "strategyId": "default", "isBot": true}],
            "instruments": [{"id": "i1", "symbol": "ACME", "currentPrice": 105}],
            "openOrders": [],
            "portfolios": []
        }"#;

        let snapshot: MarketSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.bots[0].available_balance, 10000);
        assert_eq!(snapshot.instruments[0].current_price, 105);
        assert!(snapshot.rule_sets_by_strategy.is_empty());
    }

    #[test]
    fn test_session_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Running).unwrap(),
            "\"running\""
        );
    }
}

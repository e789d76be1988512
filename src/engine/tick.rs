use std::collections::{HashMap, HashSet};

use anyhow::Context;
use chrono::Utc;
use rand::Rng;

use crate::config::EngineConfig;
use crate::engine::pipeline::{process_pair, PairContext, TickBatch};
use crate::engine::price_tracker::PriceTracker;
use crate::gateway::MarketGateway;
use crate::models::{MarketSnapshot, Order, OrderStatus, StrategyRuleSet};
use crate::rules::StrategyEvaluator;

/// A parsed strategy plus the indicator keys its rules reference,
/// discovered once when the strategy is first seen.
pub struct CachedStrategy {
    pub evaluator: StrategyEvaluator,
    pub indicator_keys: Vec<String>,
}

impl CachedStrategy {
    pub fn new(evaluator: StrategyEvaluator) -> Self {
        let indicator_keys = evaluator.indicator_keys();
        Self {
            evaluator,
            indicator_keys,
        }
    }
}

/// Per-session cache of parsed evaluators, keyed by strategy id. Rule sets
/// are immutable once parsed, so a strategy is parsed at most once per
/// session lifetime.
#[derive(Default)]
pub struct EvaluatorCache {
    entries: HashMap<String, CachedStrategy>,
}

impl EvaluatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(
        &mut self,
        strategy_id: &str,
        rule_sets: &[StrategyRuleSet],
    ) -> Option<&CachedStrategy> {
        if !self.entries.contains_key(strategy_id) {
            let rule_set = rule_sets.iter().find(|rs| rs.strategy_id == strategy_id)?;
            match StrategyEvaluator::from_payload(&rule_set.rules) {
                Ok(evaluator) => {
                    self.entries
                        .insert(strategy_id.to_string(), CachedStrategy::new(evaluator));
                }
                Err(e) => {
                    tracing::warn!(strategy = strategy_id, error = %e, "unparsable rule set");
                    return None;
                }
            }
        }
        self.entries.get(strategy_id)
    }
}

/// What one tick produced, for loop-level logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickOutcome {
    pub cancelled: usize,
    pub inserted: usize,
}

/// Run one full tick: fetch the snapshot, derive per-instrument trend
/// contexts, run the decision pipeline for every (bot, instrument) pair in
/// fixed store order, then send the deduplicated, capped batch back.
pub async fn run_tick<G, R>(
    gateway: &G,
    tracker: &mut PriceTracker,
    cache: &mut EvaluatorCache,
    bound_strategy: Option<&CachedStrategy>,
    config: &EngineConfig,
    rng: &mut R,
) -> anyhow::Result<TickOutcome>
where
    G: MarketGateway + ?Sized,
    R: Rng,
{
    let snapshot = gateway
        .fetch_snapshot()
        .await
        .context("fetching market snapshot")?;

    let orders_by_pair = organize_open_orders(&snapshot);
    let shares_by_pair: HashMap<(&str, &str), i64> = snapshot
        .portfolios
        .iter()
        .map(|p| ((p.bot_id.as_str(), p.instrument_id.as_str()), p.shares))
        .collect();
    let averages: HashMap<&str, i64> = snapshot
        .recent_trade_averages
        .iter()
        .map(|a| (a.instrument_id.as_str(), a.average_price))
        .collect();

    // One ephemeral balance per bot for the whole tick, so a debit on an
    // earlier instrument is visible to a later one.
    let mut balances: HashMap<String, i64> = snapshot
        .bots
        .iter()
        .map(|b| (b.id.clone(), b.available_balance))
        .collect();

    let mut batch = TickBatch::default();
    let now = Utc::now();

    for instrument in &snapshot.instruments {
        // First sight of an instrument yields no trend, so no decisions.
        let Some(mut price) = tracker.observe(&instrument.id, instrument.current_price) else {
            continue;
        };
        price.last_minute_average = averages.get(instrument.id.as_str()).copied();

        for bot in &snapshot.bots {
            if !bot.is_bot {
                continue;
            }
            let strategy = match bound_strategy {
                Some(bound) => bound,
                None => match cache.resolve(&bot.strategy_id, &snapshot.rule_sets_by_strategy) {
                    Some(cached) => cached,
                    None => continue,
                },
            };

            let ctx = PairContext {
                bot,
                instrument,
                evaluator: &strategy.evaluator,
                indicator_keys: &strategy.indicator_keys,
                price: &price,
                open_orders: orders_by_pair
                    .get(&(bot.id.as_str(), instrument.id.as_str()))
                    .cloned()
                    .unwrap_or_default(),
                shares_owned: shares_by_pair
                    .get(&(bot.id.as_str(), instrument.id.as_str()))
                    .copied()
                    .unwrap_or(0),
                tick_interval_ms: config.tick_interval_ms,
                now,
            };

            // One failing pair never aborts the tick for the others.
            if let Err(e) = process_pair(&ctx, &mut balances, &mut batch, rng) {
                tracing::error!(
                    bot = %bot.id,
                    instrument = %instrument.id,
                    error = %e,
                    "pair evaluation failed, continuing tick"
                );
            }
        }
    }

    let cancel_order_ids = dedupe_preserving_order(batch.cancel_order_ids);
    let mut new_orders = batch.new_orders;
    if new_orders.len() > config.max_orders_per_batch {
        tracing::warn!(
            produced = new_orders.len(),
            cap = config.max_orders_per_batch,
            "truncating order batch"
        );
        new_orders.truncate(config.max_orders_per_batch);
    }

    let outcome = TickOutcome {
        cancelled: cancel_order_ids.len(),
        inserted: new_orders.len(),
    };

    if !cancel_order_ids.is_empty() || !new_orders.is_empty() {
        gateway
            .apply_batch(&cancel_order_ids, &new_orders)
            .await
            .context("applying order batch")?;
    }

    Ok(outcome)
}

fn organize_open_orders(snapshot: &MarketSnapshot) -> HashMap<(&str, &str), Vec<&Order>> {
    let mut by_pair: HashMap<(&str, &str), Vec<&Order>> = HashMap::new();
    for order in &snapshot.open_orders {
        if order.status != OrderStatus::Open {
            continue;
        }
        by_pair
            .entry((order.bot_id.as_str(), order.instrument_id.as_str()))
            .or_default()
            .push(order);
    }
    by_pair
}

fn dedupe_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_preserves_first_occurrence_order() {
        let ids = vec![
            "c".to_string(),
            "a".to_string(),
            "c".to_string(),
            "b".to_string(),
            "a".to_string(),
        ];
        assert_eq!(
            dedupe_preserving_order(ids),
            vec!["c".to_string(), "a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_organize_skips_non_open_orders() {
        use crate::models::{Order, OrderSide};
        let mut snapshot = MarketSnapshot::default();
        snapshot.open_orders.push(Order {
            id: "o1".to_string(),
            instrument_id: "i1".to_string(),
            bot_id: "b1".to_string(),
            side: OrderSide::Buy,
            limit_price: 100,
            quantity: 1,
            status: OrderStatus::Filled,
            created_at: Utc::now(),
        });

        assert!(organize_open_orders(&snapshot).is_empty());
    }
}

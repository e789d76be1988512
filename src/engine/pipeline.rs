use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::engine::price_tracker::PriceContext;
use crate::indicators::compute_facts;
use crate::models::{Bot, Instrument, Order, OrderInsert, OrderSide, OrderStatus};
use crate::rules::{Decision, EventType, FactValue, Facts, LimitPriceType, StrategyEvaluator};

/// Aggressive/passive price buffer for the `random` strategy's default
/// pricing, as a fraction of the current price.
const RANDOM_PRICE_BUFFER_PCT: f64 = 0.02;

/// Random quantity range used when a decision carries no sizePct.
const RANDOM_QUANTITY_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// Everything one (bot, instrument) pass needs, borrowed from the tick's
/// organized snapshot.
pub struct PairContext<'a> {
    pub bot: &'a Bot,
    pub instrument: &'a Instrument,
    pub evaluator: &'a StrategyEvaluator,
    /// Indicator keys this bot's rule set references, discovered once per
    /// distinct strategy by the tick.
    pub indicator_keys: &'a [String],
    pub price: &'a PriceContext,
    /// This bot's OPEN orders on this instrument.
    pub open_orders: Vec<&'a Order>,
    pub shares_owned: i64,
    pub tick_interval_ms: u64,
    pub now: DateTime<Utc>,
}

/// Cancellations and inserts accumulated across one tick.
#[derive(Debug, Default)]
pub struct TickBatch {
    pub cancel_order_ids: Vec<String>,
    pub new_orders: Vec<OrderInsert>,
}

/// Run the decision pipeline for one (bot, instrument) pair: assemble
/// facts, evaluate cancellations per open order, then (if nothing is left
/// resting) evaluate creation. Ephemeral balance debits and refunds go
/// through `balances` so later pairs in the same tick see them.
pub fn process_pair<R: Rng>(
    ctx: &PairContext,
    balances: &mut HashMap<String, i64>,
    batch: &mut TickBatch,
    rng: &mut R,
) -> anyhow::Result<()> {
    let mut available = *balances
        .get(&ctx.bot.id)
        .unwrap_or(&ctx.bot.available_balance);

    let facts = assemble_facts(ctx, available, rng);

    // Cancellation pass: one evaluation per open order with that order's
    // specific facts populated.
    let mut cancelled: Vec<&Order> = Vec::new();
    let mut survivor = false;
    for order in &ctx.open_orders {
        let order_facts = with_order_facts(&facts, order, ctx);
        match ctx.evaluator.evaluate(&order_facts) {
            Some(Decision {
                event: EventType::Cancel,
                ..
            }) => {
                tracing::debug!(
                    bot = %ctx.bot.id,
                    instrument = %ctx.instrument.id,
                    order = %order.id,
                    "cancelling order"
                );
                batch.cancel_order_ids.push(order.id.clone());
                available += buy_refund(order);
                cancelled.push(order);
            }
            _ => survivor = true,
        }
    }

    // One resting order per instrument per bot: a surviving open order
    // suppresses creation this tick.
    if survivor {
        balances.insert(ctx.bot.id.clone(), available);
        return Ok(());
    }

    match ctx.evaluator.evaluate(&facts) {
        Some(Decision {
            event: EventType::Cancel,
            ..
        }) => {
            // CANCEL without per-order context means: cancel everything
            // still open on this instrument.
            for order in &ctx.open_orders {
                if cancelled.iter().any(|c| c.id == order.id) {
                    continue;
                }
                batch.cancel_order_ids.push(order.id.clone());
                available += buy_refund(order);
            }
        }
        Some(decision) => {
            available = try_create_order(ctx, &decision, available, batch, rng);
        }
        None => {}
    }

    balances.insert(ctx.bot.id.clone(), available);
    Ok(())
}

fn assemble_facts<R: Rng>(ctx: &PairContext, available: i64, rng: &mut R) -> Facts {
    let price = ctx.price;
    let mut facts = compute_facts(
        &price.price_history,
        price.current_price,
        ctx.indicator_keys,
    );

    let current = price.current_price as f64;
    let previous = price.previous_price as f64;
    let volatility = if previous != 0.0 {
        (current - previous).abs() / previous
    } else {
        0.0
    };
    let percent_change = if previous != 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    };

    facts.insert("currentPrice".into(), FactValue::Num(current));
    facts.insert("previousPrice".into(), FactValue::Num(previous));
    facts.insert("isPriceUp".into(), FactValue::Bool(price.is_price_up));
    facts.insert("isPriceDown".into(), FactValue::Bool(price.is_price_down));
    if let Some(avg) = price.last_minute_average {
        facts.insert("lastMinuteAverage".into(), FactValue::Num(avg as f64));
    }
    facts.insert(
        "hasPosition".into(),
        FactValue::Bool(ctx.shares_owned > 0),
    );
    facts.insert(
        "openOrderCount".into(),
        FactValue::Num(ctx.open_orders.len() as f64),
    );
    facts.insert("priceVolatility".into(), FactValue::Num(volatility));
    facts.insert("percentPriceChange".into(), FactValue::Num(percent_change));
    facts.insert("availableBalance".into(), FactValue::Num(available as f64));
    facts.insert(
        "sharesOwned".into(),
        FactValue::Num(ctx.shares_owned as f64),
    );
    // One draw per (bot, instrument) evaluation, not one per condition.
    facts.insert(
        "randomChance".into(),
        FactValue::Num(rng.gen_range(0.0..100.0)),
    );
    // Order-specific facts are zero outside the cancellation pass.
    facts.insert("orderPrice".into(), FactValue::Num(0.0));
    facts.insert("orderAge".into(), FactValue::Num(0.0));
    facts.insert("orderDeviation".into(), FactValue::Num(0.0));

    facts
}

fn with_order_facts(facts: &Facts, order: &Order, ctx: &PairContext) -> Facts {
    let mut order_facts = facts.clone();

    let elapsed_ms = (ctx.now - order.created_at).num_milliseconds().max(0) as u64;
    let age_ticks = elapsed_ms / ctx.tick_interval_ms.max(1);

    let current = ctx.price.current_price;
    let deviation = if current != 0 {
        (order.limit_price - current).abs() as f64 / current as f64 * 100.0
    } else {
        0.0
    };

    order_facts.insert("orderPrice".into(), FactValue::Num(order.limit_price as f64));
    order_facts.insert("orderAge".into(), FactValue::Num(age_ticks as f64));
    order_facts.insert("orderDeviation".into(), FactValue::Num(deviation));
    order_facts
}

/// Cancelling a BUY returns its reserved notional to the ephemeral
/// balance; cancelled SELLs release nothing (shares were never debited).
fn buy_refund(order: &Order) -> i64 {
    match order.side {
        OrderSide::Buy => order.limit_price * order.quantity,
        OrderSide::Sell => 0,
    }
}

/// Size and price a BUY/SELL decision, enforce affordability, and append
/// the insert. Returns the (possibly debited) ephemeral balance.
fn try_create_order<R: Rng>(
    ctx: &PairContext,
    decision: &Decision,
    available: i64,
    batch: &mut TickBatch,
    rng: &mut R,
) -> i64 {
    let side = match decision.event {
        EventType::Buy => OrderSide::Buy,
        EventType::Sell => OrderSide::Sell,
        EventType::Cancel => return available,
    };

    let current = ctx.instrument.current_price;
    let quantity = match decision.params.size_pct {
        Some(pct) => {
            let base = match side {
                OrderSide::Buy => available / current.max(1),
                OrderSide::Sell => ctx.shares_owned,
            };
            (((base as f64) * pct / 100.0).floor() as i64).max(1)
        }
        None => rng.gen_range(RANDOM_QUANTITY_RANGE),
    };

    let limit_price = resolve_limit_price(ctx, decision, side, rng).max(1);

    match side {
        OrderSide::Buy => {
            let notional = limit_price * quantity;
            if available < notional {
                tracing::debug!(
                    bot = %ctx.bot.id,
                    instrument = %ctx.instrument.id,
                    notional,
                    available,
                    "BUY rejected: insufficient balance"
                );
                return available;
            }
            push_order(ctx, side, limit_price, quantity, batch);
            // Debit now so a later instrument in this tick sees it.
            available - notional
        }
        OrderSide::Sell => {
            if ctx.shares_owned < quantity {
                tracing::debug!(
                    bot = %ctx.bot.id,
                    instrument = %ctx.instrument.id,
                    quantity,
                    shares = ctx.shares_owned,
                    "SELL rejected: insufficient shares"
                );
                return available;
            }
            push_order(ctx, side, limit_price, quantity, batch);
            available
        }
    }
}

fn resolve_limit_price<R: Rng>(
    ctx: &PairContext,
    decision: &Decision,
    side: OrderSide,
    rng: &mut R,
) -> i64 {
    let current = ctx.instrument.current_price;
    let value = decision.params.limit_price_value;

    match decision.params.limit_price_type {
        Some(LimitPriceType::AbsoluteCents) => {
            value.map(|v| v.floor() as i64).unwrap_or(current)
        }
        Some(LimitPriceType::OffsetAbsolute) => {
            current + value.map(|v| v.floor() as i64).unwrap_or(0)
        }
        Some(LimitPriceType::OffsetPct) => {
            let pct = value.unwrap_or(0.0);
            (current as f64 * (1.0 + pct / 100.0)).floor() as i64
        }
        Some(LimitPriceType::Market) => current,
        None => {
            if ctx.bot.strategy_id == "random" {
                // Coin-flip aggressive vs passive around the market price.
                let buffer = (current as f64 * RANDOM_PRICE_BUFFER_PCT).floor() as i64;
                let aggressive = rng.gen_bool(0.5);
                match (side, aggressive) {
                    (OrderSide::Buy, true) | (OrderSide::Sell, false) => current + buffer,
                    (OrderSide::Buy, false) | (OrderSide::Sell, true) => current - buffer,
                }
            } else {
                current
            }
        }
    }
}

fn push_order(
    ctx: &PairContext,
    side: OrderSide,
    limit_price: i64,
    quantity: i64,
    batch: &mut TickBatch,
) {
    tracing::debug!(
        bot = %ctx.bot.id,
        instrument = %ctx.instrument.id,
        ?side,
        limit_price,
        quantity,
        "creating order"
    );
    batch.new_orders.push(OrderInsert {
        instrument_id: ctx.instrument.id.clone(),
        bot_id: ctx.bot.id.clone(),
        side,
        limit_price,
        quantity,
        status: OrderStatus::Open,
    });
}

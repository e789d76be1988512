// Strategy rule engine: condition trees, validating parser, evaluator
pub mod evaluator;
pub mod parser;

pub use evaluator::StrategyEvaluator;
pub use parser::{parse_rule_json, parse_rule_payload, RuleParseError};

use std::collections::HashMap;

/// A single typed value exposed to the rule engine for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FactValue {
    Num(f64),
    Bool(bool),
}

impl FactValue {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            FactValue::Num(n) => Some(*n),
            FactValue::Bool(_) => None,
        }
    }
}

/// The fact map handed to the evaluator for one (bot, instrument) pass.
pub type Facts = HashMap<String, FactValue>;

/// Names of the non-indicator facts the pipeline publishes. The parser
/// allow-lists these plus anything that parses as an indicator key.
pub const BASE_FACTS: &[&str] = &[
    "currentPrice",
    "previousPrice",
    "isPriceUp",
    "isPriceDown",
    "lastMinuteAverage",
    "hasPosition",
    "openOrderCount",
    "priceVolatility",
    "percentPriceChange",
    "availableBalance",
    "sharesOwned",
    "randomChance",
    "orderPrice",
    "orderAge",
    "orderDeviation",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    LessThan,
    GreaterThan,
    Equal,
    Between,
    NotBetween,
    RandomChance,
}

impl Operator {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "lessThan" => Some(Operator::LessThan),
            "greaterThan" => Some(Operator::GreaterThan),
            "equal" => Some(Operator::Equal),
            "between" => Some(Operator::Between),
            "notBetween" => Some(Operator::NotBetween),
            "randomChance" => Some(Operator::RandomChance),
            _ => None,
        }
    }
}

/// Right-hand side of a leaf condition. `equal` accepts a fact reference;
/// the ordering operators require numeric literals.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Number(f64),
    Bool(bool),
    FactRef(String),
}

/// One leaf comparison against the fact map.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub fact: String,
    pub operator: Operator,
    pub value: Option<ConditionValue>,
    /// Inclusive bounds for between / notBetween.
    pub value_min: Option<f64>,
    pub value_max: Option<f64>,
    /// Percentage for randomChance (0..=100).
    pub random_probability: Option<f64>,
}

/// Nested boolean combinator tree over leaf conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTree {
    All(Vec<ConditionTree>),
    Any(Vec<ConditionTree>),
    Not(Box<ConditionTree>),
    Leaf(Condition),
}

impl ConditionTree {
    /// Collect every fact name the tree reads, including fact references on
    /// the value side of `equal` leaves. Used to discover which indicator
    /// keys a strategy actually needs.
    pub fn referenced_facts(&self, out: &mut Vec<String>) {
        match self {
            ConditionTree::All(children) | ConditionTree::Any(children) => {
                for child in children {
                    child.referenced_facts(out);
                }
            }
            ConditionTree::Not(child) => child.referenced_facts(out),
            ConditionTree::Leaf(cond) => {
                if !out.contains(&cond.fact) {
                    out.push(cond.fact.clone());
                }
                if let Some(ConditionValue::FactRef(name)) = &cond.value {
                    if !out.contains(name) {
                        out.push(name.clone());
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Buy,
    Sell,
    Cancel,
}

impl EventType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "BUY" => Some(EventType::Buy),
            "SELL" => Some(EventType::Sell),
            "CANCEL" => Some(EventType::Cancel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPriceType {
    AbsoluteCents,
    OffsetAbsolute,
    OffsetPct,
    Market,
}

impl LimitPriceType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "absoluteCents" => Some(LimitPriceType::AbsoluteCents),
            "offsetAbsolute" => Some(LimitPriceType::OffsetAbsolute),
            "offsetPct" => Some(LimitPriceType::OffsetPct),
            "market" => Some(LimitPriceType::Market),
            _ => None,
        }
    }
}

/// Sizing and pricing hints carried on a rule's event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventParams {
    pub size_pct: Option<f64>,
    pub limit_price_type: Option<LimitPriceType>,
    pub limit_price_value: Option<f64>,
}

/// A validated rule. `priority` is caller-supplied metadata; the evaluator
/// never sorts on it; encounter order decides ties.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub priority: i64,
    pub conditions: ConditionTree,
    pub event: EventType,
    pub params: EventParams,
}

/// The single action produced by evaluating a strategy against facts.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub event: EventType,
    pub params: EventParams,
}

use serde_json::Value;

use super::parser::{parse_rule_payload, RuleParseError};
use super::{
    Condition, ConditionTree, ConditionValue, Decision, FactValue, Facts, Operator, Rule,
};
use crate::indicators::parse_indicator_key;

/// Evaluates a validated rule list against a fact map.
///
/// Rules are held immutably in the order they were parsed. The first rule
/// whose condition tree matches wins; the `priority` field is advisory
/// metadata from the caller and is never used to re-sort. Evaluation is
/// pure: no side effects, and unknown facts simply make their
/// leaf false.
pub struct StrategyEvaluator {
    rules: Vec<Rule>,
}

impl StrategyEvaluator {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Build an evaluator straight from a wire payload (JSON string, single
    /// rule object, or array). Fails only on malformed JSON text.
    pub fn from_payload(payload: &Value) -> Result<Self, RuleParseError> {
        Ok(Self::new(parse_rule_payload(payload)?))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The indicator keys this rule set references, discovered by walking
    /// every condition tree once. The pipeline computes exactly these.
    pub fn indicator_keys(&self) -> Vec<String> {
        let mut facts = Vec::new();
        for rule in &self.rules {
            rule.conditions.referenced_facts(&mut facts);
        }
        facts
            .into_iter()
            .filter(|name| parse_indicator_key(name).is_some())
            .collect()
    }

    /// Return the event of the first rule (in encounter order) whose
    /// condition tree evaluates true, or `None` if nothing matches.
    pub fn evaluate(&self, facts: &Facts) -> Option<Decision> {
        for rule in &self.rules {
            if eval_tree(&rule.conditions, facts) {
                return Some(Decision {
                    event: rule.event,
                    params: rule.params.clone(),
                });
            }
        }
        None
    }
}

fn eval_tree(tree: &ConditionTree, facts: &Facts) -> bool {
    match tree {
        ConditionTree::All(children) => children.iter().all(|c| eval_tree(c, facts)),
        ConditionTree::Any(children) => children.iter().any(|c| eval_tree(c, facts)),
        ConditionTree::Not(child) => !eval_tree(child, facts),
        ConditionTree::Leaf(cond) => eval_leaf(cond, facts),
    }
}

fn eval_leaf(cond: &Condition, facts: &Facts) -> bool {
    let Some(actual) = facts.get(&cond.fact) else {
        return false;
    };

    match cond.operator {
        Operator::LessThan => compare_numeric(cond, actual, |a, b| a < b),
        Operator::GreaterThan => compare_numeric(cond, actual, |a, b| a > b),
        Operator::Equal => match &cond.value {
            Some(ConditionValue::Number(expected)) => actual.as_num() == Some(*expected),
            Some(ConditionValue::Bool(expected)) => {
                matches!(actual, FactValue::Bool(b) if b == expected)
            }
            Some(ConditionValue::FactRef(name)) => facts
                .get(name)
                .map(|other| fact_values_equal(actual, other))
                .unwrap_or(false),
            None => false,
        },
        Operator::Between => in_range(cond, actual).unwrap_or(false),
        Operator::NotBetween => in_range(cond, actual).map(|inside| !inside).unwrap_or(false),
        // True with probability p/100: the per-evaluation random draw
        // (uniform in [0, 100)) sits in the fact map, compared with
        // lessThan semantics against the configured probability.
        Operator::RandomChance => match (actual.as_num(), cond.random_probability) {
            (Some(draw), Some(p)) => draw < p,
            _ => false,
        },
    }
}

fn compare_numeric(cond: &Condition, actual: &FactValue, op: fn(f64, f64) -> bool) -> bool {
    match (&cond.value, actual.as_num()) {
        (Some(ConditionValue::Number(expected)), Some(a)) => op(a, *expected),
        _ => false,
    }
}

fn in_range(cond: &Condition, actual: &FactValue) -> Option<bool> {
    let a = actual.as_num()?;
    let min = cond.value_min?;
    let max = cond.value_max?;
    Some(a >= min && a <= max)
}

fn fact_values_equal(a: &FactValue, b: &FactValue) -> bool {
    match (a, b) {
        (FactValue::Num(x), FactValue::Num(y)) => x == y,
        (FactValue::Bool(x), FactValue::Bool(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{EventParams, EventType};
    use serde_json::json;

    fn facts(entries: &[(&str, FactValue)]) -> Facts {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    fn evaluator(payload: serde_json::Value) -> StrategyEvaluator {
        StrategyEvaluator::from_payload(&payload).unwrap()
    }

    #[test]
    fn test_empty_rule_list_returns_none() {
        let evaluator = StrategyEvaluator::new(Vec::new());
        assert_eq!(evaluator.evaluate(&Facts::new()), None);
    }

    #[test]
    fn test_first_match_wins_regardless_of_priority() {
        let evaluator = evaluator(json!([
            {
                "priority": 99,
                "conditions": {"all": [
                    {"fact": "isPriceUp", "operator": "equal", "value": true}
                ]},
                "event": {"type": "BUY"}
            },
            {
                "priority": 1,
                "conditions": {"all": [
                    {"fact": "isPriceUp", "operator": "equal", "value": true}
                ]},
                "event": {"type": "SELL"}
            }
        ]));

        let facts = facts(&[("isPriceUp", FactValue::Bool(true))]);
        let decision = evaluator.evaluate(&facts).unwrap();
        assert_eq!(decision.event, EventType::Buy);
    }

    #[test]
    fn test_unknown_fact_makes_leaf_false() {
        let evaluator = evaluator(json!({
            "conditions": {"all": [
                {"fact": "lastMinuteAverage", "operator": "greaterThan", "value": 0}
            ]},
            "event": {"type": "BUY"}
        }));

        assert_eq!(evaluator.evaluate(&Facts::new()), None);
    }

    #[test]
    fn test_between_is_inclusive_and_not_between_negates() {
        let evaluator = evaluator(json!({
            "conditions": {"all": [
                {"fact": "rsi:14", "operator": "between", "valueMin": 30, "valueMax": 70}
            ]},
            "event": {"type": "BUY"}
        }));
        let negated = StrategyEvaluator::from_payload(&json!({
            "conditions": {"all": [
                {"fact": "rsi:14", "operator": "notBetween", "valueMin": 30, "valueMax": 70}
            ]},
            "event": {"type": "BUY"}
        }))
        .unwrap();

        for sample in [29.999, 30.0, 50.0, 70.0, 70.001] {
            let f = facts(&[("rsi:14", FactValue::Num(sample))]);
            let inside = evaluator.evaluate(&f).is_some();
            let outside = negated.evaluate(&f).is_some();
            assert_ne!(inside, outside, "sample {sample}");
        }

        let at_min = facts(&[("rsi:14", FactValue::Num(30.0))]);
        assert!(evaluator.evaluate(&at_min).is_some());
        let at_max = facts(&[("rsi:14", FactValue::Num(70.0))]);
        assert!(evaluator.evaluate(&at_max).is_some());
    }

    #[test]
    fn test_any_and_not_combinators() {
        let evaluator = evaluator(json!({
            "conditions": {"any": [
                {"fact": "isPriceDown", "operator": "equal", "value": true},
                {"not": {"fact": "hasPosition", "operator": "equal", "value": true}}
            ]},
            "event": {"type": "BUY"}
        }));

        // isPriceDown false, hasPosition true → both branches false
        let f = facts(&[
            ("isPriceDown", FactValue::Bool(false)),
            ("hasPosition", FactValue::Bool(true)),
        ]);
        assert_eq!(evaluator.evaluate(&f), None);

        // hasPosition false → not-branch true
        let f = facts(&[
            ("isPriceDown", FactValue::Bool(false)),
            ("hasPosition", FactValue::Bool(false)),
        ]);
        assert!(evaluator.evaluate(&f).is_some());
    }

    #[test]
    fn test_equal_against_fact_reference() {
        let evaluator = evaluator(json!({
            "conditions": {"all": [
                {"fact": "currentPrice", "operator": "equal", "value": "ma:20"}
            ]},
            "event": {"type": "SELL"}
        }));

        let equal = facts(&[
            ("currentPrice", FactValue::Num(105.0)),
            ("ma:20", FactValue::Num(105.0)),
        ]);
        assert!(evaluator.evaluate(&equal).is_some());

        let unequal = facts(&[
            ("currentPrice", FactValue::Num(105.0)),
            ("ma:20", FactValue::Num(104.0)),
        ]);
        assert_eq!(evaluator.evaluate(&unequal), None);
    }

    #[test]
    fn test_random_chance_thresholds() {
        let evaluator = evaluator(json!({
            "conditions": {"all": [
                {"fact": "randomChance", "operator": "randomChance", "randomProbability": 25}
            ]},
            "event": {"type": "BUY"}
        }));

        let below = facts(&[("randomChance", FactValue::Num(24.9))]);
        assert!(evaluator.evaluate(&below).is_some());

        let at = facts(&[("randomChance", FactValue::Num(25.0))]);
        assert_eq!(evaluator.evaluate(&at), None);
    }

    #[test]
    fn test_indicator_keys_discovered_from_trees() {
        let evaluator = evaluator(json!([
            {
                "conditions": {"all": [
                    {"fact": "rsi:14", "operator": "lessThan", "value": 30},
                    {"fact": "isPriceUp", "operator": "equal", "value": true}
                ]},
                "event": {"type": "BUY"}
            },
            {
                "conditions": {"all": [
                    {"fact": "currentPrice", "operator": "equal", "value": "supertrend:10:3"}
                ]},
                "event": {"type": "SELL"}
            }
        ]));

        let keys = evaluator.indicator_keys();
        assert_eq!(
            keys,
            vec!["rsi:14".to_string(), "supertrend:10:3".to_string()]
        );
    }

    #[test]
    fn test_decision_carries_event_params() {
        let evaluator = evaluator(json!({
            "conditions": {"all": [
                {"fact": "isPriceUp", "operator": "equal", "value": true}
            ]},
            "event": {"type": "BUY", "params": {"sizePct": 25, "limitPriceType": "market"}}
        }));

        let f = facts(&[("isPriceUp", FactValue::Bool(true))]);
        let decision = evaluator.evaluate(&f).unwrap();
        assert_eq!(decision.params.size_pct, Some(25.0));
        assert_ne!(decision.params, EventParams::default());
    }
}

use serde_json::Value;
use thiserror::Error;

use crate::indicators::parse_indicator_key;

use super::{
    Condition, ConditionTree, ConditionValue, EventParams, EventType, LimitPriceType, Operator,
    Rule, BASE_FACTS,
};

/// Parse-time failures reported synchronously to the caller. Individually
/// invalid rules never reach this error path; they are dropped with a
/// warning so a good rule among bad ones keeps its bot operating.
#[derive(Debug, Error)]
pub enum RuleParseError {
    #[error("malformed rule set JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

/// Parse a rule-set payload from raw JSON text. Malformed JSON fails the
/// whole parse; anything else is best-effort.
pub fn parse_rule_json(text: &str) -> Result<Vec<Rule>, RuleParseError> {
    let value: Value = serde_json::from_str(text)?;
    Ok(parse_rule_values(&value))
}

/// Parse a rule-set payload that may be a JSON string, a single rule
/// object, or an array of rules. This is the only place untyped JSON is
/// interpreted; everything past it works on validated `Rule` values.
pub fn parse_rule_payload(payload: &Value) -> Result<Vec<Rule>, RuleParseError> {
    match payload {
        Value::String(text) => parse_rule_json(text),
        other => Ok(parse_rule_values(other)),
    }
}

fn parse_rule_values(value: &Value) -> Vec<Rule> {
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => {
            tracing::warn!("rule set payload is neither an object nor an array");
            return Vec::new();
        }
    };

    let mut rules = Vec::with_capacity(candidates.len());
    for (index, candidate) in candidates.iter().enumerate() {
        match parse_rule(candidate) {
            Some(rule) => rules.push(rule),
            None => tracing::warn!(index, "dropping invalid rule from rule set"),
        }
    }
    rules
}

fn parse_rule(value: &Value) -> Option<Rule> {
    let obj = value.as_object()?;
    let priority = obj.get("priority").and_then(Value::as_i64).unwrap_or(0);
    let conditions = parse_condition(obj.get("conditions")?)?;

    let event = obj.get("event")?.as_object()?;
    let event_type = EventType::parse(event.get("type")?.as_str()?)?;
    let params = event
        .get("params")
        .map(parse_event_params)
        .unwrap_or_default();

    Some(Rule {
        priority,
        conditions,
        event: event_type,
        params,
    })
}

fn parse_condition(value: &Value) -> Option<ConditionTree> {
    let obj = value.as_object()?;

    if let Some(children) = obj.get("all") {
        return Some(ConditionTree::All(parse_children(children)?));
    }
    if let Some(children) = obj.get("any") {
        return Some(ConditionTree::Any(parse_children(children)?));
    }
    if let Some(negated) = obj.get("not") {
        // A `not` over several children negates the implicit `all` group.
        let child = match negated {
            Value::Array(items) if items.len() == 1 => parse_condition(&items[0])?,
            Value::Array(_) => ConditionTree::All(parse_children(negated)?),
            single => parse_condition(single)?,
        };
        return Some(ConditionTree::Not(Box::new(child)));
    }

    parse_leaf(value).map(ConditionTree::Leaf)
}

fn parse_children(value: &Value) -> Option<Vec<ConditionTree>> {
    let items = value.as_array()?;
    let mut children = Vec::with_capacity(items.len());
    for item in items {
        children.push(parse_condition(item)?);
    }
    Some(children)
}

fn parse_leaf(value: &Value) -> Option<Condition> {
    let obj = value.as_object()?;

    let fact = obj.get("fact")?.as_str()?;
    if !is_valid_fact(fact) {
        return None;
    }
    let operator = Operator::parse(obj.get("operator")?.as_str()?)?;

    let mut condition = Condition {
        fact: fact.to_string(),
        operator,
        value: None,
        value_min: None,
        value_max: None,
        random_probability: None,
    };

    match operator {
        Operator::Between | Operator::NotBetween => {
            condition.value_min = Some(obj.get("valueMin")?.as_f64()?);
            condition.value_max = Some(obj.get("valueMax")?.as_f64()?);
        }
        Operator::RandomChance => {
            let p = obj.get("randomProbability")?.as_f64()?;
            if !p.is_finite() {
                return None;
            }
            condition.random_probability = Some(p);
        }
        Operator::Equal => {
            condition.value = Some(match obj.get("value")? {
                Value::Number(n) => ConditionValue::Number(n.as_f64()?),
                Value::Bool(b) => ConditionValue::Bool(*b),
                // A string value names another fact to compare against.
                Value::String(name) if is_valid_fact(name) => {
                    ConditionValue::FactRef(name.clone())
                }
                _ => return None,
            });
        }
        Operator::LessThan | Operator::GreaterThan => {
            condition.value = Some(ConditionValue::Number(obj.get("value")?.as_f64()?));
        }
    }

    Some(condition)
}

fn parse_event_params(value: &Value) -> EventParams {
    let mut params = EventParams::default();
    let Some(obj) = value.as_object() else {
        return params;
    };

    params.size_pct = obj.get("sizePct").and_then(Value::as_f64);
    params.limit_price_value = obj.get("limitPriceValue").and_then(Value::as_f64);
    if let Some(raw) = obj.get("limitPriceType").and_then(Value::as_str) {
        match LimitPriceType::parse(raw) {
            Some(kind) => params.limit_price_type = Some(kind),
            None => tracing::warn!(limit_price_type = raw, "ignoring unknown limitPriceType"),
        }
    }
    params
}

fn is_valid_fact(name: &str) -> bool {
    BASE_FACTS.contains(&name) || parse_indicator_key(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_array_of_rules() {
        let payload = json!([
            {
                "priority": 1,
                "conditions": {"all": [
                    {"fact": "isPriceUp", "operator": "equal", "value": true}
                ]},
                "event": {"type": "BUY", "params": {"sizePct": 50}}
            },
            {
                "priority": 2,
                "conditions": {"any": [
                    {"fact": "rsi:14", "operator": "greaterThan", "value": 70}
                ]},
                "event": {"type": "SELL"}
            }
        ]);

        let rules = parse_rule_payload(&payload).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].event, EventType::Buy);
        assert_eq!(rules[0].params.size_pct, Some(50.0));
        assert_eq!(rules[1].event, EventType::Sell);
    }

    #[test]
    fn test_parse_single_object_and_string_payloads() {
        let single = json!({
            "conditions": {"all": [
                {"fact": "hasPosition", "operator": "equal", "value": false}
            ]},
            "event": {"type": "BUY"}
        });
        assert_eq!(parse_rule_payload(&single).unwrap().len(), 1);

        let as_string = Value::String(single.to_string());
        assert_eq!(parse_rule_payload(&as_string).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_json_string_fails() {
        let payload = Value::String("{not json".to_string());
        assert!(matches!(
            parse_rule_payload(&payload),
            Err(RuleParseError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_invalid_rules_dropped_individually() {
        let payload = json!([
            {
                "conditions": {"all": [
                    {"fact": "notAThing", "operator": "equal", "value": 1}
                ]},
                "event": {"type": "BUY"}
            },
            {
                "conditions": {"all": [
                    {"fact": "currentPrice", "operator": "contains", "value": 1}
                ]},
                "event": {"type": "BUY"}
            },
            {
                "conditions": {"all": [
                    {"fact": "currentPrice", "operator": "greaterThan", "value": 100}
                ]},
                "event": {"type": "HOLD"}
            },
            {
                "conditions": {"all": [
                    {"fact": "currentPrice", "operator": "greaterThan", "value": 100}
                ]},
                "event": {"type": "SELL"}
            }
        ]);

        let rules = parse_rule_payload(&payload).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].event, EventType::Sell);
    }

    #[test]
    fn test_between_requires_both_bounds() {
        let missing_max = json!({
            "conditions": {"all": [
                {"fact": "rsi", "operator": "between", "valueMin": 30}
            ]},
            "event": {"type": "BUY"}
        });
        assert!(parse_rule_payload(&missing_max).unwrap().is_empty());
    }

    #[test]
    fn test_not_with_multiple_children_wraps_all() {
        let payload = json!({
            "conditions": {"not": [
                {"fact": "isPriceUp", "operator": "equal", "value": true},
                {"fact": "isPriceDown", "operator": "equal", "value": true}
            ]},
            "event": {"type": "CANCEL"}
        });

        let rules = parse_rule_payload(&payload).unwrap();
        assert_eq!(rules.len(), 1);
        match &rules[0].conditions {
            ConditionTree::Not(inner) => match inner.as_ref() {
                ConditionTree::All(children) => assert_eq!(children.len(), 2),
                other => panic!("expected implicit all group, got {other:?}"),
            },
            other => panic!("expected not node, got {other:?}"),
        }
    }

    #[test]
    fn test_equal_accepts_fact_reference_value() {
        let payload = json!({
            "conditions": {"all": [
                {"fact": "currentPrice", "operator": "equal", "value": "ma:20"}
            ]},
            "event": {"type": "SELL"}
        });

        let rules = parse_rule_payload(&payload).unwrap();
        assert_eq!(rules.len(), 1);

        // The ordering operators only take numeric literals
        let bad = json!({
            "conditions": {"all": [
                {"fact": "currentPrice", "operator": "lessThan", "value": "ma:20"}
            ]},
            "event": {"type": "SELL"}
        });
        assert!(parse_rule_payload(&bad).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_limit_price_type_ignored_but_rule_kept() {
        let payload = json!({
            "conditions": {"all": [
                {"fact": "isPriceUp", "operator": "equal", "value": true}
            ]},
            "event": {"type": "BUY", "params": {"limitPriceType": "telepathy"}}
        });

        let rules = parse_rule_payload(&payload).unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[0].params.limit_price_type.is_none());
    }
}

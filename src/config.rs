//! JSON configuration for stat trees.
//!
//! Numbers become number stats, strings text stats, arrays of strings
//! trait sets and objects branches. Inside a branch the `"*"` key declares
//! the wildcard template. An object with a `"$type"` key builds a typed stat
//! from its remaining fields:
//!
//! ```json
//! {
//!   "strength": 12,
//!   "hp": { "$type": "pool", "base": 30, "reserveFactor": 0.5 },
//!   "skills": { "*": { "rank": 0, "xp": 0 } },
//!   "power": { "$type": "compound", "op": "average", "stats": ["strength", "hp"] }
//! }
//! ```

use crate::alignometer::{AlignometerOptions, HistoryAlignometer};
use crate::compound::{CompoundOp, CompoundStat};
use crate::error::StatError;
use crate::history::{HistoryGauge, HistoryOptions};
use crate::pool::{Gauge, GaugeOptions, Pool, PoolOptions};
use crate::stat::Stat;
use crate::tree::{NestedStats, StatNode, WILDCARD};
use crate::value::StatValue;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key selecting a typed stat inside an object.
pub const TYPE_KEY: &str = "$type";

/// Fields of a `"$type": "compound"` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundOptions {
    pub op: CompoundOp,
    pub stats: Vec<String>,
}

/// Build a tree node from its JSON form.
pub fn node_from_json(value: &Value) -> Result<StatNode, StatError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(StatNode::from)
            .ok_or_else(|| StatError::InvalidConfig(format!("unrepresentable number {}", n))),
        Value::String(s) => Ok(StatNode::from(s.as_str())),
        Value::Array(_) => {
            let traits: StatValue = serde_json::from_value(value.clone())?;
            match traits {
                StatValue::Traits(_) => Ok(StatNode::from(traits)),
                _ => Err(StatError::InvalidConfig(format!(
                    "arrays must hold trait names, got {}",
                    value
                ))),
            }
        }
        Value::Object(fields) => match fields.get(TYPE_KEY) {
            Some(Value::String(kind)) => typed_stat(kind, value).map(StatNode::Stat),
            Some(other) => Err(StatError::InvalidConfig(format!(
                "{} must be a string, got {}",
                TYPE_KEY, other
            ))),
            None => nested_from_json(fields).map(StatNode::Nested),
        },
        Value::Bool(_) | Value::Null => Err(StatError::InvalidConfig(format!(
            "cannot build a stat from {}",
            value
        ))),
    }
}

fn nested_from_json(fields: &Map<String, Value>) -> Result<NestedStats, StatError> {
    let mut nested = NestedStats::new();
    for (key, child) in fields {
        let node = node_from_json(child)?;
        if key == WILDCARD {
            nested.set_wildcard(Some(node));
        } else {
            nested.insert(key, node);
        }
    }
    Ok(nested)
}

fn options<T: DeserializeOwned>(value: &Value) -> Result<T, StatError> {
    Ok(serde_json::from_value(value.clone())?)
}

fn typed_stat(kind: &str, value: &Value) -> Result<Stat, StatError> {
    let stat = match kind {
        "pool" => Stat::from(Pool::from_options(options::<PoolOptions>(value)?)),
        "gauge" => Stat::from(Gauge::from_options(options::<GaugeOptions>(value)?)),
        "history" => Stat::from(HistoryGauge::from_options(options::<HistoryOptions>(value)?)),
        "alignometer" => Stat::from(HistoryAlignometer::from_options(
            options::<AlignometerOptions>(value)?,
        )),
        "compound" => {
            let compound: CompoundOptions = options(value)?;
            Stat::from(CompoundStat::named(compound.op, compound.stats))
        }
        other => {
            return Err(StatError::InvalidConfig(format!("unknown stat type {}", other)));
        }
    };
    Ok(stat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::StatPath;
    use crate::stat::StatKind;
    use serde_json::json;

    fn root(value: Value) -> NestedStats {
        match node_from_json(&value).unwrap() {
            StatNode::Nested(nested) => nested,
            StatNode::Stat(_) => panic!("expected a branch"),
        }
    }

    #[test]
    fn test_plain_values() {
        let tree = root(json!({
            "str": 12,
            "name": "Aria",
            "traits": ["brave", "tall"],
            "hp": { "max": 30 }
        }));
        let kind = |p: &str| {
            tree.locate(&StatPath::new(p))
                .and_then(|l| l.node.as_stat())
                .map(|s| s.kind().name())
        };
        assert_eq!(kind("str"), Some("number"));
        assert_eq!(kind("name"), Some("text"));
        assert_eq!(kind("traits"), Some("traits"));
        assert_eq!(kind("hp.max"), Some("number"));
    }

    #[test]
    fn test_wildcard_and_typed_stats() {
        let tree = root(json!({
            "skills": { "*": { "rank": 0 } },
            "mana": { "$type": "pool", "base": 20, "reserveFactor": 0.5 },
            "karma": { "$type": "alignometer", "minWeight": 2 },
            "power": { "$type": "compound", "op": "plus", "stats": ["mana"] }
        }));
        let skills = tree.get("skills").and_then(StatNode::as_nested).unwrap();
        assert!(skills.is_wild());
        let mana = tree.get("mana").and_then(StatNode::as_stat).unwrap();
        match mana.kind() {
            StatKind::Pool(pool) => assert_eq!(pool.reserve_factor(), 0.5),
            other => panic!("expected a pool, got {:?}", other),
        }
        let power = tree.get("power").and_then(StatNode::as_stat).unwrap();
        assert_eq!(power.kind().name(), "compound");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            node_from_json(&json!({ "x": true })),
            Err(StatError::InvalidConfig(_))
        ));
        assert!(matches!(
            node_from_json(&json!({ "x": [1, 2] })),
            Err(StatError::InvalidConfig(_))
        ));
        assert!(matches!(
            node_from_json(&json!({ "x": { "$type": "dragon" } })),
            Err(StatError::InvalidConfig(_))
        ));
        assert!(matches!(
            node_from_json(&json!({ "x": { "$type": "compound", "op": "average" } })),
            Err(StatError::InvalidConfig(_))
        ));
    }
}

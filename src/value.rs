//! Stat value types.
//!
//! Stats hold numbers, strings or sets of traits. `StatValue` is the
//! common carrier used for bases, actuals and modifier operands, and
//! `OperandType` is the declared type operators and stats agree on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Tolerance used when comparing floating point stat values.
pub const EPSILON: f64 = 1e-9;

/// A value held by a stat or carried by a modifier.
///
/// Deserializes untagged from JSON: numbers become `Number`, strings become
/// `Text`, arrays of strings become `Traits`.
///
/// # Examples
///
/// ```rust
/// use statstack::StatValue;
///
/// let n: StatValue = 12.0.into();
/// assert_eq!(n.as_number(), Some(12.0));
///
/// let t: StatValue = serde_json::from_str(r#"["brave", "tall"]"#).unwrap();
/// assert!(t.as_traits().unwrap().contains("tall"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Numeric value.
    Number(f64),
    /// Free-form text.
    Text(String),
    /// Unordered set of trait names.
    Traits(BTreeSet<String>),
}

/// Declared type of a stat's values or of an operator's operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperandType {
    Number,
    Text,
    Traits,
    /// Type-agnostic: accepted by every stat.
    Any,
}

impl OperandType {
    /// Whether an operator declaring `self` may act on a stat declaring `stat`.
    pub fn accepts(self, stat: OperandType) -> bool {
        self == OperandType::Any || stat == OperandType::Any || self == stat
    }
}

impl StatValue {
    /// The declared type of this value.
    pub fn operand_type(&self) -> OperandType {
        match self {
            StatValue::Number(_) => OperandType::Number,
            StatValue::Text(_) => OperandType::Text,
            StatValue::Traits(_) => OperandType::Traits,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            StatValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StatValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_traits(&self) -> Option<&BTreeSet<String>> {
        match self {
            StatValue::Traits(t) => Some(t),
            _ => None,
        }
    }

    /// Numeric view used by stats that must stay numeric; non-numbers read as zero.
    pub fn to_f64(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    /// Build a traits value from anything yielding names.
    pub fn traits<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StatValue::Traits(names.into_iter().map(Into::into).collect())
    }

    /// Whether two values are equal, tolerating float noise on numbers.
    pub fn approx_eq(&self, other: &StatValue) -> bool {
        match (self, other) {
            (StatValue::Number(a), StatValue::Number(b)) => (a - b).abs() <= EPSILON,
            _ => self == other,
        }
    }
}

impl Default for StatValue {
    fn default() -> Self {
        StatValue::Number(0.0)
    }
}

impl From<f64> for StatValue {
    fn from(n: f64) -> Self {
        StatValue::Number(n)
    }
}

impl From<i32> for StatValue {
    fn from(n: i32) -> Self {
        StatValue::Number(f64::from(n))
    }
}

impl From<&str> for StatValue {
    fn from(s: &str) -> Self {
        StatValue::Text(s.to_string())
    }
}

impl From<String> for StatValue {
    fn from(s: String) -> Self {
        StatValue::Text(s)
    }
}

impl From<BTreeSet<String>> for StatValue {
    fn from(t: BTreeSet<String>) -> Self {
        StatValue::Traits(t)
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Number(n) => write!(f, "{}", n),
            StatValue::Text(s) => write!(f, "{:?}", s),
            StatValue::Traits(t) => {
                let names: Vec<&str> = t.iter().map(String::as_str).collect();
                write!(f, "[{}]", names.join(", "))
            }
        }
    }
}

/// Rounding applied to resource readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rounding {
    #[default]
    None,
    Round,
    Ceil,
    Floor,
}

impl Rounding {
    /// Round `value`, nudging by [`EPSILON`] so values that should be exact
    /// halves or integers are not lost to float truncation.
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Rounding::None => value,
            Rounding::Round => (value + EPSILON).round(),
            Rounding::Ceil => (value - EPSILON).ceil(),
            Rounding::Floor => (value + EPSILON).floor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_json() {
        let n: StatValue = serde_json::from_str("5").unwrap();
        assert_eq!(n, StatValue::Number(5.0));
        let s: StatValue = serde_json::from_str("\"sword\"").unwrap();
        assert_eq!(s, StatValue::Text("sword".into()));
        let t: StatValue = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(t, StatValue::traits(["a", "b"]));
    }

    #[test]
    fn test_operand_type_accepts() {
        assert!(OperandType::Any.accepts(OperandType::Text));
        assert!(OperandType::Number.accepts(OperandType::Number));
        assert!(!OperandType::Number.accepts(OperandType::Text));
    }

    #[test]
    fn test_rounding_counteracts_truncation() {
        // 0.1 * 3 = 0.30000000000000004
        assert_eq!(Rounding::Ceil.apply(0.1 * 3.0 * 10.0), 3.0);
        assert_eq!(Rounding::Floor.apply(2.9999999999999996), 3.0);
        assert_eq!(Rounding::Round.apply(2.4999999999999996), 3.0);
        assert_eq!(Rounding::None.apply(2.5), 2.5);
    }
}

//! Stat breakdown module.
//!
//! Contains the `Breakdown` type returned by `StatsTable::explain`: the
//! base a stat started from, every modifier applied to it in order, and
//! the resulting value.

use crate::path::StatPath;
use crate::value::StatValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stat's value together with how it was reached.
///
/// For resource stats the steps build the modified maximum and `value` is
/// the current reading. For compound stats `start` is the derived value the
/// modifiers were folded over.
///
/// # Examples
///
/// ```rust
/// use statstack::{ModifiersTable, StatsTable, StatValue};
/// use serde_json::json;
///
/// let mut stats = StatsTable::from_json(&json!({ "atk": 50 })).unwrap();
/// let mut sword = ModifiersTable::new("sword");
/// sword.set_stat_modifier("atk", ("*", 1.5)).unwrap();
/// stats.stack(sword).unwrap();
///
/// let breakdown = stats.explain("atk").unwrap();
/// assert_eq!(breakdown.base, StatValue::Number(50.0));
/// assert_eq!(breakdown.steps.len(), 1);
/// assert_eq!(breakdown.value, StatValue::Number(75.0));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Breakdown {
    /// The stat that was explained.
    pub path: StatPath,

    /// The unmodified base value.
    pub base: StatValue,

    /// The value the modifiers were folded over.
    pub start: StatValue,

    /// `(description, value after the step)` for every applied modifier.
    pub steps: Vec<(String, StatValue)>,

    /// The final value.
    pub value: StatValue,
}

impl Breakdown {
    pub fn new(path: StatPath, base: StatValue, start: StatValue) -> Self {
        Self {
            path,
            value: start.clone(),
            base,
            start,
            steps: Vec::new(),
        }
    }

    pub fn add_step(&mut self, description: impl Into<String>, value: StatValue) {
        self.steps.push((description.into(), value));
    }
}

impl fmt::Display for Breakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} (base {}", self.path, self.value, self.base)?;
        for (description, value) in &self.steps {
            write!(f, "; {} -> {}", description, value)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdown_steps() {
        let mut breakdown = Breakdown::new(StatPath::new("atk"), 50.0.into(), 50.0.into());
        assert_eq!(breakdown.value, StatValue::Number(50.0));
        breakdown.add_step("+10.00 [ring]", 60.0.into());
        breakdown.add_step("×1.50 [sword]", 90.0.into());
        breakdown.value = 90.0.into();

        assert_eq!(breakdown.steps[0].0, "+10.00 [ring]");
        assert_eq!(
            breakdown.to_string(),
            "atk = 90 (base 50; +10.00 [ring] -> 60; ×1.50 [sword] -> 90)"
        );
    }
}

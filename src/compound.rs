//! Derived stats.
//!
//! A `CompoundStat` stores no base of its own. Its base and actual values
//! are computed on every read from sibling stats, either with a named
//! aggregate over a list of siblings or with host-supplied functions. The
//! computed actual value is still passed through the stat's own modifiers.

use crate::path::StatPath;
use crate::stat::ModifierSource;
use crate::stats_table::StatsTable;
use crate::value::StatValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Read access to the stats next to a compound stat.
///
/// Names are resolved relative to the compound's parent branch, so
/// `"str"` next to `"attributes.power"` reads `"attributes.str"`. Missing
/// stats read as the default value.
pub struct CompoundContext<'a> {
    table: &'a StatsTable,
    parent: StatPath,
}

impl<'a> CompoundContext<'a> {
    pub fn new(table: &'a StatsTable, parent: StatPath) -> Self {
        Self { table, parent }
    }

    pub fn parent(&self) -> &StatPath {
        &self.parent
    }

    pub fn base(&self, name: &str) -> StatValue {
        self.table.base(self.parent.join(name)).unwrap_or_default()
    }

    pub fn actual(&self, name: &str) -> StatValue {
        self.table.actual(self.parent.join(name)).unwrap_or_default()
    }

    /// Numeric actual value of a sibling.
    pub fn number(&self, name: &str) -> f64 {
        self.actual(name).to_f64()
    }

    /// Numeric base value of a sibling.
    pub fn base_number(&self, name: &str) -> f64 {
        self.base(name).to_f64()
    }
}

/// Function computing a compound value from its context.
pub type CompoundFn = Arc<dyn Fn(&CompoundContext<'_>) -> StatValue + Send + Sync>;

/// Builtin aggregates over a list of sibling stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompoundOp {
    Average,
    Plus,
    /// First value minus every following one.
    Minus,
    Multiply,
    Min,
    Max,
}

impl CompoundOp {
    pub fn fold(self, values: &[f64]) -> f64 {
        let Some((&first, rest)) = values.split_first() else {
            return 0.0;
        };
        match self {
            CompoundOp::Average => values.iter().sum::<f64>() / values.len() as f64,
            CompoundOp::Plus => values.iter().sum(),
            CompoundOp::Minus => rest.iter().fold(first, |acc, v| acc - v),
            CompoundOp::Multiply => values.iter().product(),
            CompoundOp::Min => rest.iter().fold(first, |acc, v| acc.min(*v)),
            CompoundOp::Max => rest.iter().fold(first, |acc, v| acc.max(*v)),
        }
    }
}

/// How a compound stat derives its values.
#[derive(Clone)]
pub enum CompoundFormula {
    /// Aggregate the named siblings.
    Named { op: CompoundOp, stats: Vec<String> },
    /// Host functions; `depends_on` names the siblings they read.
    Custom {
        base: CompoundFn,
        actual: CompoundFn,
        depends_on: Vec<String>,
    },
}

impl fmt::Debug for CompoundFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompoundFormula::Named { op, stats } => f
                .debug_struct("Named")
                .field("op", op)
                .field("stats", stats)
                .finish(),
            CompoundFormula::Custom { depends_on, .. } => f
                .debug_struct("Custom")
                .field("depends_on", depends_on)
                .finish_non_exhaustive(),
        }
    }
}

/// A stat derived from its siblings.
///
/// # Examples
///
/// ```rust
/// use statstack::{CompoundOp, CompoundStat, StatsTable};
/// use serde_json::json;
///
/// let mut stats = StatsTable::from_json(&json!({ "str": 10, "dex": 14 })).unwrap();
/// stats
///     .set_stat("power", CompoundStat::named(CompoundOp::Average, ["str", "dex"]))
///     .unwrap();
/// assert_eq!(stats.number("power").unwrap(), 12.0);
/// ```
#[derive(Debug, Clone)]
pub struct CompoundStat {
    formula: CompoundFormula,
}

impl CompoundStat {
    pub fn named<I, S>(op: CompoundOp, stats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            formula: CompoundFormula::Named {
                op,
                stats: stats.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn custom<I, S, B, A>(depends_on: I, base: B, actual: A) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        B: Fn(&CompoundContext<'_>) -> StatValue + Send + Sync + 'static,
        A: Fn(&CompoundContext<'_>) -> StatValue + Send + Sync + 'static,
    {
        Self {
            formula: CompoundFormula::Custom {
                base: Arc::new(base),
                actual: Arc::new(actual),
                depends_on: depends_on.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn formula(&self) -> &CompoundFormula {
        &self.formula
    }

    /// Sibling names this stat reads.
    pub fn dependencies(&self) -> &[String] {
        match &self.formula {
            CompoundFormula::Named { stats, .. } => stats,
            CompoundFormula::Custom { depends_on, .. } => depends_on,
        }
    }

    pub fn base(&self, ctx: &CompoundContext<'_>) -> StatValue {
        match &self.formula {
            CompoundFormula::Named { op, stats } => {
                let values: Vec<f64> = stats.iter().map(|s| ctx.base_number(s)).collect();
                StatValue::Number(op.fold(&values))
            }
            CompoundFormula::Custom { base, .. } => base(ctx),
        }
    }

    /// The value derived from the siblings' actual values, before this
    /// stat's own modifiers.
    pub fn derived(&self, ctx: &CompoundContext<'_>) -> StatValue {
        match &self.formula {
            CompoundFormula::Named { op, stats } => {
                let values: Vec<f64> = stats.iter().map(|s| ctx.number(s)).collect();
                StatValue::Number(op.fold(&values))
            }
            CompoundFormula::Custom { actual, .. } => actual(ctx),
        }
    }

    /// Derived value with this stat's own modifiers applied on top.
    pub fn actual(&self, ctx: &CompoundContext<'_>, mods: &dyn ModifierSource) -> StatValue {
        let derived = self.derived(ctx);
        let base = self.base(ctx);
        let operand_type = derived.operand_type();
        mods.compute_modifiers(derived, &base, operand_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_ops() {
        let values = [10.0, 4.0, 1.0];
        assert_eq!(CompoundOp::Average.fold(&values), 5.0);
        assert_eq!(CompoundOp::Plus.fold(&values), 15.0);
        assert_eq!(CompoundOp::Minus.fold(&values), 5.0);
        assert_eq!(CompoundOp::Multiply.fold(&values), 40.0);
        assert_eq!(CompoundOp::Min.fold(&values), 1.0);
        assert_eq!(CompoundOp::Max.fold(&values), 10.0);
        assert_eq!(CompoundOp::Average.fold(&[]), 0.0);
    }

    #[test]
    fn test_dependencies() {
        let named = CompoundStat::named(CompoundOp::Plus, ["a", "b"]);
        assert_eq!(named.dependencies(), ["a".to_string(), "b".to_string()]);

        let custom = CompoundStat::custom(
            ["hp.max"],
            |ctx| StatValue::Number(ctx.base_number("hp.max") / 2.0),
            |ctx| StatValue::Number(ctx.number("hp.max") / 2.0),
        );
        assert_eq!(custom.dependencies(), ["hp.max".to_string()]);
        assert!(format!("{:?}", custom).contains("hp.max"));
    }

    #[test]
    fn test_op_from_json() {
        let op: CompoundOp = serde_json::from_str("\"average\"").unwrap();
        assert_eq!(op, CompoundOp::Average);
    }
}

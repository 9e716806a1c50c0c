//! Stat variants.
//!
//! A `Stat` is a leaf of the stat tree: a plain value (number, text or
//! trait set), a resource (pool, gauge, history gauge, alignometer) or a
//! compound derived from its siblings. Stats never hold a reference to the
//! table that owns them; every reading takes a [`ModifierSource`] instead.

use crate::alignometer::HistoryAlignometer;
use crate::compound::CompoundStat;
use crate::error::StatError;
use crate::history::HistoryGauge;
use crate::path::StatPath;
use crate::pool::{Gauge, Pool};
use crate::value::{OperandType, StatValue};
use std::collections::BTreeSet;

/// Supplies the modifiers stacked on one stat.
pub trait ModifierSource {
    /// Fold the modifiers over `value`. `base` is the stat's unmodified
    /// value; operators that do not accept `operand_type` are skipped.
    fn compute_modifiers(
        &self,
        value: StatValue,
        base: &StatValue,
        operand_type: OperandType,
    ) -> StatValue;

    /// Numeric shorthand: fold the modifiers over a numeric base.
    fn modify_number(&self, base: f64) -> f64 {
        let base = StatValue::Number(base);
        self.compute_modifiers(base.clone(), &base, OperandType::Number)
            .to_f64()
    }
}

/// A source with no modifiers, for stats used outside a table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unmodified;

impl ModifierSource for Unmodified {
    fn compute_modifiers(
        &self,
        value: StatValue,
        _base: &StatValue,
        _operand_type: OperandType,
    ) -> StatValue {
        value
    }
}

/// The variant-specific state of a stat.
#[derive(Debug, Clone)]
pub enum StatKind {
    Number(f64),
    Text(String),
    Traits(BTreeSet<String>),
    Compound(CompoundStat),
    Pool(Pool),
    Gauge(Gauge),
    History(HistoryGauge),
    Alignometer(HistoryAlignometer),
}

impl StatKind {
    pub fn name(&self) -> &'static str {
        match self {
            StatKind::Number(_) => "number",
            StatKind::Text(_) => "text",
            StatKind::Traits(_) => "traits",
            StatKind::Compound(_) => "compound",
            StatKind::Pool(_) => "pool",
            StatKind::Gauge(_) => "gauge",
            StatKind::History(_) => "history",
            StatKind::Alignometer(_) => "alignometer",
        }
    }
}

/// A leaf of the stat tree.
#[derive(Debug, Clone)]
pub struct Stat {
    path: StatPath,
    kind: StatKind,
}

impl Stat {
    pub fn new(kind: StatKind) -> Self {
        Self {
            path: StatPath::root(),
            kind,
        }
    }

    /// Where this stat sits in its tree.
    pub fn path(&self) -> &StatPath {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: StatPath) {
        self.path = path;
    }

    pub fn kind(&self) -> &StatKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut StatKind {
        &mut self.kind
    }

    /// Type of value operators must accept to modify this stat.
    pub fn operand_type(&self) -> OperandType {
        match &self.kind {
            StatKind::Text(_) => OperandType::Text,
            StatKind::Traits(_) => OperandType::Traits,
            StatKind::Compound(_) => OperandType::Any,
            _ => OperandType::Number,
        }
    }

    /// The stored base value. Compound stats have none.
    pub fn base(&self) -> Option<StatValue> {
        let value = match &self.kind {
            StatKind::Number(n) => StatValue::Number(*n),
            StatKind::Text(s) => StatValue::Text(s.clone()),
            StatKind::Traits(t) => StatValue::Traits(t.clone()),
            StatKind::Compound(_) => return None,
            StatKind::Pool(p) => StatValue::Number(p.base()),
            StatKind::Gauge(g) => StatValue::Number(g.base()),
            StatKind::History(h) => StatValue::Number(h.base()),
            StatKind::Alignometer(a) => StatValue::Number(a.base()),
        };
        Some(value)
    }

    /// The current value with modifiers from `mods`. Compound stats need
    /// their siblings and are read through their owning table instead.
    pub fn actual(&self, mods: &dyn ModifierSource) -> Option<StatValue> {
        let value = match &self.kind {
            StatKind::Compound(_) => return None,
            StatKind::Pool(p) => StatValue::Number(p.actual(mods)),
            StatKind::Gauge(g) => StatValue::Number(g.actual(mods)),
            StatKind::History(h) => StatValue::Number(h.actual(mods)),
            StatKind::Alignometer(a) => StatValue::Number(a.actual(mods)),
            _ => {
                let base = self.base()?;
                mods.compute_modifiers(base.clone(), &base, self.operand_type())
            }
        };
        Some(value)
    }

    /// Replace the base value. The new value must match the stat's type.
    pub fn set_base(&mut self, value: StatValue) -> Result<(), StatError> {
        match (&mut self.kind, value) {
            (StatKind::Number(n), StatValue::Number(v)) => *n = v,
            (StatKind::Text(s), StatValue::Text(v)) => *s = v,
            (StatKind::Traits(t), StatValue::Traits(v)) => *t = v,
            (StatKind::Pool(p), StatValue::Number(v)) => p.set_base(v),
            (StatKind::Gauge(g), StatValue::Number(v)) => g.set_base(v),
            (StatKind::History(h), StatValue::Number(v)) => h.set_base(v),
            (StatKind::Alignometer(a), StatValue::Number(v)) => a.set_base(v),
            (kind, _) => {
                let expected = match kind {
                    StatKind::Compound(_) => "stat with a stored base",
                    StatKind::Text(_) => "text",
                    StatKind::Traits(_) => "traits",
                    _ => "number",
                };
                return Err(StatError::WrongKind {
                    path: self.path.clone(),
                    expected,
                });
            }
        }
        Ok(())
    }

    /// Whether a trait stat's base holds `name`.
    pub fn has_trait(&self, name: &str) -> bool {
        matches!(&self.kind, StatKind::Traits(t) if t.contains(name))
    }
}

impl From<StatKind> for Stat {
    fn from(kind: StatKind) -> Self {
        Stat::new(kind)
    }
}

impl From<StatValue> for Stat {
    fn from(value: StatValue) -> Self {
        Stat::new(match value {
            StatValue::Number(n) => StatKind::Number(n),
            StatValue::Text(s) => StatKind::Text(s),
            StatValue::Traits(t) => StatKind::Traits(t),
        })
    }
}

impl From<f64> for Stat {
    fn from(n: f64) -> Self {
        Stat::new(StatKind::Number(n))
    }
}

impl From<&str> for Stat {
    fn from(s: &str) -> Self {
        Stat::new(StatKind::Text(s.to_string()))
    }
}

impl From<CompoundStat> for Stat {
    fn from(c: CompoundStat) -> Self {
        Stat::new(StatKind::Compound(c))
    }
}

impl From<Pool> for Stat {
    fn from(p: Pool) -> Self {
        Stat::new(StatKind::Pool(p))
    }
}

impl From<Gauge> for Stat {
    fn from(g: Gauge) -> Self {
        Stat::new(StatKind::Gauge(g))
    }
}

impl From<HistoryGauge> for Stat {
    fn from(h: HistoryGauge) -> Self {
        Stat::new(StatKind::History(h))
    }
}

impl From<HistoryAlignometer> for Stat {
    fn from(a: HistoryAlignometer) -> Self {
        Stat::new(StatKind::Alignometer(a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Doubling;

    impl ModifierSource for Doubling {
        fn compute_modifiers(
            &self,
            value: StatValue,
            _base: &StatValue,
            operand_type: OperandType,
        ) -> StatValue {
            match (value, operand_type) {
                (StatValue::Number(n), OperandType::Number) => StatValue::Number(n * 2.0),
                (other, _) => other,
            }
        }
    }

    #[test]
    fn test_actual_uses_source() {
        let stat = Stat::from(6.0);
        assert_eq!(stat.actual(&Unmodified), Some(StatValue::Number(6.0)));
        assert_eq!(stat.actual(&Doubling), Some(StatValue::Number(12.0)));

        let text = Stat::from("plain");
        assert_eq!(text.actual(&Doubling), Some(StatValue::from("plain")));
    }

    #[test]
    fn test_pool_max_follows_modifiers() {
        let mut stat = Stat::from(Pool::new(10.0));
        if let StatKind::Pool(pool) = stat.kind_mut() {
            pool.lose(4.0, None, &Doubling);
        }
        assert_eq!(stat.actual(&Doubling), Some(StatValue::Number(16.0)));
        assert_eq!(stat.base(), Some(StatValue::Number(10.0)));
    }

    #[test]
    fn test_set_base_checks_type() {
        let mut stat = Stat::from(1.0);
        assert!(stat.set_base(StatValue::Number(4.0)).is_ok());
        assert_eq!(stat.base(), Some(StatValue::Number(4.0)));
        assert!(matches!(
            stat.set_base(StatValue::from("x")),
            Err(StatError::WrongKind { expected: "number", .. })
        ));
    }

    #[test]
    fn test_traits() {
        let stat = Stat::from(StatValue::traits(["brave"]));
        assert!(stat.has_trait("brave"));
        assert!(!stat.has_trait("tall"));
        assert_eq!(stat.operand_type(), OperandType::Traits);
    }
}

//! Operator table module.
//!
//! Operators are the binary transforms a modifier applies to a stat value.
//! Each operator declares where it sits in the fold (priority group, then
//! priority), the operand type it understands, an optional neutral operand
//! used by fading, and how two operands merge when a table receives a second
//! modifier with the same canonical operator at the same path.
//!
//! Syntactic sugar (`-`, `/`, `%`, ...) is registered as aliases that convert
//! the operand and store the modifier under a canonical operator, so a path
//! never holds two modifiers for the same canonical operator and group.

use crate::error::StatError;
use crate::value::{OperandType, StatValue, EPSILON};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Coarse ordering of modifiers.
///
/// Groups are applied in ascending order of [`PriorityGroup::value`]:
/// base replacement first, then arithmetic, then clamping. Custom groups
/// slot in anywhere by value.
///
/// # Examples
///
/// ```rust
/// use statstack::PriorityGroup;
///
/// assert!(PriorityGroup::Base < PriorityGroup::Arithmetic);
/// assert!(PriorityGroup::Arithmetic < PriorityGroup::Clamp);
/// assert!(PriorityGroup::Custom(250) > PriorityGroup::Arithmetic);
/// assert_eq!(PriorityGroup::from_value(300), PriorityGroup::Clamp);
/// ```
#[derive(Debug, Clone, Copy)]
pub enum PriorityGroup {
    /// Replaces the starting value before any arithmetic.
    Base,
    /// Default group for arithmetic operators.
    Arithmetic,
    /// Bounds and rounding, applied last.
    Clamp,
    /// User-defined group ordered by its value.
    Custom(i32),
}

impl PriorityGroup {
    /// Numeric value of this group for ordering.
    pub fn value(self) -> i32 {
        match self {
            PriorityGroup::Base => 100,
            PriorityGroup::Arithmetic => 200,
            PriorityGroup::Clamp => 300,
            PriorityGroup::Custom(n) => n,
        }
    }

    /// Map a numeric group back to its named variant when it has one.
    pub fn from_value(value: i32) -> Self {
        match value {
            100 => PriorityGroup::Base,
            200 => PriorityGroup::Arithmetic,
            300 => PriorityGroup::Clamp,
            n => PriorityGroup::Custom(n),
        }
    }
}

impl PartialEq for PriorityGroup {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl Eq for PriorityGroup {}

impl std::hash::Hash for PriorityGroup {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value().hash(state);
    }
}

impl PartialOrd for PriorityGroup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityGroup {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value().cmp(&other.value())
    }
}

impl fmt::Display for PriorityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// A transform a modifier applies to a stat value.
///
/// Hosts can register their own operators in an [`OperatorTable`]; they
/// must be pure functions of `(current, operand, base)`.
pub trait Operator: Send + Sync + fmt::Debug {
    /// Canonical name.
    fn id(&self) -> &str;

    /// Fine ordering inside a priority group; higher applies later.
    fn priority(&self) -> i32 {
        0
    }

    /// Group this operator applies in unless a modifier overrides it.
    fn priority_group(&self) -> PriorityGroup {
        PriorityGroup::Arithmetic
    }

    /// Type of stat this operator acts on. `Any` acts on every stat.
    fn operand_type(&self) -> OperandType {
        OperandType::Number
    }

    /// Operand that leaves any value unchanged, if there is one.
    fn neutral(&self) -> Option<StatValue> {
        None
    }

    /// Combine an existing operand with a newly set one. Defaults to replace.
    fn merge(&self, _old: &StatValue, new: &StatValue) -> StatValue {
        new.clone()
    }

    /// Apply the operand to the current value.
    fn apply(&self, current: &StatValue, operand: &StatValue, base: &StatValue) -> StatValue;

    /// Reject operands this operator cannot use.
    fn validate(&self, operand: &StatValue) -> Result<(), StatError> {
        let expected = self.operand_type();
        if expected.accepts(operand.operand_type()) {
            Ok(())
        } else {
            Err(StatError::InvalidOperand {
                operator: self.id().to_string(),
                reason: format!("expected {:?} operand, got {}", expected, operand),
            })
        }
    }

    /// Human-readable form used in breakdowns.
    fn describe(&self, operand: &StatValue) -> String {
        format!("{}({})", self.id(), operand)
    }
}

/// Operators shipped with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// Replace the starting value.
    Base,
    /// Add a number.
    Plus,
    /// Add a percentage of the stat's base.
    PlusBasePercent,
    /// Multiply by a number.
    Multiply,
    /// Replace the value outright; works on every stat type.
    Set,
    /// Lower bound.
    AtLeast,
    /// Upper bound.
    AtMost,
    /// Round to the nearest multiple of the operand.
    Round,
    /// Concatenate text.
    Append,
    /// Add traits to a set.
    AddTraits,
    /// Remove traits from a set.
    RemoveTraits,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Builtin::Base,
        Builtin::Plus,
        Builtin::PlusBasePercent,
        Builtin::Multiply,
        Builtin::Set,
        Builtin::AtLeast,
        Builtin::AtMost,
        Builtin::Round,
        Builtin::Append,
        Builtin::AddTraits,
        Builtin::RemoveTraits,
    ];
}

fn numbers(current: &StatValue, operand: &StatValue) -> Option<(f64, f64)> {
    Some((current.as_number()?, operand.as_number()?))
}

impl Operator for Builtin {
    fn id(&self) -> &str {
        match self {
            Builtin::Base => "base",
            Builtin::Plus => "plus",
            Builtin::PlusBasePercent => "plusBasePercent",
            Builtin::Multiply => "multiply",
            Builtin::Set => "set",
            Builtin::AtLeast => "atLeast",
            Builtin::AtMost => "atMost",
            Builtin::Round => "round",
            Builtin::Append => "append",
            Builtin::AddTraits => "addTraits",
            Builtin::RemoveTraits => "removeTraits",
        }
    }

    fn priority(&self) -> i32 {
        match self {
            Builtin::Base | Builtin::Round => 0,
            Builtin::Plus | Builtin::Append | Builtin::AddTraits | Builtin::AtLeast => 10,
            Builtin::PlusBasePercent => 12,
            Builtin::Multiply | Builtin::RemoveTraits | Builtin::AtMost => 20,
            Builtin::Set => 100,
        }
    }

    fn priority_group(&self) -> PriorityGroup {
        match self {
            Builtin::Base => PriorityGroup::Base,
            Builtin::AtLeast | Builtin::AtMost | Builtin::Round => PriorityGroup::Clamp,
            _ => PriorityGroup::Arithmetic,
        }
    }

    fn operand_type(&self) -> OperandType {
        match self {
            Builtin::Base | Builtin::Set => OperandType::Any,
            Builtin::Append => OperandType::Text,
            Builtin::AddTraits | Builtin::RemoveTraits => OperandType::Traits,
            _ => OperandType::Number,
        }
    }

    fn neutral(&self) -> Option<StatValue> {
        match self {
            Builtin::Plus | Builtin::PlusBasePercent => Some(StatValue::Number(0.0)),
            Builtin::Multiply => Some(StatValue::Number(1.0)),
            _ => None,
        }
    }

    fn merge(&self, old: &StatValue, new: &StatValue) -> StatValue {
        use StatValue::{Number, Text, Traits};
        match (self, old, new) {
            (Builtin::Plus | Builtin::PlusBasePercent, Number(a), Number(b)) => Number(a + b),
            (Builtin::Multiply, Number(a), Number(b)) => Number(a * b),
            (Builtin::AtLeast, Number(a), Number(b)) => Number(a.max(*b)),
            (Builtin::AtMost, Number(a), Number(b)) => Number(a.min(*b)),
            (Builtin::Append, Text(a), Text(b)) => Text(format!("{}{}", a, b)),
            (Builtin::AddTraits | Builtin::RemoveTraits, Traits(a), Traits(b)) => {
                Traits(a.union(b).cloned().collect())
            }
            _ => new.clone(),
        }
    }

    fn apply(&self, current: &StatValue, operand: &StatValue, base: &StatValue) -> StatValue {
        let unchanged = || current.clone();
        let arithmetic = |f: fn(f64, f64) -> f64| {
            numbers(current, operand).map_or_else(unchanged, |(v, o)| StatValue::Number(f(v, o)))
        };
        match self {
            Builtin::Base | Builtin::Set => operand.clone(),
            Builtin::Plus => arithmetic(|v, o| v + o),
            Builtin::PlusBasePercent => {
                match (current.as_number(), operand.as_number(), base.as_number()) {
                    (Some(v), Some(o), Some(b)) => StatValue::Number(v + b * o / 100.0),
                    _ => unchanged(),
                }
            }
            Builtin::Multiply => arithmetic(|v, o| v * o),
            Builtin::AtLeast => arithmetic(f64::max),
            Builtin::AtMost => arithmetic(f64::min),
            Builtin::Round => arithmetic(|v, step| ((v / step) + EPSILON).round() * step),
            Builtin::Append => match (current, operand) {
                (StatValue::Text(v), StatValue::Text(o)) => StatValue::Text(format!("{}{}", v, o)),
                _ => unchanged(),
            },
            Builtin::AddTraits => match (current, operand) {
                (StatValue::Traits(v), StatValue::Traits(o)) => {
                    StatValue::Traits(v.union(o).cloned().collect())
                }
                _ => unchanged(),
            },
            Builtin::RemoveTraits => match (current, operand) {
                (StatValue::Traits(v), StatValue::Traits(o)) => {
                    StatValue::Traits(v.difference(o).cloned().collect())
                }
                _ => unchanged(),
            },
        }
    }

    fn validate(&self, operand: &StatValue) -> Result<(), StatError> {
        if *self == Builtin::Round && operand.as_number().is_some_and(|s| s <= 0.0) {
            return Err(StatError::InvalidOperand {
                operator: self.id().to_string(),
                reason: "rounding step must be positive".to_string(),
            });
        }
        let expected = self.operand_type();
        if expected.accepts(operand.operand_type()) {
            Ok(())
        } else {
            Err(StatError::InvalidOperand {
                operator: self.id().to_string(),
                reason: format!("expected {:?} operand, got {}", expected, operand),
            })
        }
    }

    fn describe(&self, operand: &StatValue) -> String {
        match (self, operand) {
            (Builtin::Plus, StatValue::Number(n)) if *n < 0.0 => format!("-{:.2}", -n),
            (Builtin::Plus, StatValue::Number(n)) => format!("+{:.2}", n),
            (Builtin::Multiply, StatValue::Number(n)) => format!("×{:.2}", n),
            (Builtin::PlusBasePercent, StatValue::Number(n)) => format!("+{:.1}% of base", n),
            _ => format!("{}({})", self.id(), operand),
        }
    }
}

/// Rewrites a sugared operand into the canonical operator's operand.
pub type Conversion = fn(&StatValue) -> Result<StatValue, StatError>;

#[derive(Debug, Clone)]
enum OperatorEntry {
    Canonical(Arc<dyn Operator>),
    Alias {
        target: String,
        convert: Option<Conversion>,
    },
}

fn negate(operand: &StatValue) -> Result<StatValue, StatError> {
    match operand {
        StatValue::Number(n) => Ok(StatValue::Number(-n)),
        other => Err(StatError::InvalidOperand {
            operator: "minus".to_string(),
            reason: format!("expected a number, got {}", other),
        }),
    }
}

fn reciprocal(operand: &StatValue) -> Result<StatValue, StatError> {
    match operand {
        StatValue::Number(n) if n.abs() > 0.0 => Ok(StatValue::Number(1.0 / n)),
        StatValue::Number(_) => Err(StatError::InvalidOperand {
            operator: "divide".to_string(),
            reason: "division by zero".to_string(),
        }),
        other => Err(StatError::InvalidOperand {
            operator: "divide".to_string(),
            reason: format!("expected a number, got {}", other),
        }),
    }
}

fn percent_factor(operand: &StatValue) -> Result<StatValue, StatError> {
    match operand {
        StatValue::Number(n) => Ok(StatValue::Number(1.0 + n / 100.0)),
        other => Err(StatError::InvalidOperand {
            operator: "percent".to_string(),
            reason: format!("expected a number, got {}", other),
        }),
    }
}

/// Registry of operators and their aliases.
///
/// # Examples
///
/// ```rust
/// use statstack::{OperatorTable, StatValue};
///
/// let table = OperatorTable::builtin();
/// let (op, operand) = table.resolve("-", StatValue::Number(4.0)).unwrap();
/// assert_eq!(op.id(), "plus");
/// assert_eq!(operand, StatValue::Number(-4.0));
///
/// assert!(table.resolve("pow", StatValue::Number(2.0)).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperatorTable {
    entries: HashMap<String, OperatorEntry>,
}

impl OperatorTable {
    /// A table with no operators.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A table holding every [`Builtin`] operator and its aliases.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for op in Builtin::ALL {
            table.register(Arc::new(op));
        }
        let aliases: [(&str, &str, Option<Conversion>); 16] = [
            ("+", "plus", None),
            ("add", "plus", None),
            ("-", "plus", Some(negate)),
            ("minus", "plus", Some(negate)),
            ("*", "multiply", None),
            ("x", "multiply", None),
            ("/", "multiply", Some(reciprocal)),
            ("divide", "multiply", Some(reciprocal)),
            ("%", "multiply", Some(percent_factor)),
            ("percent", "multiply", Some(percent_factor)),
            ("=", "set", None),
            (">=", "atLeast", None),
            ("<=", "atMost", None),
            ("+%base", "plusBasePercent", None),
            ("+traits", "addTraits", None),
            ("-traits", "removeTraits", None),
        ];
        for (alias, target, convert) in aliases {
            table.entries.insert(
                alias.to_string(),
                OperatorEntry::Alias {
                    target: target.to_string(),
                    convert,
                },
            );
        }
        table
    }

    /// Process-wide builtin table shared by tables created without one.
    pub fn shared() -> Arc<OperatorTable> {
        static SHARED: OnceLock<Arc<OperatorTable>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(OperatorTable::builtin())).clone()
    }

    /// Register an operator under its canonical id, replacing any previous entry.
    pub fn register(&mut self, op: Arc<dyn Operator>) {
        self.entries
            .insert(op.id().to_string(), OperatorEntry::Canonical(op));
    }

    /// Register `alias` for the canonical operator `target`, optionally
    /// converting operands on the way.
    pub fn register_alias(
        &mut self,
        alias: impl Into<String>,
        target: &str,
        convert: Option<Conversion>,
    ) -> Result<(), StatError> {
        match self.entries.get(target) {
            Some(OperatorEntry::Canonical(_)) => {
                self.entries.insert(
                    alias.into(),
                    OperatorEntry::Alias {
                        target: target.to_string(),
                        convert,
                    },
                );
                Ok(())
            }
            _ => Err(StatError::UnknownOperator(target.to_string())),
        }
    }

    /// Look up a canonical operator by id (aliases are not followed).
    pub fn get(&self, id: &str) -> Option<Arc<dyn Operator>> {
        match self.entries.get(id) {
            Some(OperatorEntry::Canonical(op)) => Some(op.clone()),
            _ => None,
        }
    }

    /// The canonical operator behind a name or alias, without touching any
    /// operand.
    pub fn canonical(&self, name: &str) -> Option<Arc<dyn Operator>> {
        match self.entries.get(name)? {
            OperatorEntry::Canonical(op) => Some(op.clone()),
            OperatorEntry::Alias { target, .. } => self.get(target),
        }
    }

    /// Whether `name` is a registered operator or alias.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Resolve a name or alias to its canonical operator and converted operand.
    pub fn resolve(
        &self,
        name: &str,
        operand: StatValue,
    ) -> Result<(Arc<dyn Operator>, StatValue), StatError> {
        let (op, operand) = match self.entries.get(name) {
            Some(OperatorEntry::Canonical(op)) => (op.clone(), operand),
            Some(OperatorEntry::Alias { target, convert }) => {
                let op = self
                    .get(target)
                    .ok_or_else(|| StatError::UnknownOperator(target.clone()))?;
                let operand = match convert {
                    Some(convert) => convert(&operand)?,
                    None => operand,
                };
                (op, operand)
            }
            None => return Err(StatError::UnknownOperator(name.to_string())),
        };
        op.validate(&operand)?;
        Ok((op, operand))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> StatValue {
        StatValue::Number(n)
    }

    #[test]
    fn test_plus_before_multiply() {
        assert_eq!(Builtin::Plus.priority_group(), Builtin::Multiply.priority_group());
        assert!(Builtin::Plus.priority() < Builtin::Multiply.priority());
    }

    #[test]
    fn test_group_ordering() {
        assert!(Builtin::Base.priority_group() < Builtin::Plus.priority_group());
        assert!(Builtin::Set.priority_group() < Builtin::AtMost.priority_group());
    }

    #[test]
    fn test_arithmetic_merge_combines() {
        assert_eq!(Builtin::Plus.merge(&num(3.0), &num(4.0)), num(7.0));
        assert_eq!(Builtin::Multiply.merge(&num(2.0), &num(1.5)), num(3.0));
        assert_eq!(Builtin::Set.merge(&num(2.0), &num(9.0)), num(9.0));
    }

    #[test]
    fn test_clamp_merge_keeps_most_restrictive() {
        assert_eq!(Builtin::AtLeast.merge(&num(5.0), &num(2.0)), num(5.0));
        assert_eq!(Builtin::AtMost.merge(&num(5.0), &num(2.0)), num(2.0));
    }

    #[test]
    fn test_sugar_conversions() {
        let table = OperatorTable::builtin();
        let (op, operand) = table.resolve("/", num(4.0)).unwrap();
        assert_eq!(op.id(), "multiply");
        assert_eq!(operand, num(0.25));

        let (op, operand) = table.resolve("%", num(50.0)).unwrap();
        assert_eq!(op.id(), "multiply");
        assert_eq!(operand, num(1.5));
    }

    #[test]
    fn test_divide_by_zero_rejected() {
        let table = OperatorTable::builtin();
        assert!(matches!(
            table.resolve("/", num(0.0)),
            Err(StatError::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_operand_type_validated() {
        let table = OperatorTable::builtin();
        assert!(table.resolve("+", StatValue::from("x")).is_err());
        assert!(table.resolve("=", StatValue::from("x")).is_ok());
        assert!(table.resolve("round", num(0.0)).is_err());
    }

    #[test]
    fn test_traits_operators() {
        let current = StatValue::traits(["brave", "tall"]);
        let added = Builtin::AddTraits.apply(&current, &StatValue::traits(["quick"]), &current);
        assert_eq!(added, StatValue::traits(["brave", "quick", "tall"]));
        let removed = Builtin::RemoveTraits.apply(&added, &StatValue::traits(["tall"]), &current);
        assert_eq!(removed, StatValue::traits(["brave", "quick"]));
    }

    #[test]
    fn test_plus_base_percent_uses_base() {
        let out = Builtin::PlusBasePercent.apply(&num(30.0), &num(50.0), &num(20.0));
        assert_eq!(out, num(40.0));
    }

    #[test]
    fn test_canonical_follows_aliases_without_operand() {
        let table = OperatorTable::builtin();
        let id = |name: &str| table.canonical(name).map(|op| op.id().to_string());
        assert_eq!(id("+traits").as_deref(), Some("addTraits"));
        assert_eq!(id("-traits").as_deref(), Some("removeTraits"));
        assert_eq!(id("/").as_deref(), Some("multiply"));
        assert_eq!(id("append").as_deref(), Some("append"));
        assert!(id("pow").is_none());
    }

    #[test]
    fn test_round_step() {
        assert_eq!(Builtin::Round.apply(&num(7.4), &num(5.0), &num(0.0)), num(5.0));
        assert_eq!(Builtin::Round.apply(&num(7.5), &num(5.0), &num(0.0)), num(10.0));
    }

    #[test]
    fn test_custom_operator_registration() {
        #[derive(Debug)]
        struct Square;
        impl Operator for Square {
            fn id(&self) -> &str {
                "square"
            }
            fn apply(
                &self,
                current: &StatValue,
                _operand: &StatValue,
                _base: &StatValue,
            ) -> StatValue {
                StatValue::Number(current.to_f64() * current.to_f64())
            }
        }

        let mut table = OperatorTable::builtin();
        table.register(Arc::new(Square));
        table.register_alias("^2", "square", None).unwrap();
        let (op, _) = table.resolve("^2", num(0.0)).unwrap();
        assert_eq!(op.apply(&num(3.0), &num(0.0), &num(3.0)), num(9.0));
        assert!(table.register_alias("??", "missing", None).is_err());
    }
}

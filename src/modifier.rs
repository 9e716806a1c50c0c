//! Modifier module.
//!
//! A `Modifier` is one operator bound to an operand and to the id of the
//! table that owns it. `ModifierDef` and `ModifierSpec` are the authoring
//! forms accepted by `ModifiersTable::set_stat_modifiers`.

use crate::error::StatError;
use crate::operator::{Operator, PriorityGroup};
use crate::path::StatPath;
use crate::value::StatValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Key of a modifier inside one table path.
///
/// A table holds at most one modifier per canonical operator per explicitly
/// chosen priority group. The default group is left out of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModifierKey {
    pub operator: String,
    pub group: Option<PriorityGroup>,
}

impl ModifierKey {
    pub fn new(operator: impl Into<String>, group: Option<PriorityGroup>) -> Self {
        Self {
            operator: operator.into(),
            group,
        }
    }
}

impl fmt::Display for ModifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.group {
            Some(group) => write!(f, "{}@{}", self.operator, group),
            None => write!(f, "{}", self.operator),
        }
    }
}

/// One operator instance attached to a stat path by a table.
#[derive(Debug, Clone)]
pub struct Modifier {
    owner: String,
    operator: Arc<dyn Operator>,
    operand: StatValue,
    priority_group: PriorityGroup,
    active: bool,
}

impl Modifier {
    /// Create a modifier. Without an explicit group the operator's declared
    /// group is used.
    pub fn new(
        owner: impl Into<String>,
        operator: Arc<dyn Operator>,
        operand: StatValue,
        priority_group: Option<PriorityGroup>,
    ) -> Self {
        let priority_group = priority_group.unwrap_or_else(|| operator.priority_group());
        Self {
            owner: owner.into(),
            operator,
            operand,
            priority_group,
            active: true,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: &str) {
        self.owner = owner.to_string();
    }

    pub fn operator(&self) -> &Arc<dyn Operator> {
        &self.operator
    }

    pub fn operand(&self) -> &StatValue {
        &self.operand
    }

    pub(crate) fn set_operand(&mut self, operand: StatValue) {
        self.operand = operand;
    }

    pub fn priority_group(&self) -> PriorityGroup {
        self.priority_group
    }

    pub fn priority(&self) -> i32 {
        self.operator.priority()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Fold a newly set operand into this modifier using the operator's merge rule.
    pub fn merge(&mut self, operand: &StatValue) {
        self.operand = self.operator.merge(&self.operand, operand);
    }

    /// Apply this modifier to `current`.
    pub fn apply(&self, current: &StatValue, base: &StatValue) -> StatValue {
        self.operator.apply(current, &self.operand, base)
    }

    /// Human-readable description for breakdowns.
    pub fn describe(&self) -> String {
        format!("{} [{}]", self.operator.describe(&self.operand), self.owner)
    }
}

/// Authoring form of a single modifier: operator name (or alias), operand,
/// optional priority group override.
///
/// # Examples
///
/// ```rust
/// use statstack::ModifierDef;
///
/// let def: ModifierDef = ("+", 5.0).into();
/// assert_eq!(def.operator, "+");
/// assert!(def.group.is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierDef {
    pub operator: String,
    pub operand: StatValue,
    pub group: Option<PriorityGroup>,
}

impl ModifierDef {
    pub fn new(operator: impl Into<String>, operand: impl Into<StatValue>) -> Self {
        Self {
            operator: operator.into(),
            operand: operand.into(),
            group: None,
        }
    }

    /// Override the operator's default priority group.
    pub fn in_group(mut self, group: PriorityGroup) -> Self {
        self.group = Some(group);
        self
    }

    /// Read a modifier from its JSON tuple form `[operator, operand, group?]`
    /// or object form `{operator, operand, group?}`.
    pub fn from_json(path: &StatPath, value: &serde_json::Value) -> Result<Self, StatError> {
        use serde_json::Value;
        match value {
            Value::Array(items) => {
                let operator = match items.first() {
                    Some(Value::String(op)) => op.clone(),
                    _ => return Err(StatError::MissingOperator(path.clone())),
                };
                let operand = match items.get(1) {
                    Some(v) => serde_json::from_value(v.clone())?,
                    None => StatValue::Number(0.0),
                };
                let group = items.get(2).map(|g| parse_group(path, g)).transpose()?;
                Ok(Self {
                    operator,
                    operand,
                    group,
                })
            }
            Value::Object(fields) => {
                let operator = match fields.get("operator") {
                    Some(Value::String(op)) => op.clone(),
                    _ => return Err(StatError::MissingOperator(path.clone())),
                };
                let operand = match fields.get("operand") {
                    Some(v) => serde_json::from_value(v.clone())?,
                    None => StatValue::Number(0.0),
                };
                let group = fields.get("group").map(|g| parse_group(path, g)).transpose()?;
                Ok(Self {
                    operator,
                    operand,
                    group,
                })
            }
            other => Err(StatError::InvalidConfig(format!(
                "modifier for {} must be a tuple or an object, got {}",
                path, other
            ))),
        }
    }
}

fn parse_group(path: &StatPath, value: &serde_json::Value) -> Result<PriorityGroup, StatError> {
    value
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .map(PriorityGroup::from_value)
        .ok_or_else(|| {
            StatError::InvalidConfig(format!("priority group for {} must be an integer", path))
        })
}

impl<O: Into<StatValue>> From<(&str, O)> for ModifierDef {
    fn from((operator, operand): (&str, O)) -> Self {
        ModifierDef::new(operator, operand)
    }
}

impl<O: Into<StatValue>> From<(&str, O, PriorityGroup)> for ModifierDef {
    fn from((operator, operand, group): (&str, O, PriorityGroup)) -> Self {
        ModifierDef::new(operator, operand).in_group(group)
    }
}

/// Bulk authoring form: a single modifier, a list, or a nested map whose
/// keys are joined into dotted paths.
#[derive(Debug, Clone, PartialEq)]
pub enum ModifierSpec {
    One(ModifierDef),
    Many(Vec<ModifierDef>),
    Nested(BTreeMap<String, ModifierSpec>),
}

impl ModifierSpec {
    /// Flatten into `(path, def)` pairs rooted at `prefix`.
    pub fn flatten(&self, prefix: &StatPath) -> Vec<(StatPath, ModifierDef)> {
        let mut out = Vec::new();
        self.flatten_into(prefix, &mut out);
        out
    }

    fn flatten_into(&self, prefix: &StatPath, out: &mut Vec<(StatPath, ModifierDef)>) {
        match self {
            ModifierSpec::One(def) => out.push((prefix.clone(), def.clone())),
            ModifierSpec::Many(defs) => {
                out.extend(defs.iter().map(|d| (prefix.clone(), d.clone())))
            }
            ModifierSpec::Nested(children) => {
                for (key, child) in children {
                    child.flatten_into(&prefix.join(key), out);
                }
            }
        }
    }

    /// Read the nested-object shorthand.
    ///
    /// Leaves are `[op, operand, group?]` tuples, arrays of such tuples, or
    /// `{operator, operand, group?}` objects. Any other object is a branch.
    pub fn from_json(path: &StatPath, value: &serde_json::Value) -> Result<Self, StatError> {
        use serde_json::Value;
        match value {
            Value::Array(items) if items.iter().all(Value::is_array) && !items.is_empty() => {
                let defs = items
                    .iter()
                    .map(|item| ModifierDef::from_json(path, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ModifierSpec::Many(defs))
            }
            Value::Array(_) => Ok(ModifierSpec::One(ModifierDef::from_json(path, value)?)),
            Value::Object(fields)
                if ["operator", "operand", "group"].iter().any(|k| fields.contains_key(*k)) =>
            {
                Ok(ModifierSpec::One(ModifierDef::from_json(path, value)?))
            }
            Value::Object(fields) => {
                let mut children = BTreeMap::new();
                for (key, child) in fields {
                    children.insert(key.clone(), ModifierSpec::from_json(&path.join(key), child)?);
                }
                Ok(ModifierSpec::Nested(children))
            }
            other => Err(StatError::InvalidConfig(format!(
                "modifiers for {} must be a tuple, a list or an object, got {}",
                path, other
            ))),
        }
    }
}

impl From<ModifierDef> for ModifierSpec {
    fn from(def: ModifierDef) -> Self {
        ModifierSpec::One(def)
    }
}

impl From<Vec<ModifierDef>> for ModifierSpec {
    fn from(defs: Vec<ModifierDef>) -> Self {
        ModifierSpec::Many(defs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Builtin;
    use serde_json::json;

    #[test]
    fn test_modifier_defaults_to_operator_group() {
        let m = Modifier::new("buff", Arc::new(Builtin::AtMost), 10.0.into(), None);
        assert_eq!(m.priority_group(), PriorityGroup::Clamp);
        let m = Modifier::new(
            "buff",
            Arc::new(Builtin::AtMost),
            10.0.into(),
            Some(PriorityGroup::Custom(5)),
        );
        assert_eq!(m.priority_group(), PriorityGroup::Custom(5));
    }

    #[test]
    fn test_modifier_merge() {
        let mut m = Modifier::new("buff", Arc::new(Builtin::Plus), 3.0.into(), None);
        m.merge(&StatValue::Number(2.0));
        assert_eq!(m.operand(), &StatValue::Number(5.0));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(ModifierKey::new("plus", None).to_string(), "plus");
        assert_eq!(
            ModifierKey::new("plus", Some(PriorityGroup::Custom(250))).to_string(),
            "plus@250"
        );
    }

    #[test]
    fn test_spec_from_nested_json() {
        let spec = ModifierSpec::from_json(
            &StatPath::root(),
            &json!({
                "strength": ["+", 5],
                "hp": { "max": [["*", 2], ["+", 10, 250]] }
            }),
        )
        .unwrap();
        let flat = spec.flatten(&StatPath::root());
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0].0, StatPath::new("hp.max"));
        assert_eq!(flat[1].1.group, Some(PriorityGroup::Custom(250)));
        assert_eq!(flat[2], (StatPath::new("strength"), ModifierDef::new("+", 5.0)));
    }

    #[test]
    fn test_object_without_operator_is_error() {
        let err =
            ModifierSpec::from_json(&StatPath::new("hp"), &json!({ "operand": 5 })).unwrap_err();
        assert_eq!(err, StatError::MissingOperator(StatPath::new("hp")));
    }
}

//! Modifiers table module.
//!
//! A `ModifiersTable` is a named bundle of modifiers keyed by stat path:
//! the effects of one item, spell, aura or status. It is built on its own,
//! then stacked onto exactly one `StatsTable`. Tables can be templates that
//! are instantiated with a fresh id each time they are stacked, and carry
//! recurring events that activate, deactivate, fade or remove them.

use crate::error::StatError;
use crate::event::{EventAction, EventSpec, ScheduledEvent};
use crate::modifier::{Modifier, ModifierDef, ModifierKey, ModifierSpec};
use crate::operator::{OperatorTable, PriorityGroup};
use crate::path::StatPath;
use crate::value::{StatValue, EPSILON};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Key of the reserved entry holding event definitions in JSON input.
pub const EVENTS_KEY: &str = "$events";

/// What a single fade step achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FadeOutcome {
    /// Every active modifier is neutral or has no neutral to reach.
    settled: bool,
    /// Every active modifier reached its neutral operand.
    neutral: bool,
}

/// A named, activatable collection of modifiers keyed by stat path.
///
/// # Examples
///
/// ```rust
/// use statstack::{ModifiersTable, StatsTable};
/// use serde_json::json;
///
/// let mut stats = StatsTable::from_json(&json!({ "strength": 12 })).unwrap();
/// let mut ring = ModifiersTable::new("ring");
/// ring.set_stat_modifier("strength", ("+", 5.0)).unwrap();
///
/// stats.stack(ring).unwrap();
/// assert_eq!(stats.number("strength").unwrap(), 17.0);
///
/// stats.unstack("ring").unwrap();
/// assert_eq!(stats.number("strength").unwrap(), 12.0);
/// ```
#[derive(Debug, Clone)]
pub struct ModifiersTable {
    id: String,
    active: bool,
    destroyed: bool,
    template: bool,
    instances: u32,
    modifiers: BTreeMap<StatPath, Vec<(ModifierKey, Modifier)>>,
    events: BTreeMap<String, Vec<ScheduledEvent>>,
    operators: Arc<OperatorTable>,
}

impl ModifiersTable {
    /// Create an empty, active table using the builtin operators.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_operators(id, OperatorTable::shared())
    }

    /// Create an empty table resolving operator names through `operators`.
    pub fn with_operators(id: impl Into<String>, operators: Arc<OperatorTable>) -> Self {
        Self {
            id: id.into(),
            active: true,
            destroyed: false,
            template: false,
            instances: 0,
            modifiers: BTreeMap::new(),
            events: BTreeMap::new(),
            operators,
        }
    }

    /// Create an empty template table.
    pub fn template(id: impl Into<String>) -> Self {
        let mut table = Self::new(id);
        table.template = true;
        table
    }

    /// Build a table from the nested-object shorthand.
    ///
    /// A top-level `"$events"` array holds event definitions.
    pub fn from_json(id: impl Into<String>, value: &serde_json::Value) -> Result<Self, StatError> {
        Self::from_json_with_operators(id, value, OperatorTable::shared())
    }

    pub fn from_json_with_operators(
        id: impl Into<String>,
        value: &serde_json::Value,
        operators: Arc<OperatorTable>,
    ) -> Result<Self, StatError> {
        let mut table = Self::with_operators(id, operators);
        let serde_json::Value::Object(fields) = value else {
            return Err(StatError::InvalidConfig(format!(
                "modifiers table {} must be an object",
                table.id
            )));
        };
        for (key, child) in fields {
            if key == EVENTS_KEY {
                let specs: Vec<EventSpec> = serde_json::from_value(child.clone())?;
                for spec in &specs {
                    table.set_event_spec(spec);
                }
                continue;
            }
            let path = StatPath::new(key);
            let spec = ModifierSpec::from_json(&path, child)?;
            table.set_stat_modifiers(path, spec)?;
        }
        Ok(table)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active && !self.destroyed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_template(&self) -> bool {
        self.template
    }

    pub fn set_template(&mut self, template: bool) {
        self.template = template;
    }

    pub fn operators(&self) -> &Arc<OperatorTable> {
        &self.operators
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Mark the table destroyed. A destroyed table is inactive for good and
    /// is swept from its stats table.
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.active = false;
    }

    /// Set one modifier at `path`.
    ///
    /// Aliases are resolved to their canonical operator. If the table already
    /// holds a modifier with the same canonical operator and group at `path`,
    /// the operand is merged into it and `None` is returned; otherwise the
    /// new modifier's key is returned.
    pub fn set_stat_modifier(
        &mut self,
        path: impl Into<StatPath>,
        def: impl Into<ModifierDef>,
    ) -> Result<Option<ModifierKey>, StatError> {
        let path = path.into();
        let def = def.into();
        if def.operator.is_empty() {
            return Err(StatError::MissingOperator(path));
        }
        let (operator, operand) = self.operators.resolve(&def.operator, def.operand)?;
        let group = def.group.filter(|g| *g != operator.priority_group());
        let key = ModifierKey::new(operator.id(), group);

        let slots = self.modifiers.entry(path).or_default();
        if let Some((_, existing)) = slots.iter_mut().find(|(k, _)| *k == key) {
            existing.merge(&operand);
            return Ok(None);
        }
        slots.push((key.clone(), Modifier::new(self.id.clone(), operator, operand, group)));
        Ok(Some(key))
    }

    /// Set several modifiers rooted at `path`. Returns the keys of the
    /// modifiers that were created rather than merged.
    pub fn set_stat_modifiers(
        &mut self,
        path: impl Into<StatPath>,
        spec: impl Into<ModifierSpec>,
    ) -> Result<Vec<(StatPath, ModifierKey)>, StatError> {
        let mut created = Vec::new();
        for (path, def) in spec.into().flatten(&path.into()) {
            if let Some(key) = self.set_stat_modifier(path.clone(), def)? {
                created.push((path, key));
            }
        }
        Ok(created)
    }

    /// Remove the modifier for `operator` (name or alias) at `path`.
    pub fn remove_stat_modifier(
        &mut self,
        path: &StatPath,
        operator: &str,
        group: Option<PriorityGroup>,
    ) -> Option<(ModifierKey, Modifier)> {
        let key = self.key_for(operator, group)?;
        let slots = self.modifiers.get_mut(path)?;
        let idx = slots.iter().position(|(k, _)| *k == key)?;
        let removed = slots.remove(idx);
        if slots.is_empty() {
            self.modifiers.remove(path);
        }
        Some(removed)
    }

    /// Canonical key an operator name would be stored under.
    pub fn key_for(&self, operator: &str, group: Option<PriorityGroup>) -> Option<ModifierKey> {
        let op = self.operators.canonical(operator)?;
        let group = group.filter(|g| *g != op.priority_group());
        Some(ModifierKey::new(op.id(), group))
    }

    pub fn modifier(&self, path: &StatPath, key: &ModifierKey) -> Option<&Modifier> {
        self.modifiers
            .get(path)?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, m)| m)
    }

    pub fn modifier_mut(&mut self, path: &StatPath, key: &ModifierKey) -> Option<&mut Modifier> {
        self.modifiers
            .get_mut(path)?
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, m)| m)
    }

    /// Modifiers set at `path`, in insertion order.
    pub fn modifiers_at(&self, path: &StatPath) -> impl Iterator<Item = (&ModifierKey, &Modifier)> {
        self.modifiers
            .get(path)
            .into_iter()
            .flat_map(|slots| slots.iter().map(|(k, m)| (k, m)))
    }

    /// Every path this table touches.
    pub fn paths(&self) -> impl Iterator<Item = &StatPath> {
        self.modifiers.keys()
    }

    /// Every `(path, key, modifier)` in the table.
    pub fn entries(&self) -> impl Iterator<Item = (&StatPath, &ModifierKey, &Modifier)> {
        self.modifiers
            .iter()
            .flat_map(|(path, slots)| slots.iter().map(move |(k, m)| (path, k, m)))
    }

    pub fn len(&self) -> usize {
        self.modifiers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedule `action` on the named event.
    pub fn set_event(
        &mut self,
        name: impl Into<String>,
        times: u32,
        every: u32,
        action: EventAction,
    ) {
        self.events
            .entry(name.into())
            .or_default()
            .push(ScheduledEvent::new(action, times, every));
    }

    pub fn set_event_spec(&mut self, spec: &EventSpec) {
        self.events
            .entry(spec.name.clone())
            .or_default()
            .push(ScheduledEvent::from(spec));
    }

    /// Records still pending on the named event.
    pub fn events(&self, name: &str) -> &[ScheduledEvent] {
        self.events.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Advance every record of the named event by one step, firing the ones
    /// that are due. Returns how many actions fired.
    pub fn trigger(&mut self, name: &str) -> usize {
        let Some(mut records) = self.events.remove(name) else {
            return 0;
        };
        let mut fired = 0;
        for record in records.iter_mut() {
            if record.done {
                continue;
            }
            if record.tick() {
                fired += 1;
                if self.fire(&record.action) {
                    record.done = true;
                }
            }
            if record.exhausted() {
                record.done = true;
            }
        }
        records.retain(|r| !r.done);
        if !records.is_empty() {
            self.events.insert(name.to_string(), records);
        }
        if fired > 0 {
            debug!(table = %self.id, event = name, fired, "table event fired");
        }
        fired
    }

    /// Run an action. Returns whether the event that fired it is finished.
    fn fire(&mut self, action: &EventAction) -> bool {
        match action {
            EventAction::Activate => {
                self.activate();
                false
            }
            EventAction::Deactivate => {
                self.deactivate();
                false
            }
            EventAction::Remove => {
                self.destroy();
                true
            }
            EventAction::Fade { amount, destroy } => {
                let outcome = self.fade(*amount);
                if outcome.neutral && *destroy != Some(false) {
                    debug!(table = %self.id, "table faded out");
                    self.destroy();
                }
                outcome.settled
            }
        }
    }

    /// Move every active, fadable operand `amount` closer to its neutral.
    fn fade(&mut self, amount: f64) -> FadeOutcome {
        let amount = amount.abs();
        let mut outcome = FadeOutcome {
            settled: true,
            neutral: true,
        };
        for slots in self.modifiers.values_mut() {
            for (_, modifier) in slots.iter_mut().filter(|(_, m)| m.is_active()) {
                let neutral = modifier.operator().neutral().and_then(|n| n.as_number());
                let operand = modifier.operand().as_number();
                let (Some(neutral), Some(operand)) = (neutral, operand) else {
                    outcome.neutral = false;
                    continue;
                };
                let gap = operand - neutral;
                let faded = if gap.abs() <= amount + EPSILON {
                    neutral
                } else {
                    operand - amount * gap.signum()
                };
                modifier.set_operand(StatValue::Number(faded));
                if (faded - neutral).abs() > EPSILON {
                    outcome.settled = false;
                    outcome.neutral = false;
                }
            }
        }
        outcome
    }

    /// Copy this table's modifiers and event definitions into a fresh table.
    ///
    /// With `change_id` the copy gets a `_clone_N` id, incrementing an
    /// existing suffix rather than nesting it.
    pub fn duplicate(&self, change_id: bool) -> ModifiersTable {
        let id = if change_id {
            next_clone_id(&self.id)
        } else {
            self.id.clone()
        };
        self.copy_as(id, self.template)
    }

    /// Create a live, stackable instance of a template with a numbered id.
    pub fn instantiate(&mut self) -> ModifiersTable {
        self.instances += 1;
        let id = format!("{}_{}", self.id, self.instances);
        self.copy_as(id, false)
    }

    fn copy_as(&self, id: String, template: bool) -> ModifiersTable {
        let mut copy = ModifiersTable::with_operators(id, self.operators.clone());
        copy.template = template;
        copy.active = self.active;
        for (path, slots) in &self.modifiers {
            let copied = slots
                .iter()
                .map(|(key, modifier)| {
                    let mut modifier = modifier.clone();
                    modifier.set_owner(&copy.id);
                    (key.clone(), modifier)
                })
                .collect();
            copy.modifiers.insert(path.clone(), copied);
        }
        for (name, records) in &self.events {
            copy.events
                .insert(name.clone(), records.iter().map(ScheduledEvent::rearmed).collect());
        }
        copy
    }
}

fn next_clone_id(id: &str) -> String {
    if let Some((stem, n)) = id.rsplit_once("_clone_") {
        if let Ok(n) = n.parse::<u32>() {
            return format!("{}_clone_{}", stem, n + 1);
        }
    }
    format!("{}_clone_1", id)
}

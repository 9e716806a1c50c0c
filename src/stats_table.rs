//! Stats table module.
//!
//! The `StatsTable` is the main entry point. It owns a stat tree and every
//! modifiers table stacked on it, keeps the flattened modifier index in
//! step with both, and answers reads by folding the index over each stat's
//! base.

use crate::alignometer::HistoryAlignometer;
use crate::breakdown::Breakdown;
use crate::compound::CompoundContext;
use crate::config::node_from_json;
use crate::error::{StackError, StatError};
use crate::graph::CompoundGraph;
use crate::history::HistoryGauge;
use crate::modifier::{Modifier, ModifierDef, ModifierKey, ModifierSpec};
use crate::modifiers_table::ModifiersTable;
use crate::operator::PriorityGroup;
use crate::path::StatPath;
use crate::pool::{Gauge, Pool};
use crate::stack::{ModifierStack, PathModifiers};
use crate::stat::{Stat, StatKind};
use crate::tree::{NestedStats, PathMatch, StatNode};
use crate::value::{OperandType, StatValue};
use tracing::debug;

/// A stat tree plus the modifiers tables stacked on it.
///
/// # Examples
///
/// ```rust
/// use statstack::{ModifiersTable, StatsTable};
/// use serde_json::json;
///
/// let mut stats = StatsTable::from_json(&json!({
///     "strength": 12,
///     "hp": { "$type": "pool", "base": 30 },
/// }))
/// .unwrap();
///
/// let mut giant = ModifiersTable::new("giant_strength");
/// giant.set_stat_modifier("strength", ("*", 2.0)).unwrap();
/// giant.set_stat_modifier("hp", ("+", 10.0)).unwrap();
/// stats.stack(giant).unwrap();
///
/// assert_eq!(stats.number("strength").unwrap(), 24.0);
///
/// let (hp, mods) = stats.pool_mut("hp").unwrap();
/// hp.lose(15.0, None, &mods);
/// assert_eq!(stats.number("hp").unwrap(), 25.0);
/// ```
#[derive(Debug, Default)]
pub struct StatsTable {
    root: NestedStats,
    stack: ModifierStack,
    graph: CompoundGraph,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a prepared tree.
    pub fn from_tree(root: NestedStats) -> Result<Self, StatError> {
        let mut root = root;
        root.set_path(StatPath::root());
        let graph = CompoundGraph::build(&root)?;
        Ok(Self {
            root,
            stack: ModifierStack::default(),
            graph,
        })
    }

    /// Build a table from nested JSON (see [`crate::config`]).
    pub fn from_json(value: &serde_json::Value) -> Result<Self, StatError> {
        match node_from_json(value)? {
            StatNode::Nested(root) => Self::from_tree(root),
            StatNode::Stat(_) => Err(StatError::InvalidConfig(
                "a stats table must be built from an object".to_string(),
            )),
        }
    }

    pub fn root(&self) -> &NestedStats {
        &self.root
    }

    pub fn graph(&self) -> &CompoundGraph {
        &self.graph
    }

    // ---- tree ----

    /// The node at `path`. Keys under a wildcard branch that have not been
    /// materialized resolve to the branch's template.
    pub fn get(&self, path: impl Into<StatPath>) -> Option<&StatNode> {
        self.root.locate(&path.into()).map(|located| located.node)
    }

    pub fn resolve_path(&self, path: impl Into<StatPath>) -> Result<&StatNode, StatError> {
        let path = path.into();
        self.root
            .locate(&path)
            .map(|located| located.node)
            .ok_or(StatError::UnknownStat(path))
    }

    pub fn contains(&self, path: impl Into<StatPath>) -> bool {
        self.get(path).is_some()
    }

    /// The stat at `path`.
    pub fn stat(&self, path: impl Into<StatPath>) -> Result<&Stat, StatError> {
        let path = path.into();
        match self.resolve_path(path.clone())? {
            StatNode::Stat(stat) => Ok(stat),
            StatNode::Nested(_) => Err(StatError::WrongKind { path, expected: "stat" }),
        }
    }

    /// Paths of every concrete stat, templates excluded.
    pub fn stat_paths(&self) -> Vec<StatPath> {
        let mut paths = Vec::new();
        self.root.for_each_stat(false, &mut |stat| paths.push(stat.path().clone()));
        paths
    }

    /// Put `node` at `path`, creating missing branches. Returns the node it
    /// replaced. The change is rolled back if it leaves a compound stat
    /// reading a missing stat or part of a cycle.
    pub fn set_stat(
        &mut self,
        path: impl Into<StatPath>,
        node: impl Into<StatNode>,
    ) -> Result<Option<StatNode>, StatError> {
        let path = path.into();
        let (parent, key) = split_path(&path)?;
        let existing = self.root.existing_depth(&parent);
        let previous = match self.root.branch_mut(&parent, true) {
            Ok(branch) => branch.insert(&key, node),
            Err(err) => {
                self.prune_created(&parent, existing);
                return Err(err);
            }
        };
        if let Err(err) = self.rebuild_graph() {
            if existing < parent.depth() {
                self.prune_created(&parent, existing);
            } else if let Ok(branch) = self.root.branch_mut(&parent, false) {
                match previous {
                    Some(node) => branch.insert(&key, node),
                    None => branch.remove(&key),
                };
            }
            return Err(err);
        }
        self.stack.reindex(&self.root);
        Ok(previous)
    }

    /// Give the branch at `path` a wildcard template.
    pub fn set_wildcard(
        &mut self,
        path: impl Into<StatPath>,
        template: impl Into<StatNode>,
    ) -> Result<(), StatError> {
        let path = path.into();
        let existing = self.root.existing_depth(&path);
        let previous = match self.root.branch_mut(&path, true) {
            Ok(branch) => branch.set_wildcard(Some(template.into())),
            Err(err) => {
                self.prune_created(&path, existing);
                return Err(err);
            }
        };
        if let Err(err) = self.rebuild_graph() {
            if existing < path.depth() {
                self.prune_created(&path, existing);
            } else if let Ok(branch) = self.root.branch_mut(&path, false) {
                branch.set_wildcard(previous);
            }
            return Err(err);
        }
        self.stack.reindex(&self.root);
        Ok(())
    }

    /// Drop whatever a failed write created or materialized below the first
    /// `existing` segments of `path`.
    fn prune_created(&mut self, path: &StatPath, existing: usize) {
        let segments: Vec<&str> = path.segments().collect();
        let Some(first) = segments.get(existing) else {
            return;
        };
        let kept = StatPath::new(&segments[..existing].join("."));
        if let Ok(branch) = self.root.branch_mut(&kept, false) {
            branch.remove(first);
        }
    }

    /// Remove and return the node at `path`. Fails if a compound stat
    /// elsewhere still reads it.
    pub fn remove_stat(&mut self, path: impl Into<StatPath>) -> Result<StatNode, StatError> {
        let path = path.into();
        let (parent, key) = split_path(&path)?;
        let removed = self
            .root
            .branch_mut(&parent, false)
            .ok()
            .and_then(|branch| branch.remove(&key))
            .ok_or_else(|| StatError::UnknownStat(path.clone()))?;
        if let Err(err) = self.rebuild_graph() {
            if let Ok(branch) = self.root.branch_mut(&parent, false) {
                branch.insert(&key, removed);
            }
            return Err(err);
        }
        self.stack.reindex(&self.root);
        Ok(removed)
    }

    /// Turn every wildcard step of `path` into a real child.
    pub fn materialize(&mut self, path: impl Into<StatPath>) -> Result<&mut StatNode, StatError> {
        let path = path.into();
        self.root.materialize(&path).ok_or(StatError::UnknownStat(path))
    }

    /// Move the node at `source_path` of `source` to `path` of this table.
    /// When this table refuses the node it goes back to `source`.
    pub fn graft(
        &mut self,
        path: impl Into<StatPath>,
        source: &mut StatsTable,
        source_path: impl Into<StatPath>,
    ) -> Result<(), StatError> {
        let path = path.into();
        let source_path = source_path.into();
        let node = source.remove_stat(source_path.clone())?;
        if let Err(err) = self.set_stat(path, node.clone()) {
            source.set_stat(source_path, node)?;
            return Err(err);
        }
        Ok(())
    }

    /// A copy of the stat tree without any stacked tables.
    pub fn duplicate_stats(&self) -> StatsTable {
        StatsTable {
            root: self.root.clone(),
            stack: ModifierStack::default(),
            graph: self.graph.clone(),
        }
    }

    /// Stats in dependency order, every stat before the compounds reading it.
    pub fn compound_order(&self) -> Result<Vec<StatPath>, StatError> {
        self.graph.topological_sort()
    }

    fn rebuild_graph(&mut self) -> Result<(), StatError> {
        self.graph = CompoundGraph::build(&self.root)?;
        Ok(())
    }

    // ---- reads ----

    pub fn base(&self, path: impl Into<StatPath>) -> Result<StatValue, StatError> {
        let path = path.into();
        let stat = self.stat(path.clone())?;
        Ok(match stat.kind() {
            StatKind::Compound(compound) => compound.base(&self.compound_context(&path)),
            _ => stat.base().unwrap_or_default(),
        })
    }

    pub fn actual(&self, path: impl Into<StatPath>) -> Result<StatValue, StatError> {
        let path = path.into();
        let stat = self.stat(path.clone())?;
        Ok(self.evaluate(&path, stat))
    }

    /// Numeric actual value.
    pub fn number(&self, path: impl Into<StatPath>) -> Result<f64, StatError> {
        let path = path.into();
        self.actual(path.clone())?
            .as_number()
            .ok_or(StatError::WrongKind { path, expected: "number" })
    }

    /// Whether the actual trait set at `path` holds `name`.
    pub fn has_trait(&self, path: impl Into<StatPath>, name: &str) -> Result<bool, StatError> {
        let path = path.into();
        match self.actual(path.clone())? {
            StatValue::Traits(traits) => Ok(traits.contains(name)),
            _ => Err(StatError::WrongKind { path, expected: "traits" }),
        }
    }

    fn evaluate(&self, path: &StatPath, stat: &Stat) -> StatValue {
        let mods = self.modifiers_for(path.clone());
        match stat.kind() {
            StatKind::Compound(compound) => compound.actual(&self.compound_context(path), &mods),
            _ => stat.actual(&mods).unwrap_or_default(),
        }
    }

    fn compound_context(&self, path: &StatPath) -> CompoundContext<'_> {
        CompoundContext::new(self, path.parent().unwrap_or_else(StatPath::root))
    }

    /// The modifiers stacked on `path`, as a source for standalone reads.
    pub fn modifiers_for(&self, path: impl Into<StatPath>) -> PathModifiers<'_> {
        PathModifiers::new(&self.stack, path.into())
    }

    /// Fold the modifiers stacked on `path` over `value`.
    pub fn compute_modifiers(
        &self,
        path: impl Into<StatPath>,
        value: StatValue,
        base: &StatValue,
        operand_type: OperandType,
    ) -> StatValue {
        self.stack.fold(&path.into(), value, base, operand_type, |_, _| {})
    }

    /// Live modifiers at `path` in application order.
    pub fn modifiers_at(&self, path: impl Into<StatPath>) -> Vec<&Modifier> {
        self.stack.modifiers_at(&path.into())
    }

    /// Whether modifiers may target `path`.
    pub fn check_modifiable_path(&self, path: impl Into<StatPath>) -> Option<PathMatch> {
        self.root.check_modifiable_path(&path.into())
    }

    /// Child keys of the wildcard branch at `branch` that stacked modifiers
    /// address.
    pub fn wildcard_keys(&self, branch: impl Into<StatPath>) -> Vec<String> {
        self.stack.wildcard_keys(&branch.into())
    }

    /// The value at `path` with every applied modifier listed.
    pub fn explain(&self, path: impl Into<StatPath>) -> Result<Breakdown, StatError> {
        let path = path.into();
        let stat = self.stat(path.clone())?;
        let (base, start, operand_type) = match stat.kind() {
            StatKind::Compound(compound) => {
                let ctx = self.compound_context(&path);
                let derived = compound.derived(&ctx);
                let operand_type = derived.operand_type();
                (compound.base(&ctx), derived, operand_type)
            }
            _ => {
                let base = stat.base().unwrap_or_default();
                (base.clone(), base, stat.operand_type())
            }
        };
        let mut breakdown = Breakdown::new(path.clone(), base.clone(), start.clone());
        self.stack.fold(&path, start, &base, operand_type, |modifier, value| {
            breakdown.add_step(modifier.describe(), value.clone());
        });
        breakdown.value = self.evaluate(&path, stat);
        Ok(breakdown)
    }

    // ---- writes ----

    /// Replace the base value at `path`, materializing wildcard children.
    pub fn set_base(
        &mut self,
        path: impl Into<StatPath>,
        value: impl Into<StatValue>,
    ) -> Result<(), StatError> {
        let (stat, _) = self.stat_mut(path.into())?;
        stat.set_base(value.into())
    }

    /// The stat at `path` for mutation, with the modifiers stacked on it.
    pub fn stat_mut(
        &mut self,
        path: impl Into<StatPath>,
    ) -> Result<(&mut Stat, PathModifiers<'_>), StatError> {
        let path = path.into();
        let node = self
            .root
            .materialize(&path)
            .ok_or_else(|| StatError::UnknownStat(path.clone()))?;
        match node {
            StatNode::Stat(stat) => Ok((stat, PathModifiers::new(&self.stack, path))),
            StatNode::Nested(_) => Err(StatError::WrongKind { path, expected: "stat" }),
        }
    }

    /// The pool at `path` with its modifiers.
    ///
    /// ```rust
    /// use statstack::StatsTable;
    /// use serde_json::json;
    ///
    /// let mut stats =
    ///     StatsTable::from_json(&json!({ "mana": { "$type": "pool", "base": 10 } })).unwrap();
    /// let (mana, mods) = stats.pool_mut("mana").unwrap();
    /// assert!(mana.spend(4.0, &mods));
    /// assert!(!mana.spend(7.0, &mods));
    /// assert_eq!(stats.number("mana").unwrap(), 6.0);
    /// ```
    pub fn pool_mut(
        &mut self,
        path: impl Into<StatPath>,
    ) -> Result<(&mut Pool, PathModifiers<'_>), StatError> {
        let (stat, mods) = self.stat_mut(path)?;
        let path = stat.path().clone();
        match stat.kind_mut() {
            StatKind::Pool(pool) => Ok((pool, mods)),
            _ => Err(StatError::WrongKind { path, expected: "pool" }),
        }
    }

    pub fn gauge_mut(
        &mut self,
        path: impl Into<StatPath>,
    ) -> Result<(&mut Gauge, PathModifiers<'_>), StatError> {
        let (stat, mods) = self.stat_mut(path)?;
        let path = stat.path().clone();
        match stat.kind_mut() {
            StatKind::Gauge(gauge) => Ok((gauge, mods)),
            _ => Err(StatError::WrongKind { path, expected: "gauge" }),
        }
    }

    pub fn history_mut(
        &mut self,
        path: impl Into<StatPath>,
    ) -> Result<(&mut HistoryGauge, PathModifiers<'_>), StatError> {
        let (stat, mods) = self.stat_mut(path)?;
        let path = stat.path().clone();
        match stat.kind_mut() {
            StatKind::History(history) => Ok((history, mods)),
            _ => Err(StatError::WrongKind { path, expected: "history gauge" }),
        }
    }

    pub fn alignometer_mut(
        &mut self,
        path: impl Into<StatPath>,
    ) -> Result<(&mut HistoryAlignometer, PathModifiers<'_>), StatError> {
        let (stat, mods) = self.stat_mut(path)?;
        let path = stat.path().clone();
        match stat.kind_mut() {
            StatKind::Alignometer(meter) => Ok((meter, mods)),
            _ => Err(StatError::WrongKind { path, expected: "alignometer" }),
        }
    }

    // ---- stacking ----

    /// Stack a modifiers table. A template is instantiated first. Returns
    /// the id the table is stacked under. A table whose id is already
    /// stacked comes back inside the error.
    ///
    /// Modifiers aimed at paths that do not name a stat are dropped.
    pub fn stack(&mut self, table: ModifiersTable) -> Result<String, StackError> {
        let table = if table.is_template() {
            let mut template = table;
            template.instantiate()
        } else {
            table
        };
        let id = table.id().to_string();
        self.stack.insert(table, &self.root)?;
        Ok(id)
    }

    /// Stack a fresh instance of `template`, leaving the template with the
    /// caller for further instances.
    pub fn stack_template(&mut self, template: &mut ModifiersTable) -> Result<String, StatError> {
        let instance = template.instantiate();
        Ok(self.stack(instance)?)
    }

    /// Unstack the table with `id` and hand it back.
    pub fn unstack(&mut self, id: &str) -> Result<ModifiersTable, StatError> {
        self.stack
            .remove(id)
            .ok_or_else(|| StatError::UnknownTable(id.to_string()))
    }

    pub fn is_stacked(&self, id: &str) -> bool {
        self.stack.contains(id)
    }

    pub fn table(&self, id: &str) -> Option<&ModifiersTable> {
        self.stack.get(id)
    }

    /// Stacked tables in stacking order.
    pub fn tables(&self) -> impl Iterator<Item = &ModifiersTable> {
        self.stack.tables()
    }

    fn stacked_mut(&mut self, id: &str) -> Result<&mut ModifiersTable, StatError> {
        self.stack
            .get_mut(id)
            .ok_or_else(|| StatError::UnknownTable(id.to_string()))
    }

    /// Set a modifier on a stacked table and index it immediately.
    pub fn set_stat_modifier(
        &mut self,
        id: &str,
        path: impl Into<StatPath>,
        def: impl Into<ModifierDef>,
    ) -> Result<Option<ModifierKey>, StatError> {
        let path = path.into();
        let created = self.stacked_mut(id)?.set_stat_modifier(path.clone(), def)?;
        if let Some(key) = &created {
            self.stack.index_one(id, &path, key, &self.root);
        }
        Ok(created)
    }

    /// Bulk form of [`StatsTable::set_stat_modifier`].
    pub fn set_stat_modifiers(
        &mut self,
        id: &str,
        path: impl Into<StatPath>,
        spec: impl Into<ModifierSpec>,
    ) -> Result<Vec<(StatPath, ModifierKey)>, StatError> {
        let created = self.stacked_mut(id)?.set_stat_modifiers(path, spec)?;
        for (path, key) in &created {
            self.stack.index_one(id, path, key, &self.root);
        }
        Ok(created)
    }

    /// Remove a modifier from a stacked table and from the index.
    pub fn remove_stat_modifier(
        &mut self,
        id: &str,
        path: impl Into<StatPath>,
        operator: &str,
        group: Option<PriorityGroup>,
    ) -> Result<Option<Modifier>, StatError> {
        let path = path.into();
        let removed = self.stacked_mut(id)?.remove_stat_modifier(&path, operator, group);
        Ok(removed.map(|(key, modifier)| {
            self.stack.unindex_one(id, &path, &key);
            modifier
        }))
    }

    pub fn set_table_active(&mut self, id: &str, active: bool) -> Result<(), StatError> {
        let table = self.stacked_mut(id)?;
        if active {
            table.activate();
        } else {
            table.deactivate();
        }
        Ok(())
    }

    /// Switch one modifier of a stacked table on or off. Returns false if
    /// the table holds no such modifier.
    pub fn set_modifier_active(
        &mut self,
        id: &str,
        path: impl Into<StatPath>,
        operator: &str,
        group: Option<PriorityGroup>,
        active: bool,
    ) -> Result<bool, StatError> {
        let path = path.into();
        let table = self.stacked_mut(id)?;
        let Some(key) = table.key_for(operator, group) else {
            return Ok(false);
        };
        match table.modifier_mut(&path, &key) {
            Some(modifier) => {
                modifier.set_active(active);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Trigger an event on one stacked table. Returns how many actions fired.
    pub fn trigger(&mut self, id: &str, event: &str) -> Result<usize, StatError> {
        let fired = self.stacked_mut(id)?.trigger(event);
        self.sweep();
        Ok(fired)
    }

    /// Trigger an event on every stacked table.
    pub fn trigger_all(&mut self, event: &str) -> usize {
        let ids: Vec<String> = self.stack.tables().map(|t| t.id().to_string()).collect();
        let mut fired = 0;
        for id in ids {
            if let Some(table) = self.stack.get_mut(&id) {
                fired += table.trigger(event);
            }
        }
        self.sweep();
        fired
    }

    /// Unstack every destroyed table. Returns them.
    pub fn sweep(&mut self) -> Vec<ModifiersTable> {
        let destroyed: Vec<String> = self
            .stack
            .tables()
            .filter(|t| t.is_destroyed())
            .map(|t| t.id().to_string())
            .collect();
        destroyed
            .iter()
            .filter_map(|id| {
                debug!(table = %id, "sweeping destroyed table");
                self.stack.remove(id)
            })
            .collect()
    }
}

fn split_path(path: &StatPath) -> Result<(StatPath, String), StatError> {
    match (path.parent(), path.last()) {
        (Some(parent), Some(key)) => Ok((parent, key.to_string())),
        _ => Err(StatError::InvalidConfig(
            "the root of a stats table cannot be replaced".to_string(),
        )),
    }
}

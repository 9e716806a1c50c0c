//! Stacked modifier index.
//!
//! `ModifierStack` owns the modifiers tables stacked on a stats table and
//! keeps a flattened, pre-sorted list of modifier references per stat path,
//! so a read only walks the entries for its own path. Entries point back
//! into the owning table by id and key; operands, activation and fading are
//! read live from the table on every fold.

use crate::error::{StackError, StatError};
use crate::modifier::{Modifier, ModifierKey};
use crate::modifiers_table::ModifiersTable;
use crate::path::StatPath;
use crate::stat::ModifierSource;
use crate::tree::{NestedStats, PathMatch};
use crate::value::{OperandType, StatValue};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// One modifier reference in the flattened index.
#[derive(Debug, Clone, PartialEq)]
struct FlatEntry {
    table: String,
    path: StatPath,
    key: ModifierKey,
    group: i32,
    priority: i32,
    seq: u64,
}

impl FlatEntry {
    /// Application order: group, then priority, then stacking order.
    fn order(&self) -> (i32, i32, u64) {
        (self.group, self.priority, self.seq)
    }
}

type EntryId = (String, StatPath, ModifierKey);

#[derive(Debug, Default)]
pub(crate) struct ModifierStack {
    tables: HashMap<String, ModifiersTable>,
    order: Vec<String>,
    flat: HashMap<StatPath, Vec<FlatEntry>>,
    wildcard: HashMap<StatPath, BTreeMap<String, Vec<FlatEntry>>>,
    seq: u64,
}

impl ModifierStack {
    pub(crate) fn contains(&self, id: &str) -> bool {
        self.tables.contains_key(id)
    }

    pub(crate) fn get(&self, id: &str) -> Option<&ModifiersTable> {
        self.tables.get(id)
    }

    /// Mutable access for changes that leave the set of modifier keys
    /// untouched (activation, operands, events).
    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut ModifiersTable> {
        self.tables.get_mut(id)
    }

    /// Stacked tables in stacking order.
    pub(crate) fn tables(&self) -> impl Iterator<Item = &ModifiersTable> {
        self.order.iter().filter_map(|id| self.tables.get(id))
    }

    /// Stack `table`. A table whose id is taken is handed back in the error.
    pub(crate) fn insert(
        &mut self,
        table: ModifiersTable,
        tree: &NestedStats,
    ) -> Result<(), StackError> {
        let id = table.id().to_string();
        if self.tables.contains_key(&id) {
            return Err(StackError::new(StatError::AlreadyStacked(id), table));
        }
        let refs: Vec<(StatPath, ModifierKey)> = table
            .entries()
            .map(|(path, key, _)| (path.clone(), key.clone()))
            .collect();
        self.tables.insert(id.clone(), table);
        self.order.push(id.clone());
        let mut indexed = 0;
        for (path, key) in refs {
            if self.index_one(&id, &path, &key, tree) {
                indexed += 1;
            }
        }
        debug!(table = %id, modifiers = indexed, "stacked modifiers table");
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<ModifiersTable> {
        let table = self.tables.remove(id)?;
        self.order.retain(|t| t != id);
        self.flat.retain(|_, entries| {
            entries.retain(|e| e.table != id);
            !entries.is_empty()
        });
        self.wildcard.retain(|_, keys| {
            keys.retain(|_, entries| {
                entries.retain(|e| e.table != id);
                !entries.is_empty()
            });
            !keys.is_empty()
        });
        debug!(table = %id, "unstacked modifiers table");
        Some(table)
    }

    /// Add one modifier of a stacked table to the index. Returns false when
    /// the path does not name a modifiable stat and the modifier was dropped.
    pub(crate) fn index_one(
        &mut self,
        id: &str,
        path: &StatPath,
        key: &ModifierKey,
        tree: &NestedStats,
    ) -> bool {
        self.seq += 1;
        let seq = self.seq;
        self.index_with_seq(id, path, key, tree, seq)
    }

    fn index_with_seq(
        &mut self,
        id: &str,
        path: &StatPath,
        key: &ModifierKey,
        tree: &NestedStats,
        seq: u64,
    ) -> bool {
        let Some(modifier) = self.tables.get(id).and_then(|t| t.modifier(path, key)) else {
            return false;
        };
        let Some(matched) = tree.check_modifiable_path(path) else {
            debug!(table = id, path = %path, modifier = %key, "dropped modifier for unknown stat");
            return false;
        };
        let entry = FlatEntry {
            table: id.to_string(),
            path: path.clone(),
            key: key.clone(),
            group: modifier.priority_group().value(),
            priority: modifier.priority(),
            seq,
        };
        if let PathMatch::Wildcard { branch, key } = matched {
            let slot = self.wildcard.entry(branch).or_default().entry(key).or_default();
            slot.push(entry.clone());
        }
        let list = self.flat.entry(path.clone()).or_default();
        let pos = list.partition_point(|e| e.order() <= entry.order());
        list.insert(pos, entry);
        true
    }

    /// Drop one modifier of a stacked table from the index.
    pub(crate) fn unindex_one(&mut self, id: &str, path: &StatPath, key: &ModifierKey) {
        let matches = |e: &FlatEntry| e.table == id && e.path == *path && e.key == *key;
        if let Some(list) = self.flat.get_mut(path) {
            list.retain(|e| !matches(e));
            if list.is_empty() {
                self.flat.remove(path);
            }
        }
        self.wildcard.retain(|_, keys| {
            keys.retain(|_, entries| {
                entries.retain(|e| !matches(e));
                !entries.is_empty()
            });
            !keys.is_empty()
        });
    }

    /// Rebuild the index after the tree changed shape. Modifiers keep their
    /// original stacking order.
    pub(crate) fn reindex(&mut self, tree: &NestedStats) {
        let mut seqs: HashMap<EntryId, u64> = HashMap::new();
        for entry in self.flat.values().flatten() {
            seqs.insert((entry.table.clone(), entry.path.clone(), entry.key.clone()), entry.seq);
        }
        self.flat.clear();
        self.wildcard.clear();

        let mut refs: Vec<(EntryId, Option<u64>)> = Vec::new();
        for id in &self.order {
            let Some(table) = self.tables.get(id) else { continue };
            for (path, key, _) in table.entries() {
                let entry_id = (id.clone(), path.clone(), key.clone());
                let seq = seqs.get(&entry_id).copied();
                refs.push((entry_id, seq));
            }
        }
        // Previously indexed entries first, in their old order.
        refs.sort_by_key(|(_, seq)| seq.unwrap_or(u64::MAX));
        for ((id, path, key), seq) in refs {
            let seq = seq.unwrap_or_else(|| {
                self.seq += 1;
                self.seq
            });
            self.index_with_seq(&id, &path, &key, tree, seq);
        }
    }

    /// Live modifiers at `path` in application order.
    pub(crate) fn modifiers_at<'a>(&'a self, path: &StatPath) -> Vec<&'a Modifier> {
        let Some(entries) = self.flat.get(path) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| {
                let table = self.tables.get(&entry.table)?;
                if !table.is_active() {
                    return None;
                }
                table.modifier(path, &entry.key).filter(|m| m.is_active())
            })
            .collect()
    }

    /// Fold the live modifiers at `path` over `value`, reporting each step.
    pub(crate) fn fold(
        &self,
        path: &StatPath,
        value: StatValue,
        base: &StatValue,
        operand_type: OperandType,
        mut on_step: impl FnMut(&Modifier, &StatValue),
    ) -> StatValue {
        let mut value = value;
        for modifier in self.modifiers_at(path) {
            if !modifier.operator().operand_type().accepts(operand_type) {
                continue;
            }
            value = modifier.apply(&value, base);
            trace!(
                path = %path,
                modifier = %modifier.describe(),
                value = %value,
                "applied modifier"
            );
            on_step(modifier, &value);
        }
        value
    }

    /// Child keys of a wildcard branch that stacked modifiers address.
    pub(crate) fn wildcard_keys(&self, branch: &StatPath) -> Vec<String> {
        self.wildcard
            .get(branch)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// The modifiers stacked on one path of a stats table.
///
/// Handed out next to mutable resource stats so they can read their
/// modified maximum while being changed.
#[derive(Debug)]
pub struct PathModifiers<'a> {
    stack: &'a ModifierStack,
    path: StatPath,
}

impl<'a> PathModifiers<'a> {
    pub(crate) fn new(stack: &'a ModifierStack, path: StatPath) -> Self {
        Self { stack, path }
    }

    pub fn path(&self) -> &StatPath {
        &self.path
    }
}

impl ModifierSource for PathModifiers<'_> {
    fn compute_modifiers(
        &self,
        value: StatValue,
        base: &StatValue,
        operand_type: OperandType,
    ) -> StatValue {
        self.stack.fold(&self.path, value, base, operand_type, |_, _| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::PriorityGroup;

    fn tree() -> NestedStats {
        let mut root = NestedStats::new();
        root.insert("str", 10.0);
        root.insert("skills", NestedStats::wild(0.0));
        root
    }

    fn read(stack: &ModifierStack, path: &str) -> f64 {
        let base = StatValue::Number(10.0);
        stack
            .fold(&StatPath::new(path), base.clone(), &base, OperandType::Number, |_, _| {})
            .to_f64()
    }

    #[test]
    fn test_groups_order_application() {
        let tree = tree();
        let mut stack = ModifierStack::default();
        let mut clamp = ModifiersTable::new("clamp");
        clamp.set_stat_modifier("str", ("<=", 15.0)).unwrap();
        let mut buff = ModifiersTable::new("buff");
        buff.set_stat_modifier("str", ("*", 2.0)).unwrap();
        buff.set_stat_modifier("str", ("+", 5.0)).unwrap();

        stack.insert(clamp, &tree).unwrap();
        stack.insert(buff, &tree).unwrap();
        // (10 + 5) * 2 = 30, then clamped.
        assert_eq!(read(&stack, "str"), 15.0);
        let ops: Vec<&str> = stack
            .modifiers_at(&StatPath::new("str"))
            .iter()
            .map(|m| m.operator().id())
            .collect();
        assert_eq!(ops, vec!["plus", "multiply", "atMost"]);
    }

    #[test]
    fn test_custom_group_applies_after_arithmetic() {
        let tree = tree();
        let mut stack = ModifierStack::default();
        let mut table = ModifiersTable::new("late");
        table
            .set_stat_modifier("str", ("+", 5.0, PriorityGroup::Custom(250)))
            .unwrap();
        table.set_stat_modifier("str", ("*", 2.0)).unwrap();
        stack.insert(table, &tree).unwrap();
        assert_eq!(read(&stack, "str"), 25.0);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let tree = tree();
        let mut stack = ModifierStack::default();
        stack.insert(ModifiersTable::new("a"), &tree).unwrap();
        let err = stack.insert(ModifiersTable::new("a"), &tree).unwrap_err();
        assert_eq!(err.error, StatError::AlreadyStacked("a".into()));
        assert_eq!(err.into_table().id(), "a");
    }

    #[test]
    fn test_invalid_paths_dropped_and_wildcards_indexed() {
        let tree = tree();
        let mut stack = ModifierStack::default();
        let mut table = ModifiersTable::new("t");
        table.set_stat_modifier("luck", ("+", 1.0)).unwrap();
        table.set_stat_modifier("skills.swords", ("+", 2.0)).unwrap();
        stack.insert(table, &tree).unwrap();

        assert!(stack.modifiers_at(&StatPath::new("luck")).is_empty());
        assert_eq!(stack.modifiers_at(&StatPath::new("skills.swords")).len(), 1);
        assert_eq!(stack.wildcard_keys(&StatPath::new("skills")), vec!["swords"]);

        stack.remove("t").unwrap();
        assert!(stack.flat.is_empty());
        assert!(stack.wildcard.is_empty());
    }

    #[test]
    fn test_reindex_picks_up_new_paths() {
        let mut tree = tree();
        let mut stack = ModifierStack::default();
        let mut table = ModifiersTable::new("t");
        table.set_stat_modifier("luck", ("+", 1.0)).unwrap();
        stack.insert(table, &tree).unwrap();
        assert_eq!(read(&stack, "luck"), 10.0);

        tree.insert("luck", 3.0);
        stack.reindex(&tree);
        assert_eq!(read(&stack, "luck"), 11.0);
    }

    #[test]
    fn test_inactive_table_skipped() {
        let tree = tree();
        let mut stack = ModifierStack::default();
        let mut table = ModifiersTable::new("t");
        table.set_stat_modifier("str", ("+", 1.0)).unwrap();
        stack.insert(table, &tree).unwrap();
        stack.get_mut("t").unwrap().deactivate();
        assert_eq!(read(&stack, "str"), 10.0);
    }
}

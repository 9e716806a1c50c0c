//! Stat tree module.
//!
//! Stats live in a tree of `NestedStats` branches addressed by dotted
//! paths. A branch may carry a wildcard template: any key it does not hold
//! explicitly resolves to a copy of the template, so families such as
//! `skills.<any skill>` need no up-front enumeration. Reads of such keys are
//! served straight from the template; writes materialize a real child.

use crate::error::StatError;
use crate::path::StatPath;
use crate::pool::{Gauge, Pool};
use crate::stat::{Stat, StatKind};
use crate::value::StatValue;
use crate::{alignometer::HistoryAlignometer, compound::CompoundStat, history::HistoryGauge};
use std::collections::BTreeMap;
use tracing::debug;

/// Key that declares, and addresses, a branch's wildcard template.
pub const WILDCARD: &str = "*";

/// A node of the stat tree.
#[derive(Debug, Clone)]
pub enum StatNode {
    Stat(Stat),
    Nested(NestedStats),
}

impl StatNode {
    pub fn path(&self) -> &StatPath {
        match self {
            StatNode::Stat(stat) => stat.path(),
            StatNode::Nested(nested) => nested.path(),
        }
    }

    pub(crate) fn set_path(&mut self, path: StatPath) {
        match self {
            StatNode::Stat(stat) => stat.set_path(path),
            StatNode::Nested(nested) => nested.set_path(path),
        }
    }

    pub fn as_stat(&self) -> Option<&Stat> {
        match self {
            StatNode::Stat(stat) => Some(stat),
            StatNode::Nested(_) => None,
        }
    }

    pub fn as_stat_mut(&mut self) -> Option<&mut Stat> {
        match self {
            StatNode::Stat(stat) => Some(stat),
            StatNode::Nested(_) => None,
        }
    }

    pub fn as_nested(&self) -> Option<&NestedStats> {
        match self {
            StatNode::Nested(nested) => Some(nested),
            StatNode::Stat(_) => None,
        }
    }

    /// Visit every stat at or below this node.
    pub(crate) fn for_each_stat(&self, include_templates: bool, f: &mut dyn FnMut(&Stat)) {
        match self {
            StatNode::Stat(stat) => f(stat),
            StatNode::Nested(nested) => nested.for_each_stat(include_templates, f),
        }
    }
}

impl From<Stat> for StatNode {
    fn from(stat: Stat) -> Self {
        StatNode::Stat(stat)
    }
}

impl From<NestedStats> for StatNode {
    fn from(nested: NestedStats) -> Self {
        StatNode::Nested(nested)
    }
}

macro_rules! stat_node_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for StatNode {
                fn from(value: $t) -> Self {
                    StatNode::Stat(Stat::from(value))
                }
            }
        )*
    };
}

stat_node_from!(
    StatKind,
    StatValue,
    f64,
    &str,
    CompoundStat,
    Pool,
    Gauge,
    HistoryGauge,
    HistoryAlignometer,
);

/// Where a path led and how it got there.
#[derive(Debug, Clone)]
pub struct Located<'a> {
    pub node: &'a StatNode,
    /// The path with every segment served by a template replaced by `*`.
    pub canonical: StatPath,
    /// The first branch the walk left through its wildcard, and the key it
    /// used to do so.
    pub wildcard: Option<(StatPath, String)>,
}

/// How a modifier path matches the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatch {
    /// The path names a concrete stat.
    Concrete,
    /// The path goes through the wildcard of `branch` with child `key`.
    Wildcard { branch: StatPath, key: String },
}

/// A branch of the stat tree.
///
/// # Examples
///
/// ```rust
/// use statstack::{NestedStats, StatPath};
///
/// let mut skills = NestedStats::wild(0.0);
/// skills.insert("swords", 3.0);
///
/// assert!(skills.locate(&StatPath::new("swords")).is_some());
/// let archery = skills.locate(&StatPath::new("archery")).unwrap();
/// assert_eq!(archery.canonical.as_str(), "*");
/// assert_eq!(skills.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NestedStats {
    path: StatPath,
    children: BTreeMap<String, StatNode>,
    wildcard: Option<Box<StatNode>>,
}

impl NestedStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A branch whose unknown keys resolve to `template`.
    pub fn wild(template: impl Into<StatNode>) -> Self {
        let mut nested = Self::new();
        nested.set_wildcard(Some(template.into()));
        nested
    }

    pub fn path(&self) -> &StatPath {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: StatPath) {
        for (key, child) in self.children.iter_mut() {
            child.set_path(path.join(key));
        }
        if let Some(template) = self.wildcard.as_deref_mut() {
            template.set_path(path.join(WILDCARD));
        }
        self.path = path;
    }

    pub fn get(&self, key: &str) -> Option<&StatNode> {
        self.children.get(key)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &StatNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn wildcard(&self) -> Option<&StatNode> {
        self.wildcard.as_deref()
    }

    pub fn is_wild(&self) -> bool {
        self.wildcard.is_some()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Set a child, returning the node it replaced. The `*` key sets the
    /// wildcard template instead.
    pub fn insert(&mut self, key: &str, node: impl Into<StatNode>) -> Option<StatNode> {
        if key == WILDCARD {
            return self.set_wildcard(Some(node.into()));
        }
        let mut node = node.into();
        node.set_path(self.path.join(key));
        self.children.insert(key.to_string(), node)
    }

    pub fn remove(&mut self, key: &str) -> Option<StatNode> {
        if key == WILDCARD {
            return self.set_wildcard(None);
        }
        self.children.remove(key)
    }

    /// Replace the wildcard template, returning the previous one.
    pub fn set_wildcard(&mut self, template: Option<StatNode>) -> Option<StatNode> {
        let template = template.map(|mut t| {
            t.set_path(self.path.join(WILDCARD));
            Box::new(t)
        });
        std::mem::replace(&mut self.wildcard, template).map(|t| *t)
    }

    /// Resolve a path relative to this branch, following wildcard templates
    /// for keys that are not held explicitly.
    pub fn locate(&self, path: &StatPath) -> Option<Located<'_>> {
        let segments: Vec<&str> = path.segments().collect();
        let mut branch = self;
        let mut canonical = self.path.clone();
        let mut wildcard = None;

        for (i, segment) in segments.iter().enumerate() {
            let explicit = if *segment == WILDCARD {
                None
            } else {
                branch.children.get(*segment)
            };
            let child = match explicit {
                Some(child) => {
                    canonical = canonical.join(segment);
                    child
                }
                None => {
                    let template = branch.wildcard.as_deref()?;
                    if wildcard.is_none() && *segment != WILDCARD {
                        wildcard = Some((branch.path.clone(), segment.to_string()));
                    }
                    canonical = canonical.join(WILDCARD);
                    template
                }
            };
            if i + 1 == segments.len() {
                return Some(Located {
                    node: child,
                    canonical,
                    wildcard,
                });
            }
            match child {
                StatNode::Nested(nested) => branch = nested,
                StatNode::Stat(_) => return None,
            }
        }
        None
    }

    /// Whether modifiers may target `path`: it must end at a stat, reached
    /// through explicit children or through wildcard templates.
    pub fn check_modifiable_path(&self, path: &StatPath) -> Option<PathMatch> {
        if path.segments().any(|s| s == WILDCARD) {
            return None;
        }
        let located = self.locate(path)?;
        located.node.as_stat()?;
        Some(match located.wildcard {
            Some((branch, key)) => PathMatch::Wildcard { branch, key },
            None => PathMatch::Concrete,
        })
    }

    /// Child at `key`, creating it from the wildcard template if needed.
    fn child_or_materialize(&mut self, key: &str) -> Option<&mut StatNode> {
        if key == WILDCARD {
            return None;
        }
        if !self.children.contains_key(key) {
            let template = self.wildcard.as_deref()?.clone();
            debug!(path = %self.path.join(key), "materialized wildcard child");
            self.insert(key, template);
        }
        self.children.get_mut(key)
    }

    /// Resolve a path relative to this branch, turning every wildcard step
    /// into a real child.
    pub(crate) fn materialize(&mut self, path: &StatPath) -> Option<&mut StatNode> {
        let segments: Vec<&str> = path.segments().collect();
        let (last, init) = segments.split_last()?;
        let mut branch = self;
        for segment in init {
            branch = match branch.child_or_materialize(segment)? {
                StatNode::Nested(nested) => nested,
                StatNode::Stat(_) => return None,
            };
        }
        branch.child_or_materialize(last)
    }

    /// Number of leading segments of `path` held as real children, without
    /// looking through wildcards. Counting stops after the first stat.
    pub(crate) fn existing_depth(&self, path: &StatPath) -> usize {
        let mut branch = self;
        let mut depth = 0;
        for segment in path.segments() {
            match branch.children.get(segment) {
                Some(StatNode::Nested(nested)) => branch = nested,
                Some(StatNode::Stat(_)) => return depth + 1,
                None => break,
            }
            depth += 1;
        }
        depth
    }

    /// The branch at `path`, materializing wildcard steps. Missing branches
    /// are created when `create` is set.
    pub(crate) fn branch_mut(
        &mut self,
        path: &StatPath,
        create: bool,
    ) -> Result<&mut NestedStats, StatError> {
        let mut branch = self;
        for segment in path.segments() {
            if create
                && segment != WILDCARD
                && !branch.children.contains_key(segment)
                && !branch.is_wild()
            {
                branch.insert(segment, NestedStats::new());
            }
            let here = branch.path.join(segment);
            branch = match branch.child_or_materialize(segment) {
                Some(StatNode::Nested(nested)) => nested,
                Some(StatNode::Stat(_)) => {
                    return Err(StatError::WrongKind {
                        path: here,
                        expected: "branch",
                    })
                }
                None => return Err(StatError::UnknownStat(here)),
            };
        }
        Ok(branch)
    }

    pub(crate) fn for_each_stat(&self, include_templates: bool, f: &mut dyn FnMut(&Stat)) {
        for child in self.children.values() {
            child.for_each_stat(include_templates, f);
        }
        if include_templates {
            if let Some(template) = self.wildcard.as_deref() {
                template.for_each_stat(include_templates, f);
            }
        }
    }
}

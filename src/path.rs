//! Stat path module.
//!
//! Provides the `StatPath` type, the dot-separated address of a node inside
//! a stat tree (e.g. `"hp.max"`). Paths are the join key between stats and
//! the modifier index of their owning table. Uses `Arc<str>` so cloning a
//! path is cheap.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Dot-separated address of a stat or branch inside a stat tree.
///
/// The empty path addresses the root of a tree.
///
/// # Examples
///
/// ```rust
/// use statstack::StatPath;
///
/// let max = StatPath::new("hp.max");
/// assert_eq!(max.segments().collect::<Vec<_>>(), vec!["hp", "max"]);
/// assert_eq!(max.parent(), Some(StatPath::new("hp")));
/// assert_eq!(max.last(), Some("max"));
///
/// let joined = StatPath::new("hp").join("max");
/// assert_eq!(joined, max);
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatPath(Arc<str>);

impl Serialize for StatPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StatPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(StatPath::from(s))
    }
}

impl StatPath {
    /// Create a path from its dotted string form.
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// The root path (no segments).
    pub fn root() -> Self {
        Self(Arc::from(""))
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the dotted string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the segments of this path.
    ///
    /// The root path yields no segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Append a segment (or a dotted sub-path) to this path.
    pub fn join(&self, child: &str) -> Self {
        if self.is_root() {
            Self::new(child)
        } else if child.is_empty() {
            self.clone()
        } else {
            Self(Arc::from(format!("{}{}{}", self.0, SEPARATOR, child)))
        }
    }

    /// The path one level up, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(idx) => Some(Self::new(&self.0[..idx])),
            None => Some(Self::root()),
        }
    }

    /// The last segment, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Whether `self` equals `other` or lies below it.
    pub fn starts_with(&self, other: &StatPath) -> bool {
        if other.is_root() {
            return true;
        }
        match self.0.strip_prefix(other.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }
}

impl Default for StatPath {
    fn default() -> Self {
        Self::root()
    }
}

impl From<&str> for StatPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StatPath {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&StatPath> for StatPath {
    fn from(p: &StatPath) -> Self {
        p.clone()
    }
}

impl std::fmt::Display for StatPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        let path = StatPath::new("skills.swords.level");
        assert_eq!(path.depth(), 3);
        assert_eq!(path.last(), Some("level"));
        assert_eq!(path.parent(), Some(StatPath::new("skills.swords")));
    }

    #[test]
    fn test_root_path() {
        let root = StatPath::root();
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.parent(), None);
        assert_eq!(root.join("hp"), StatPath::new("hp"));
        assert_eq!(StatPath::new("hp").parent(), Some(StatPath::root()));
    }

    #[test]
    fn test_starts_with_respects_segments() {
        let path = StatPath::new("hp.max");
        assert!(path.starts_with(&StatPath::new("hp")));
        assert!(path.starts_with(&StatPath::root()));
        assert!(!StatPath::new("hpx.max").starts_with(&StatPath::new("hp")));
    }
}

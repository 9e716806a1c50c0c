//! Error types for stat configuration and lookup.
//!
//! Only configuration mistakes and invalid lookups are errors. Soft policy
//! outcomes (an unaffordable spend, a modifier aimed at a path that does not
//! exist, an operator applied to the wrong kind of stat) are reported as
//! ordinary return values or silently skipped.

use crate::modifiers_table::ModifiersTable;
use crate::path::StatPath;
use thiserror::Error;

/// Format a cycle path as a readable string.
fn format_cycle_path(path: &[StatPath]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised by the stat engine.
///
/// # Examples
///
/// ```rust
/// use statstack::StatError;
///
/// let err = StatError::UnknownOperator("pow".into());
/// assert_eq!(err.to_string(), "Unknown operator: pow");
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatError {
    /// No operator or alias is registered under this name.
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// A modifier definition was given without an operator.
    #[error("Modifier for {0} has no operator")]
    MissingOperator(StatPath),

    /// The operand cannot be used with the operator.
    #[error("Invalid operand for operator {operator}: {reason}")]
    InvalidOperand { operator: String, reason: String },

    /// A compound stat definition is malformed.
    #[error("Invalid compound stat {0}: {1}")]
    InvalidCompound(StatPath, String),

    /// Compound stats depend on each other in a loop.
    ///
    /// Contains the closed loop, e.g. `[a, b, a]`.
    #[error("Cycle detected: {}", format_cycle_path(.path))]
    Cycle { path: Vec<StatPath> },

    /// A compound stat reads a stat that does not exist.
    #[error("Missing dependency: {0}")]
    MissingDependency(StatPath),

    /// Nothing lives at this path.
    #[error("Unknown stat: {0}")]
    UnknownStat(StatPath),

    /// The node at this path is not of the requested kind.
    #[error("Stat {path} is not a {expected}")]
    WrongKind { path: StatPath, expected: &'static str },

    /// A table with this id is already stacked.
    #[error("Modifiers table already stacked: {0}")]
    AlreadyStacked(String),

    /// No stacked table has this id.
    #[error("Unknown modifiers table: {0}")]
    UnknownTable(String),

    /// Configuration input could not be interpreted.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A modifiers table that could not be stacked, handed back to the caller
/// together with the reason.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct StackError {
    pub error: StatError,
    pub table: Box<ModifiersTable>,
}

impl StackError {
    pub(crate) fn new(error: StatError, table: ModifiersTable) -> Self {
        Self {
            error,
            table: Box::new(table),
        }
    }

    /// Take the rejected table back.
    pub fn into_table(self) -> ModifiersTable {
        *self.table
    }
}

impl From<StackError> for StatError {
    fn from(err: StackError) -> Self {
        err.error
    }
}

impl From<serde_json::Error> for StatError {
    fn from(err: serde_json::Error) -> Self {
        StatError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StatError::UnknownStat(StatPath::new("hp.max"));
        assert!(err.to_string().contains("hp.max"));
    }

    #[test]
    fn test_cycle_error_display() {
        let a = StatPath::new("a");
        let b = StatPath::new("b");
        let err = StatError::Cycle {
            path: vec![a.clone(), b, a],
        };
        assert_eq!(err.to_string(), "Cycle detected: a -> b -> a");
    }

    #[test]
    fn test_stack_error_keeps_table() {
        let err = StackError::new(
            StatError::AlreadyStacked("ring".into()),
            ModifiersTable::new("ring"),
        );
        assert_eq!(err.to_string(), "Modifiers table already stacked: ring");
        assert_eq!(err.table.id(), "ring");
        let err: StatError = err.into();
        assert_eq!(err, StatError::AlreadyStacked("ring".into()));
    }

    #[test]
    fn test_json_error_conversion() {
        let err: StatError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(matches!(err, StatError::InvalidConfig(_)));
    }
}

//! # statstack - Stat Resolution and Modifier Stacking
//!
//! A stat engine for RPG characters that provides:
//! - **Hierarchical** stats addressed by dotted paths (`"skills.swords.rank"`)
//! - **Wildcard** branches whose unknown keys resolve to a template
//! - **Stackable** modifiers tables with a deterministic application order
//! - **Resource** stats: pools, gauges, weighted histories and alignometers
//! - **Compound** stats derived from their siblings, checked for cycles
//!
//! ## Core Concepts
//!
//! ### Reading a stat
//!
//! ```text
//! [base value] → [modifiers, ordered by (group, priority, stacking order)] → [actual value]
//! ```
//!
//! 1. **Stats** hold a base value and never store their modified value
//! 2. **Modifiers tables** bundle operator/operand pairs per stat path
//! 3. **Stats tables** own the tree and the stacked tables and fold the
//!    modifiers on every read
//!
//! ### Key Features
//!
//! - **Operator table**: builtin arithmetic, clamp, text and trait
//!   operators plus aliases, open to host-defined operators
//! - **Events**: tables carry named triggers that activate, deactivate,
//!   remove or fade them
//! - **Breakdowns**: every read can be explained step by step
//! - **JSON configuration** for stat trees and modifiers tables
//!
//! ## Example
//!
//! ```rust
//! use statstack::*;
//! use serde_json::json;
//!
//! let mut stats = StatsTable::from_json(&json!({
//!     "attributes": { "str": 10, "dex": 14 },
//!     "skills": { "*": { "rank": 0 } },
//! }))
//! .unwrap();
//!
//! let mut sword = ModifiersTable::new("sword");
//! sword.set_stat_modifier("attributes.str", ("+", 5.0)).unwrap();
//! sword.set_stat_modifier("attributes.str", ("*", 2.0)).unwrap();
//! sword.set_stat_modifier("skills.swords.rank", ("+", 1.0)).unwrap();
//! stats.stack(sword).unwrap();
//!
//! assert_eq!(stats.number("attributes.str").unwrap(), 30.0); // (10 + 5) * 2
//! assert_eq!(stats.number("skills.swords.rank").unwrap(), 1.0);
//! assert_eq!(stats.number("skills.archery.rank").unwrap(), 0.0);
//!
//! stats.unstack("sword").unwrap();
//! assert_eq!(stats.number("attributes.str").unwrap(), 10.0);
//! ```
//!
//! ## Modules
//!
//! - [`path`] - Dotted stat paths
//! - [`value`] - Stat values and operand types
//! - [`operator`] - Operators, priority groups and the operator table
//! - [`modifier`] - Modifiers and their authoring forms
//! - [`modifiers_table`] - Stackable bundles of modifiers
//! - [`event`] - Scheduled table events
//! - [`stat`] - Stats and stat kinds
//! - [`tree`] - The stat tree and wildcard branches
//! - [`stats_table`] - Main entry point
//! - [`pool`], [`history`], [`alignometer`] - Resource stats
//! - [`compound`] - Derived stats
//! - [`graph`] - Compound dependency graph
//! - [`breakdown`] - Explained stat values
//! - [`config`] - JSON configuration
//! - [`error`] - Error types

pub mod alignometer;
pub mod breakdown;
pub mod compound;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod history;
pub mod modifier;
pub mod modifiers_table;
pub mod operator;
pub mod path;
pub mod pool;
mod stack;
pub mod stat;
pub mod stats_table;
pub mod tree;
pub mod value;

// Re-export main types for convenience
pub use error::{StackError, StatError};
pub use modifiers_table::ModifiersTable;
pub use path::StatPath;
pub use stats_table::StatsTable;
pub use value::{OperandType, Rounding, StatValue};

pub use breakdown::Breakdown;
pub use event::{EventAction, EventSpec, ScheduledEvent};
pub use modifier::{Modifier, ModifierDef, ModifierKey, ModifierSpec};
pub use operator::{Builtin, Operator, OperatorTable, PriorityGroup};
pub use stack::PathModifiers;
pub use stat::{ModifierSource, Stat, StatKind, Unmodified};
pub use tree::{NestedStats, PathMatch, StatNode};

// Re-export stat kinds
pub use alignometer::{AlignEntry, AlignometerOptions, Direction, HistoryAlignometer};
pub use compound::{CompoundContext, CompoundFormula, CompoundOp, CompoundStat};
pub use history::{HistoryEntry, HistoryGauge, HistoryOptions};
pub use pool::{Gauge, GaugeOptions, Pool, PoolOptions};

//! # gantt_core: scheduling core for Gantt project charts
//!
//! The dependency graph engine and transactional command log behind a
//! project-charting tool. It keeps a set of tasks connected by
//! finish-to-start precedence edges and guarantees that every edit is both
//! consistent and reversible:
//!
//! - **Validated dependency CRUD**: self-loops, missing endpoints, duplicate
//!   edges and cycles are rejected before anything is written, with the
//!   offending cycle path spelled out by task name.
//! - **Cycle detection and topological ordering**: iterative DFS over the
//!   (optionally augmented) edge set, plus Kahn's algorithm with
//!   deterministic tie ordering and transitive successor/predecessor queries.
//! - **Cascading date propagation**: tasks are pushed later, never pulled
//!   earlier, by the minimal shift that satisfies every finish-to-start
//!   constraint (with lag), cascading in topological order.
//! - **Bounded undo/redo**: every structural mutation is recorded as a
//!   strongly-typed invertible command; replay is re-entrancy-safe and
//!   fail-safe, and the stack holds the last 100 edits.
//! - **Hierarchy cascade**: indent/outdent/group/ungroup/hide keep summary
//!   ranges derived from their descendants and route through the same
//!   history log.
//!
//! Rendering, gesture capture and file-format versioning live in the host;
//! the `gantt` binary in this crate is a minimal file-backed host shell.

pub mod cli;
pub mod cmd;
pub mod db;
pub mod dependency;
pub mod error;
pub mod fields;
pub mod graph;
pub mod hierarchy;
pub mod history;
pub mod schedule;
pub mod store;
pub mod task;

pub use db::Database;
pub use dependency::{Dependency, DependencyEdit};
pub use error::{Result, ScheduleError};
pub use fields::{DependencyKind, TaskKind};
pub use graph::{detect_cycle, topological_sort, would_create_cycle, CycleCheck};
pub use hierarchy::{SummaryUpdate, MAX_HIERARCHY_DEPTH};
pub use history::{Command, CommandKind, HistoryLog, ReplayOutcome, MAX_UNDO_DEPTH};
pub use schedule::{calculate_date_adjustments, check_dependency_violations};
pub use task::{DateAdjustment, Task};

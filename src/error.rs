//! Error types for scheduling operations.
//!
//! Expected validation failures are values, not panics: every mutating
//! operation validates fully before touching state and returns one of these
//! variants on rejection.

use thiserror::Error;

/// Result type for scheduling operations.
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Validation failures surfaced to the host with a displayable message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// A task cannot depend on itself.
    #[error("a task cannot depend on itself (task {task_id})")]
    SelfDependency { task_id: u64 },

    /// One endpoint of a candidate edge does not exist.
    #[error("task {task_id} does not exist")]
    MissingTask { task_id: u64 },

    /// The ordered pair already has an edge.
    #[error("dependency from {from} to {to} already exists")]
    DuplicateDependency { from: u64, to: u64 },

    /// Committing the edge would close a cycle. `path` names each task on
    /// the cycle in order, ending back at the first.
    #[error("circular dependency: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    /// Reparenting would exceed the fixed nesting bound.
    #[error("hierarchy depth limit of {max} exceeded")]
    DepthExceeded { max: usize },

    /// A task may never become its own descendant's child.
    #[error("circular parentage: task {task_id} cannot be nested under its own descendant")]
    CircularParentage { task_id: u64 },

    /// The operation's structural precondition does not hold
    /// (e.g. indenting the first row, ungrouping a non-summary).
    #[error("{0}")]
    InvalidOperation(String),

    /// Grouped tasks must share a single parent.
    #[error("cannot group tasks with different parents")]
    MixedParents,
}

//! Enumerations and field types for the scheduling core.
//!
//! This module defines the closed sets used to classify tasks and dependency
//! edges: task kinds (leaf task, summary, milestone) and the four classic
//! dependency link types.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Structural role of a task within the chart.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Ordinary schedulable bar with authoritative dates.
    #[serde(alias = "Task")]
    Task,
    /// Container whose date range is derived from its descendants.
    #[serde(alias = "Summary")]
    Summary,
    /// Zero-duration marker; only the start date is meaningful.
    #[serde(alias = "Milestone")]
    Milestone,
}

/// Dependency link type between two tasks.
///
/// The data model carries all four classic types so files produced by other
/// charting tools round-trip, but only finish-to-start semantics are
/// implemented by the propagation engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
pub enum DependencyKind {
    /// Finish-to-start: successor may not start until predecessor finishes.
    #[serde(rename = "FS")]
    #[value(name = "fs")]
    FinishToStart,
    /// Start-to-start (stored, not scheduled).
    #[serde(rename = "SS")]
    #[value(name = "ss")]
    StartToStart,
    /// Finish-to-finish (stored, not scheduled).
    #[serde(rename = "FF")]
    #[value(name = "ff")]
    FinishToFinish,
    /// Start-to-finish (stored, not scheduled).
    #[serde(rename = "SF")]
    #[value(name = "sf")]
    StartToFinish,
}

/// Format a task kind for display.
pub fn format_task_kind(k: TaskKind) -> &'static str {
    match k {
        TaskKind::Task => "Task",
        TaskKind::Summary => "Summary",
        TaskKind::Milestone => "Milestone",
    }
}

/// Format a dependency kind for display.
pub fn format_dependency_kind(k: DependencyKind) -> &'static str {
    match k {
        DependencyKind::FinishToStart => "FS",
        DependencyKind::StartToStart => "SS",
        DependencyKind::FinishToFinish => "FF",
        DependencyKind::StartToFinish => "SF",
    }
}

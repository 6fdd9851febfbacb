//! Dependency edge data structure.
//!
//! A dependency is a directed finish-to-start constraint between two tasks.
//! The persisted field names are camelCase to match the host chart file
//! format (`{id, fromTaskId, toTaskId, type, lag, createdAt}`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::DependencyKind;

/// A directed dependency edge: `from` must finish before `to` may start,
/// offset by `lag` days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub id: u64,
    pub from_task_id: u64,
    pub to_task_id: u64,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    /// Signed day offset: positive requires a gap, negative allows overlap.
    #[serde(default)]
    pub lag: i64,
    pub created_at: DateTime<Utc>,
}

impl Dependency {
    /// Whether this edge touches the given task on either end.
    pub fn touches(&self, task_id: u64) -> bool {
        self.from_task_id == task_id || self.to_task_id == task_id
    }
}

/// The mutable subset of a dependency. Endpoints and id are fixed at
/// creation so edits can never bypass cycle validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdit {
    pub kind: DependencyKind,
    pub lag: i64,
}

impl From<&Dependency> for DependencyEdit {
    fn from(d: &Dependency) -> Self {
        DependencyEdit {
            kind: d.kind,
            lag: d.lag,
        }
    }
}

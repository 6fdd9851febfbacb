//! Task data structure and related types.
//!
//! This module defines the `Task` struct representing a single chart row with
//! its dates, hierarchy position and display metadata, plus the patch and
//! date-adjustment types the scheduling engine trades in.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fields::TaskKind;

/// A schedulable chart row.
///
/// Tasks form a forest through `parent`; a `Summary` task's range is always
/// derived from its descendants and a `Milestone` keeps `end == start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub name: String,
    /// First day of the bar, inclusive.
    pub start: NaiveDate,
    /// Last day of the bar, inclusive.
    pub end: NaiveDate,
    /// Completion percentage, 0-100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub color: Option<String>,
    /// Stable display sequencing across the whole chart.
    pub order: u32,
    pub kind: TaskKind,
    pub parent: Option<u64>,
    /// Expanded/collapsed flag for summary rows.
    #[serde(default = "default_open")]
    pub open: bool,
    #[serde(default)]
    pub hidden: bool,
    /// Free-form metadata carried for the host, never interpreted here.
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
}

fn default_open() -> bool {
    true
}

impl Task {
    /// Duration in days, inclusive of both endpoints. Milestones are zero.
    pub fn duration_days(&self) -> i64 {
        if matches!(self.kind, TaskKind::Milestone) {
            return 0;
        }
        (self.end - self.start).num_days() + 1
    }

    /// The day this task finishes for finish-to-start purposes.
    /// A milestone "finishes" on its start date.
    pub fn finish(&self) -> NaiveDate {
        if matches!(self.kind, TaskKind::Milestone) {
            self.start
        } else {
            self.end
        }
    }
}

/// A computed date shift for one task: the before/after record produced by
/// the propagation engine and captured into command payloads so cascades
/// can be reversed exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateAdjustment {
    pub task_id: u64,
    pub old_start: NaiveDate,
    pub old_end: NaiveDate,
    pub new_start: NaiveDate,
    pub new_end: NaiveDate,
}

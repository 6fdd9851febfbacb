//! Cascading date propagation for finish-to-start constraints.
//!
//! Given a changed task, the engine walks the topological order and computes
//! the minimal forward shift each downstream task needs so that it starts no
//! earlier than every predecessor's finish plus one day plus lag. Shifts
//! preserve duration and cascade transitively; tasks are only ever pushed
//! later, never pulled earlier, so satisfying one constraint can never
//! un-satisfy another.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::db::Database;
use crate::dependency::Dependency;
use crate::fields::{DependencyKind, TaskKind};
use crate::graph::topological_sort;
use crate::hierarchy::recalculate_summary_ancestors;
use crate::history::{CommandKind, HistoryLog};
use crate::task::{DateAdjustment, Task};

/// A finish-to-start constraint that current dates do not satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub dependency_id: u64,
    pub from_task_id: u64,
    pub to_task_id: u64,
    /// Earliest start the constraint permits.
    pub required_start: NaiveDate,
    /// Where the successor actually starts today.
    pub actual_start: NaiveDate,
}

/// Working copy of one task's dates during a propagation pass.
#[derive(Clone, Copy)]
struct WorkDates {
    start: NaiveDate,
    end: NaiveDate,
    kind: TaskKind,
}

impl WorkDates {
    fn finish(&self) -> NaiveDate {
        if matches!(self.kind, TaskKind::Milestone) {
            self.start
        } else {
            self.end
        }
    }
}

fn incoming_fs_edges(dependencies: &[Dependency]) -> HashMap<u64, Vec<&Dependency>> {
    let mut map: HashMap<u64, Vec<&Dependency>> = HashMap::new();
    for dep in dependencies {
        // Only finish-to-start edges constrain the schedule; the other
        // kinds are stored for round-tripping but not enforced.
        if dep.kind == DependencyKind::FinishToStart {
            map.entry(dep.to_task_id).or_default().push(dep);
        }
    }
    map
}

/// Compute the minimal forward shifts needed downstream of `changed_task_id`
/// (or across the whole chart when `None`). Nothing is mutated; the caller
/// decides whether to apply the returned adjustments.
pub fn calculate_date_adjustments(
    tasks: &[Task],
    dependencies: &[Dependency],
    changed_task_id: Option<u64>,
) -> Vec<DateAdjustment> {
    let incoming = incoming_fs_edges(dependencies);
    let order = topological_sort(tasks, dependencies);

    let mut work: HashMap<u64, WorkDates> = tasks
        .iter()
        .map(|t| {
            (
                t.id,
                WorkDates {
                    start: t.start,
                    end: t.end,
                    kind: t.kind,
                },
            )
        })
        .collect();

    // Everything at or before the changed task already holds; the cascade
    // can only begin just after it in topological order.
    let from = match changed_task_id {
        Some(id) => order.iter().position(|&t| t == id).map_or(0, |i| i + 1),
        None => 0,
    };

    let mut adjustments = Vec::new();
    for &task_id in &order[from..] {
        let Some(edges) = incoming.get(&task_id) else {
            continue;
        };
        let current = work[&task_id];

        let mut required: Option<NaiveDate> = None;
        for dep in edges {
            let Some(pred) = work.get(&dep.from_task_id) else {
                continue;
            };
            let earliest = pred.finish() + Duration::days(1 + dep.lag);
            required = Some(match required {
                Some(r) => r.max(earliest),
                None => earliest,
            });
        }
        let Some(required) = required else { continue };

        if current.start < required {
            let delta = required - current.start;
            let shifted = WorkDates {
                start: current.start + delta,
                end: current.end + delta,
                kind: current.kind,
            };
            debug!(
                task = task_id,
                days = delta.num_days(),
                "task shifted forward by cascade"
            );
            adjustments.push(DateAdjustment {
                task_id,
                old_start: current.start,
                old_end: current.end,
                new_start: shifted.start,
                new_end: shifted.end,
            });
            work.insert(task_id, shifted);
        }
    }

    adjustments
}

/// Report every finish-to-start constraint the current dates violate.
/// Read-only diagnostic over the same required-start formula.
pub fn check_dependency_violations(tasks: &[Task], dependencies: &[Dependency]) -> Vec<Violation> {
    let by_id: HashMap<u64, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
    let mut violations = Vec::new();
    for dep in dependencies {
        if dep.kind != DependencyKind::FinishToStart {
            continue;
        }
        let (Some(pred), Some(succ)) = (by_id.get(&dep.from_task_id), by_id.get(&dep.to_task_id))
        else {
            continue;
        };
        let required = pred.finish() + Duration::days(1 + dep.lag);
        if succ.start < required {
            violations.push(Violation {
                dependency_id: dep.id,
                from_task_id: dep.from_task_id,
                to_task_id: dep.to_task_id,
                required_start: required,
                actual_start: succ.start,
            });
        }
    }
    violations
}

/// Commit a batch date move as one atomic, undoable command.
///
/// This is the landing point for a multi-select drag: the gesture reports
/// only its final `(task id, new start)` pairs, each bar keeps its duration,
/// and affected summary ranges are recomputed in the same command. Returns
/// how many tasks actually moved; zero is a quiet no-op.
pub fn move_tasks(
    db: &mut Database,
    moves: &[(u64, NaiveDate)],
    history: &mut HistoryLog,
) -> usize {
    let mut adjustments = Vec::new();
    for &(task_id, new_start) in moves {
        let Some(task) = db.task(task_id) else { continue };
        if task.start == new_start {
            continue;
        }
        let delta = new_start - task.start;
        adjustments.push(DateAdjustment {
            task_id,
            old_start: task.start,
            old_end: task.end,
            new_start,
            new_end: task.end + delta,
        });
    }
    if adjustments.is_empty() {
        return 0;
    }
    commit_moves(db, adjustments, "Move", history)
}

/// Compute the cascade the current constraints require, apply it, and record
/// it as one undoable command. This is the explicit propagation step a host
/// invokes after an edit that may have left successors violated.
pub fn propagate(
    db: &mut Database,
    changed_task_id: Option<u64>,
    history: &mut HistoryLog,
) -> usize {
    let adjustments = calculate_date_adjustments(&db.tasks, &db.dependencies, changed_task_id);
    if adjustments.is_empty() {
        return 0;
    }
    commit_moves(db, adjustments, "Reschedule", history)
}

fn commit_moves(
    db: &mut Database,
    adjustments: Vec<DateAdjustment>,
    verb: &str,
    history: &mut HistoryLog,
) -> usize {
    db.apply_adjustments(&adjustments);
    let changed_parents: Vec<u64> = adjustments
        .iter()
        .filter_map(|a| db.task(a.task_id).and_then(|t| t.parent))
        .collect();
    let summary_updates = recalculate_summary_ancestors(db, &changed_parents);
    let count = adjustments.len();
    history.record(
        format!("{verb} {count} tasks"),
        CommandKind::MoveTasks {
            moves: adjustments,
            summary_updates,
        },
    );
    db.mark_dirty();
    count
}

/// The earliest start date the incoming constraints allow for `task_id`,
/// or `None` when nothing constrains it.
pub fn earliest_start_date(
    tasks: &[Task],
    dependencies: &[Dependency],
    task_id: u64,
) -> Option<NaiveDate> {
    let by_id: HashMap<u64, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
    dependencies
        .iter()
        .filter(|d| d.kind == DependencyKind::FinishToStart && d.to_task_id == task_id)
        .filter_map(|d| {
            by_id
                .get(&d.from_task_id)
                .map(|pred| pred.finish() + Duration::days(1 + d.lag))
        })
        .max()
}

//! Dependency CRUD with validation gating every mutation.
//!
//! All writes to the dependency list funnel through here. Validation runs
//! entirely before the first write, so a rejected call leaves no partial
//! state behind; committed mutations are recorded on the history log and
//! mark the document dirty.

use chrono::Utc;
use tracing::debug;

use crate::db::Database;
use crate::dependency::{Dependency, DependencyEdit};
use crate::error::{Result, ScheduleError};
use crate::fields::DependencyKind;
use crate::graph::{detect_cycle, would_create_cycle};
use crate::history::{CommandKind, HistoryLog};
use crate::schedule::calculate_date_adjustments;
use crate::task::DateAdjustment;

/// Result of a committed `add_dependency`: the new edge plus whatever
/// cascade was applied alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedDependency {
    pub dependency: Dependency,
    pub date_adjustments: Vec<DateAdjustment>,
}

impl Database {
    /// Create a finish-to-start (or stored-only other-kind) dependency after
    /// full validation: self-loop, missing endpoints, duplicate pair, then
    /// cycle. Only a fully valid edge is committed, recorded and marked
    /// dirty.
    ///
    /// Inserting the edge never moves task dates by itself; pass
    /// `cascade = true` to fold the explicit propagation step into the same
    /// recorded command, so one undo reverses both.
    pub fn add_dependency(
        &mut self,
        from: u64,
        to: u64,
        kind: DependencyKind,
        lag: i64,
        cascade: bool,
        history: &mut HistoryLog,
    ) -> Result<AddedDependency> {
        if from == to {
            return Err(ScheduleError::SelfDependency { task_id: from });
        }
        for endpoint in [from, to] {
            if self.task(endpoint).is_none() {
                return Err(ScheduleError::MissingTask { task_id: endpoint });
            }
        }
        if self.has_dependency(from, to) {
            return Err(ScheduleError::DuplicateDependency { from, to });
        }
        let check = detect_cycle(&self.dependencies, Some((from, to)));
        if check.has_cycle {
            let path = check
                .cycle_path
                .unwrap_or_default()
                .iter()
                .map(|&id| self.task_name_or_id(id))
                .collect();
            return Err(ScheduleError::CircularDependency { path });
        }

        let dependency = Dependency {
            id: self.next_dependency_id(),
            from_task_id: from,
            to_task_id: to,
            kind,
            lag,
            created_at: Utc::now(),
        };
        debug!(id = dependency.id, from, to, "dependency added");
        self.dependencies.push(dependency.clone());

        let date_adjustments = if cascade {
            let adjustments = calculate_date_adjustments(&self.tasks, &self.dependencies, Some(from));
            self.apply_adjustments(&adjustments);
            adjustments
        } else {
            Vec::new()
        };

        history.record(
            format!(
                "Link {} -> {}",
                self.task_name_or_id(from),
                self.task_name_or_id(to)
            ),
            CommandKind::AddDependency {
                dependency: dependency.clone(),
                date_adjustments: date_adjustments.clone(),
            },
        );
        self.mark_dirty();

        Ok(AddedDependency {
            dependency,
            date_adjustments,
        })
    }

    /// Remove a dependency by ID. A missing target is a silent no-op
    /// (`None`), never an error.
    pub fn remove_dependency(&mut self, id: u64, history: &mut HistoryLog) -> Option<Dependency> {
        let pos = self.dependencies.iter().position(|d| d.id == id)?;
        let removed = self.dependencies.remove(pos);
        if self.selected_dependency == Some(id) {
            self.selected_dependency = None;
        }
        debug!(id, "dependency removed");
        history.record(
            format!(
                "Unlink {} -> {}",
                self.task_name_or_id(removed.from_task_id),
                self.task_name_or_id(removed.to_task_id)
            ),
            CommandKind::RemoveDependency {
                dependency: removed.clone(),
            },
        );
        self.mark_dirty();
        Some(removed)
    }

    /// Edit the mutable subset of a dependency (kind and lag). Endpoints and
    /// id are immutable post-creation, so an edit can never sneak past cycle
    /// validation. Returns the previous values, or `None` when the target is
    /// missing (silent no-op).
    pub fn update_dependency(
        &mut self,
        id: u64,
        edit: DependencyEdit,
        history: &mut HistoryLog,
    ) -> Option<DependencyEdit> {
        let dep = self.dependencies.iter_mut().find(|d| d.id == id)?;
        let previous = DependencyEdit::from(&*dep);
        if previous == edit {
            // Nothing changes; don't pollute the history.
            return Some(previous);
        }
        dep.kind = edit.kind;
        dep.lag = edit.lag;
        let (from, to) = (dep.from_task_id, dep.to_task_id);
        let description = format!(
            "Edit link {} -> {}",
            self.task_name_or_id(from),
            self.task_name_or_id(to)
        );
        history.record(
            description,
            CommandKind::UpdateDependency {
                id,
                previous,
                next: edit,
            },
        );
        self.mark_dirty();
        Some(previous)
    }

    /// Remove every edge touching `task_id` and return the removed set.
    ///
    /// This is always a sub-step of a larger operation (task deletion,
    /// ungroup), so it records no history itself; the caller folds the
    /// returned set into its own command.
    pub fn remove_dependencies_for_task(&mut self, task_id: u64) -> Vec<Dependency> {
        let all = std::mem::take(&mut self.dependencies);
        let (removed, kept): (Vec<Dependency>, Vec<Dependency>) =
            all.into_iter().partition(|d| d.touches(task_id));
        self.dependencies = kept;
        if let Some(sel) = self.selected_dependency {
            if removed.iter().any(|d| d.id == sel) {
                self.selected_dependency = None;
            }
        }
        if !removed.is_empty() {
            debug!(task = task_id, count = removed.len(), "dependencies removed for task");
            self.mark_dirty();
        }
        removed
    }

    /// Every edge touching the task, on either end.
    pub fn dependencies_for_task(&self, task_id: u64) -> Vec<&Dependency> {
        self.dependencies.iter().filter(|d| d.touches(task_id)).collect()
    }

    pub fn dependency_by_id(&self, id: u64) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.id == id)
    }

    /// Whether an edge already exists for the ordered pair.
    pub fn has_dependency(&self, from: u64, to: u64) -> bool {
        self.dependencies
            .iter()
            .any(|d| d.from_task_id == from && d.to_task_id == to)
    }

    /// Pre-flight check for interactive edge drawing: would committing
    /// `from -> to` close a cycle?
    pub fn check_would_create_cycle(&self, from: u64, to: u64) -> bool {
        would_create_cycle(&self.dependencies, from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::TaskKind;
    use crate::task::Task;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn named(id: u64, name: &str) -> Task {
        Task {
            id,
            name: name.to_string(),
            start: day(1),
            end: day(3),
            progress: 0,
            color: None,
            order: id as u32,
            kind: TaskKind::Task,
            parent: None,
            open: true,
            hidden: false,
            meta: Default::default(),
        }
    }

    fn db_with(names: &[&str]) -> Database {
        Database {
            tasks: names
                .iter()
                .enumerate()
                .map(|(i, n)| named(i as u64 + 1, n))
                .collect(),
            ..Default::default()
        }
    }

    fn add(db: &mut Database, from: u64, to: u64, history: &mut HistoryLog) -> Result<AddedDependency> {
        db.add_dependency(from, to, DependencyKind::FinishToStart, 0, false, history)
    }

    #[test]
    fn add_validates_in_order() {
        let mut db = db_with(&["a", "b"]);
        let mut history = HistoryLog::new();

        assert_eq!(
            add(&mut db, 1, 1, &mut history),
            Err(ScheduleError::SelfDependency { task_id: 1 })
        );
        assert_eq!(
            add(&mut db, 1, 99, &mut history),
            Err(ScheduleError::MissingTask { task_id: 99 })
        );
        add(&mut db, 1, 2, &mut history).unwrap();
        assert_eq!(
            add(&mut db, 1, 2, &mut history),
            Err(ScheduleError::DuplicateDependency { from: 1, to: 2 })
        );
        // Failed validations never reached the edge list.
        assert_eq!(db.dependencies.len(), 1);
    }

    #[test]
    fn cycle_error_names_the_full_path() {
        let mut db = db_with(&["Foundation", "Walls", "Roof"]);
        let mut history = HistoryLog::new();
        add(&mut db, 1, 2, &mut history).unwrap();
        add(&mut db, 2, 3, &mut history).unwrap();

        let err = add(&mut db, 3, 1, &mut history).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("circular dependency"));
        assert!(msg.contains("Foundation -> Walls -> Roof -> Foundation"));
        assert_eq!(db.dependencies.len(), 2);
    }

    #[test]
    fn cycle_path_falls_back_to_raw_ids() {
        let mut db = db_with(&["a", "b"]);
        let mut history = HistoryLog::new();
        add(&mut db, 1, 2, &mut history).unwrap();
        // Task 1 disappears but its edge remains (caller skipped cleanup).
        db.tasks.retain(|t| t.id != 1);
        let err = add(&mut db, 2, 1, &mut history).unwrap_err();
        assert!(err.to_string().contains("1 -> b -> 1"));
    }

    #[test]
    fn add_without_cascade_moves_no_dates() {
        let mut db = db_with(&["a", "b"]);
        db.tasks[0].end = day(10);
        db.tasks[1].start = day(5);
        db.tasks[1].end = day(7);
        let mut history = HistoryLog::new();
        let added = add(&mut db, 1, 2, &mut history).unwrap();
        assert!(added.date_adjustments.is_empty());
        assert_eq!(db.task(2).unwrap().start, day(5));
    }

    #[test]
    fn add_with_cascade_folds_shift_into_one_command() {
        let mut db = db_with(&["a", "b"]);
        db.tasks[0].end = day(10);
        db.tasks[1].start = day(5);
        db.tasks[1].end = day(7);
        let mut history = HistoryLog::new();
        let added = db
            .add_dependency(1, 2, DependencyKind::FinishToStart, 0, true, &mut history)
            .unwrap();
        assert_eq!(added.date_adjustments.len(), 1);
        assert_eq!(db.task(2).unwrap().start, day(11));

        // One undo reverses both the edge and the shift.
        history.undo(&mut db);
        assert!(db.dependencies.is_empty());
        assert_eq!(db.task(2).unwrap().start, day(5));
        assert_eq!(db.task(2).unwrap().end, day(7));
    }

    #[test]
    fn remove_and_update_are_silent_noops_when_missing() {
        let mut db = db_with(&["a"]);
        let mut history = HistoryLog::new();
        assert!(db.remove_dependency(42, &mut history).is_none());
        assert!(db
            .update_dependency(
                42,
                DependencyEdit {
                    kind: DependencyKind::FinishToStart,
                    lag: 2
                },
                &mut history
            )
            .is_none());
        assert!(!history.can_undo());
        assert!(!db.dirty);
    }

    #[test]
    fn update_captures_previous_values() {
        let mut db = db_with(&["a", "b"]);
        let mut history = HistoryLog::new();
        let added = add(&mut db, 1, 2, &mut history).unwrap();
        let prev = db
            .update_dependency(
                added.dependency.id,
                DependencyEdit {
                    kind: DependencyKind::FinishToStart,
                    lag: 3,
                },
                &mut history,
            )
            .unwrap();
        assert_eq!(prev.lag, 0);
        assert_eq!(db.dependency_by_id(added.dependency.id).unwrap().lag, 3);

        history.undo(&mut db);
        assert_eq!(db.dependency_by_id(added.dependency.id).unwrap().lag, 0);
        history.redo(&mut db);
        assert_eq!(db.dependency_by_id(added.dependency.id).unwrap().lag, 3);
    }

    #[test]
    fn bulk_removal_spares_other_edges_and_clears_selection() {
        let mut db = db_with(&["a", "b", "c"]);
        let mut history = HistoryLog::new();
        let ab = add(&mut db, 1, 2, &mut history).unwrap();
        let bc = add(&mut db, 2, 3, &mut history).unwrap();
        let ac = add(&mut db, 1, 3, &mut history).unwrap();
        db.selected_dependency = Some(ab.dependency.id);

        let removed = db.remove_dependencies_for_task(1);
        let removed_ids: Vec<u64> = removed.iter().map(|d| d.id).collect();
        assert_eq!(removed_ids, vec![ab.dependency.id, ac.dependency.id]);
        assert_eq!(db.dependencies.len(), 1);
        assert_eq!(db.dependencies[0].id, bc.dependency.id);
        assert!(db.selected_dependency.is_none());
    }

    #[test]
    fn queries() {
        let mut db = db_with(&["a", "b", "c"]);
        let mut history = HistoryLog::new();
        let ab = add(&mut db, 1, 2, &mut history).unwrap();
        add(&mut db, 2, 3, &mut history).unwrap();

        assert!(db.has_dependency(1, 2));
        assert!(!db.has_dependency(2, 1));
        assert_eq!(db.dependencies_for_task(2).len(), 2);
        assert_eq!(
            db.dependency_by_id(ab.dependency.id).unwrap().to_task_id,
            2
        );
        assert!(db.check_would_create_cycle(3, 1));
        assert!(db.check_would_create_cycle(2, 2));
        assert!(!db.check_would_create_cycle(1, 3));
    }

    #[test]
    fn undo_of_remove_restores_the_edge() {
        let mut db = db_with(&["a", "b"]);
        let mut history = HistoryLog::new();
        let added = add(&mut db, 1, 2, &mut history).unwrap();
        db.remove_dependency(added.dependency.id, &mut history);
        assert!(db.dependencies.is_empty());

        history.undo(&mut db);
        assert_eq!(db.dependencies.len(), 1);
        assert!(db.has_dependency(1, 2));

        history.redo(&mut db);
        assert!(db.dependencies.is_empty());
    }
}

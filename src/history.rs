//! Invertible command log with bounded undo/redo.
//!
//! Every user-level mutation is recorded as a `Command`: a closed sum type
//! whose variants each carry their own strongly-typed forward and inverse
//! payload, captured as owned deep copies at record time. The log keeps a
//! single undo stack and a single redo stack; replay re-entry is suppressed
//! by an explicit three-state mode, so a replayed mutation can never record
//! itself as new history.
//!
//! Replay is fail-safe: a command whose executor fails (say, a referenced
//! task has since been deleted) is permanently evicted from its stack rather
//! than left to jam every later undo/redo call.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::db::Database;
use crate::dependency::{Dependency, DependencyEdit};
use crate::hierarchy::SummaryUpdate;
use crate::task::{DateAdjustment, Task};

/// Maximum commands retained on the undo stack; the oldest entry is evicted
/// once the stack grows past this.
pub const MAX_UNDO_DEPTH: usize = 100;

/// Variant-specific payload of one recorded mutation. Each variant carries
/// everything needed to reverse the operation and to reproduce it, without
/// re-reading volatile state at undo time.
#[derive(Debug, Clone)]
pub enum CommandKind {
    /// A dependency was created; `date_adjustments` is whatever cascade the
    /// caller applied alongside it (possibly empty).
    AddDependency {
        dependency: Dependency,
        date_adjustments: Vec<DateAdjustment>,
    },
    /// A dependency was removed.
    RemoveDependency { dependency: Dependency },
    /// A dependency's mutable fields were edited.
    UpdateDependency {
        id: u64,
        previous: DependencyEdit,
        next: DependencyEdit,
    },
    /// A batch date move (multi-select drag), plus the summary-range cascade
    /// it triggered.
    MoveTasks {
        moves: Vec<DateAdjustment>,
        summary_updates: Vec<SummaryUpdate>,
    },
    /// A task was nested under its preceding sibling.
    Indent {
        task_id: u64,
        old_parent: Option<u64>,
        new_parent: Option<u64>,
        summary_updates: Vec<SummaryUpdate>,
    },
    /// A task was promoted to its grandparent's level.
    Outdent {
        task_id: u64,
        old_parent: Option<u64>,
        new_parent: Option<u64>,
        summary_updates: Vec<SummaryUpdate>,
    },
    /// A new summary was created over `members`; each member records its
    /// prior parent.
    Group {
        summary: Task,
        members: Vec<(u64, Option<u64>)>,
        summary_updates: Vec<SummaryUpdate>,
    },
    /// A summary was dissolved: children reparented, the summary deleted and
    /// its touching dependencies removed. Each child tuple carries the
    /// parent it was moved to (the summary's former parent); undo puts it
    /// back under the summary.
    Ungroup {
        summary: Task,
        children: Vec<(u64, Option<u64>)>,
        removed_dependencies: Vec<Dependency>,
        summary_updates: Vec<SummaryUpdate>,
    },
    /// Tasks were hidden; `previous` snapshots the exact prior hidden flag
    /// of every affected task, already-hidden ones included.
    HideTasks { previous: Vec<(u64, bool)> },
    /// Pure clipboard copy: recorded for the host's command trail but has no
    /// observable effect on persisted state, so replay is a no-op and never
    /// dirties the document.
    CopyTasks { task_ids: Vec<u64> },
}

/// One recorded, invertible user-level mutation.
#[derive(Debug, Clone)]
pub struct Command {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub kind: CommandKind,
}

impl Command {
    /// Whether this command touches persisted data. Non-data commands never
    /// mark the document dirty on replay.
    pub fn is_data(&self) -> bool {
        !matches!(self.kind, CommandKind::CopyTasks { .. })
    }
}

/// What the executor is currently doing. Making this a single enum (rather
/// than two booleans) leaves the both-flags-set state unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplayMode {
    Idle,
    Undoing,
    Redoing,
}

/// Result of an `undo`/`redo` call, carrying the message text the host may
/// surface. Failures here are replay failures, not validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// The command was replayed; `description` names it.
    Applied { description: String },
    /// Empty stack: nothing to do, not an error.
    NothingToDo,
    /// The executor failed; the offending command has been discarded.
    Failed { message: String },
}

/// Session-scoped undo/redo log. Never persisted; the host clears it on
/// every file load.
#[derive(Debug, Default)]
pub struct HistoryLog {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    mode: ReplayMode,
    next_id: u64,
}

impl Default for ReplayMode {
    fn default() -> Self {
        ReplayMode::Idle
    }
}

impl HistoryLog {
    pub fn new() -> Self {
        HistoryLog::default()
    }

    /// Record a freshly-applied mutation. Ignored while a replay is in
    /// flight. Recording clears the redo stack and evicts the oldest entry
    /// once the undo stack exceeds [`MAX_UNDO_DEPTH`].
    pub fn record(&mut self, description: impl Into<String>, kind: CommandKind) {
        if self.mode != ReplayMode::Idle {
            debug!("replay in progress; not recording");
            return;
        }
        self.next_id += 1;
        let cmd = Command {
            id: self.next_id,
            timestamp: Utc::now(),
            description: description.into(),
            kind,
        };
        debug!(id = cmd.id, desc = %cmd.description, "recorded command");
        self.undo_stack.push(cmd);
        self.redo_stack.clear();
        if self.undo_stack.len() > MAX_UNDO_DEPTH {
            self.undo_stack.remove(0);
        }
    }

    /// Reverse the most recent command. On success it moves to the redo
    /// stack; on executor failure it is discarded so the next undo still
    /// works.
    pub fn undo(&mut self, db: &mut Database) -> ReplayOutcome {
        let Some(cmd) = self.undo_stack.pop() else {
            return ReplayOutcome::NothingToDo;
        };
        self.mode = ReplayMode::Undoing;
        let result = apply_inverse(&cmd.kind, db);
        self.mode = ReplayMode::Idle;

        match result {
            Ok(()) => {
                if cmd.is_data() {
                    db.mark_dirty();
                }
                let description = cmd.description.clone();
                self.redo_stack.push(cmd);
                ReplayOutcome::Applied { description }
            }
            Err(e) => {
                warn!(id = cmd.id, error = %e, "undo failed; command discarded");
                ReplayOutcome::Failed {
                    message: format!("Undo failed: {}", cmd.description),
                }
            }
        }
    }

    /// Re-apply the most recently undone command. Volatile sub-state (such
    /// as which dependencies currently exist) is read fresh rather than
    /// trusted from the captured snapshot, and the payload is refreshed so
    /// a following undo reverses what actually happened.
    pub fn redo(&mut self, db: &mut Database) -> ReplayOutcome {
        let Some(mut cmd) = self.redo_stack.pop() else {
            return ReplayOutcome::NothingToDo;
        };
        self.mode = ReplayMode::Redoing;
        let result = apply_forward(&mut cmd.kind, db);
        self.mode = ReplayMode::Idle;

        match result {
            Ok(()) => {
                if cmd.is_data() {
                    db.mark_dirty();
                }
                let description = cmd.description.clone();
                self.undo_stack.push(cmd);
                ReplayOutcome::Applied { description }
            }
            Err(e) => {
                warn!(id = cmd.id, error = %e, "redo failed; command discarded");
                ReplayOutcome::Failed {
                    message: format!("Redo failed: {}", cmd.description),
                }
            }
        }
    }

    /// Drop all history. Called whenever a new document is loaded.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|c| c.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.description.as_str())
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
}

type ReplayResult = std::result::Result<(), String>;

fn find_task_mut<'a>(db: &'a mut Database, id: u64) -> std::result::Result<&'a mut Task, String> {
    db.task_mut(id).ok_or_else(|| format!("task {id} no longer exists"))
}

fn revert_moves(db: &mut Database, moves: &[DateAdjustment]) -> ReplayResult {
    for adj in moves {
        let t = find_task_mut(db, adj.task_id)?;
        t.start = adj.old_start;
        t.end = adj.old_end;
    }
    Ok(())
}

fn apply_moves(db: &mut Database, moves: &[DateAdjustment]) -> ReplayResult {
    for adj in moves {
        let t = find_task_mut(db, adj.task_id)?;
        t.start = adj.new_start;
        t.end = adj.new_end;
    }
    Ok(())
}

fn revert_summary_updates(db: &mut Database, updates: &[SummaryUpdate]) -> ReplayResult {
    for u in updates {
        let t = find_task_mut(db, u.id)?;
        t.start = u.previous_start;
        t.end = u.previous_end;
    }
    Ok(())
}

fn apply_summary_updates(db: &mut Database, updates: &[SummaryUpdate]) -> ReplayResult {
    for u in updates {
        let t = find_task_mut(db, u.id)?;
        t.start = u.new_start;
        t.end = u.new_end;
    }
    Ok(())
}

fn set_parent(db: &mut Database, task_id: u64, parent: Option<u64>) -> ReplayResult {
    find_task_mut(db, task_id)?.parent = parent;
    Ok(())
}

/// Exhaustive per-variant inverse executor.
fn apply_inverse(kind: &CommandKind, db: &mut Database) -> ReplayResult {
    match kind {
        CommandKind::AddDependency {
            dependency,
            date_adjustments,
        } => {
            let before = db.dependencies.len();
            db.dependencies.retain(|d| d.id != dependency.id);
            if db.dependencies.len() == before {
                return Err(format!("dependency {} no longer exists", dependency.id));
            }
            revert_moves(db, date_adjustments)
        }
        CommandKind::RemoveDependency { dependency } => {
            db.dependencies.push(dependency.clone());
            Ok(())
        }
        CommandKind::UpdateDependency { id, previous, .. } => {
            let dep = db
                .dependencies
                .iter_mut()
                .find(|d| d.id == *id)
                .ok_or_else(|| format!("dependency {id} no longer exists"))?;
            dep.kind = previous.kind;
            dep.lag = previous.lag;
            Ok(())
        }
        CommandKind::MoveTasks {
            moves,
            summary_updates,
        } => {
            revert_moves(db, moves)?;
            revert_summary_updates(db, summary_updates)
        }
        CommandKind::Indent {
            task_id,
            old_parent,
            summary_updates,
            ..
        }
        | CommandKind::Outdent {
            task_id,
            old_parent,
            summary_updates,
            ..
        } => {
            set_parent(db, *task_id, *old_parent)?;
            revert_summary_updates(db, summary_updates)
        }
        CommandKind::Group {
            summary,
            members,
            summary_updates,
        } => {
            for (member_id, old_parent) in members {
                set_parent(db, *member_id, *old_parent)?;
            }
            db.tasks.retain(|t| t.id != summary.id);
            revert_summary_updates(db, summary_updates)
        }
        CommandKind::Ungroup {
            summary,
            children,
            removed_dependencies,
            summary_updates,
        } => {
            db.tasks.push(summary.clone());
            for (child_id, _) in children {
                set_parent(db, *child_id, Some(summary.id))?;
            }
            for dep in removed_dependencies {
                db.dependencies.push(dep.clone());
            }
            revert_summary_updates(db, summary_updates)
        }
        CommandKind::HideTasks { previous } => {
            for (task_id, was_hidden) in previous {
                find_task_mut(db, *task_id)?.hidden = *was_hidden;
            }
            Ok(())
        }
        CommandKind::CopyTasks { .. } => Ok(()),
    }
}

/// Exhaustive per-variant forward executor for redo. Takes the payload
/// mutably so freshly-read sub-state replaces stale captures.
fn apply_forward(kind: &mut CommandKind, db: &mut Database) -> ReplayResult {
    match kind {
        CommandKind::AddDependency {
            dependency,
            date_adjustments,
        } => {
            // Read fresh: an equivalent edge may have been created between
            // undo and redo.
            let exists = db.dependencies.iter().any(|d| {
                d.from_task_id == dependency.from_task_id && d.to_task_id == dependency.to_task_id
            });
            if !exists {
                db.dependencies.push(dependency.clone());
            }
            apply_moves(db, date_adjustments)
        }
        CommandKind::RemoveDependency { dependency } => {
            db.dependencies.retain(|d| d.id != dependency.id);
            Ok(())
        }
        CommandKind::UpdateDependency { id, next, .. } => {
            let dep = db
                .dependencies
                .iter_mut()
                .find(|d| d.id == *id)
                .ok_or_else(|| format!("dependency {id} no longer exists"))?;
            dep.kind = next.kind;
            dep.lag = next.lag;
            Ok(())
        }
        CommandKind::MoveTasks {
            moves,
            summary_updates,
        } => {
            apply_moves(db, moves)?;
            apply_summary_updates(db, summary_updates)
        }
        CommandKind::Indent {
            task_id,
            new_parent,
            summary_updates,
            ..
        }
        | CommandKind::Outdent {
            task_id,
            new_parent,
            summary_updates,
            ..
        } => {
            set_parent(db, *task_id, *new_parent)?;
            apply_summary_updates(db, summary_updates)
        }
        CommandKind::Group {
            summary,
            members,
            summary_updates,
        } => {
            if db.task(summary.id).is_none() {
                db.tasks.push(summary.clone());
            }
            for (member_id, _) in members.iter() {
                set_parent(db, *member_id, Some(summary.id))?;
            }
            apply_summary_updates(db, summary_updates)
        }
        CommandKind::Ungroup {
            summary,
            children,
            removed_dependencies,
            summary_updates,
        } => {
            for (child_id, target_parent) in children.iter() {
                set_parent(db, *child_id, *target_parent)?;
            }
            // Read the summary's touching edges fresh and keep the payload
            // in step, so the next undo restores what was actually removed.
            let (removed, kept): (Vec<Dependency>, Vec<Dependency>) = db
                .dependencies
                .drain(..)
                .partition(|d| d.touches(summary.id));
            db.dependencies = kept;
            *removed_dependencies = removed;
            db.tasks.retain(|t| t.id != summary.id);
            apply_summary_updates(db, summary_updates)
        }
        CommandKind::HideTasks { previous } => {
            for (task_id, _) in previous.iter() {
                find_task_mut(db, *task_id)?.hidden = true;
            }
            Ok(())
        }
        CommandKind::CopyTasks { .. } => Ok(()),
    }
}

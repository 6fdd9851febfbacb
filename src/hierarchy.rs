//! Hierarchy restructuring and the summary date cascade.
//!
//! Summary rows never own their dates: whenever tasks are reparented or
//! moved, `recalculate_summary_ancestors` recomputes each affected summary's
//! range as the union of its children's ranges, children-first, and returns
//! the before/after tuples that make the cascade itself undoable.
//!
//! Indent/outdent/group/ungroup validate nesting depth and circular
//! parentage before any write, then fold the cascade's output into their own
//! history command alongside their structural changes.

use std::collections::HashSet;

use tracing::debug;

use crate::db::{
    build_children_map, collect_descendants, hierarchy_depth, Database,
};
use crate::error::{Result, ScheduleError};
use crate::fields::TaskKind;
use crate::history::{CommandKind, HistoryLog};
use crate::task::Task;

/// Fixed maximum nesting level (zero-based depth must stay below this).
pub const MAX_HIERARCHY_DEPTH: usize = 10;

/// One summary range recomputation: applied forward, reversible backward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryUpdate {
    pub id: u64,
    pub previous_start: chrono::NaiveDate,
    pub previous_end: chrono::NaiveDate,
    pub new_start: chrono::NaiveDate,
    pub new_end: chrono::NaiveDate,
}

/// Recompute the range of every summary at or above the changed parents,
/// deepest first, applying each change to the database and returning the
/// undo tuples. Non-summary tasks and childless summaries are left alone.
pub fn recalculate_summary_ancestors(
    db: &mut Database,
    changed_parent_ids: &[u64],
) -> Vec<SummaryUpdate> {
    let mut affected: Vec<u64> = Vec::new();
    let mut seen = HashSet::new();
    for &pid in changed_parent_ids {
        let mut chain = vec![pid];
        chain.extend(crate::db::collect_ancestors(pid, db));
        for id in chain {
            if seen.insert(id) {
                affected.push(id);
            }
        }
    }
    // Children before parents, regardless of the order changes arrived in.
    affected.sort_by_key(|&id| std::cmp::Reverse(hierarchy_depth(id, db)));

    let mut updates = Vec::new();
    for id in affected {
        let Some(summary) = db.task(id) else { continue };
        if summary.kind != TaskKind::Summary {
            continue;
        }
        let child_map = build_children_map(&db.tasks);
        let Some(children) = child_map.get(&id) else {
            continue;
        };
        let mut range: Option<(chrono::NaiveDate, chrono::NaiveDate)> = None;
        for &child_id in children {
            let Some(child) = db.task(child_id) else {
                continue;
            };
            range = Some(match range {
                Some((s, e)) => (s.min(child.start), e.max(child.end)),
                None => (child.start, child.end),
            });
        }
        let Some((new_start, new_end)) = range else {
            continue;
        };
        if new_start == summary.start && new_end == summary.end {
            continue;
        }
        updates.push(SummaryUpdate {
            id,
            previous_start: summary.start,
            previous_end: summary.end,
            new_start,
            new_end,
        });
        let t = db.task_mut(id).expect("summary looked up above");
        t.start = new_start;
        t.end = new_end;
        debug!(summary = id, "summary range recomputed");
    }
    updates
}

/// Height of a task's subtree: 0 for a leaf.
fn subtree_height(db: &Database, id: u64) -> usize {
    let child_map = build_children_map(&db.tasks);
    let mut descendants = HashSet::new();
    collect_descendants(id, &child_map, &mut descendants);
    let base = hierarchy_depth(id, db);
    descendants
        .iter()
        .map(|&d| hierarchy_depth(d, db) - base)
        .max()
        .unwrap_or(0)
}

/// Validate that hanging `task_id` under `new_parent` keeps the forest a
/// forest and respects the nesting bound.
fn validate_reparent(db: &Database, task_id: u64, new_parent: Option<u64>) -> Result<()> {
    let Some(parent_id) = new_parent else {
        return Ok(());
    };
    if parent_id == task_id {
        return Err(ScheduleError::CircularParentage { task_id });
    }
    let child_map = build_children_map(&db.tasks);
    let mut descendants = HashSet::new();
    collect_descendants(task_id, &child_map, &mut descendants);
    if descendants.contains(&parent_id) {
        return Err(ScheduleError::CircularParentage { task_id });
    }
    let new_depth = hierarchy_depth(parent_id, db) + 1 + subtree_height(db, task_id);
    if new_depth >= MAX_HIERARCHY_DEPTH {
        return Err(ScheduleError::DepthExceeded {
            max: MAX_HIERARCHY_DEPTH,
        });
    }
    Ok(())
}

/// The nearest sibling that precedes `task_id` in display order under the
/// same parent: the row it would nest under on indent.
fn preceding_sibling(db: &Database, task_id: u64) -> Option<u64> {
    let task = db.task(task_id)?;
    db.tasks
        .iter()
        .filter(|t| t.parent == task.parent && t.id != task.id && t.order < task.order)
        .max_by_key(|t| t.order)
        .map(|t| t.id)
}

pub fn can_indent(db: &Database, task_id: u64) -> bool {
    match preceding_sibling(db, task_id) {
        Some(target) => validate_reparent(db, task_id, Some(target)).is_ok(),
        None => false,
    }
}

pub fn can_outdent(db: &Database, task_id: u64) -> bool {
    db.task(task_id).map_or(false, |t| t.parent.is_some())
}

pub fn can_group(db: &Database, member_ids: &[u64]) -> bool {
    !member_ids.is_empty() && shared_parent_of(db, member_ids).is_ok()
}

pub fn can_ungroup(db: &Database, task_id: u64) -> bool {
    db.task(task_id)
        .map_or(false, |t| t.kind == TaskKind::Summary)
}

/// Nest a task under its preceding sibling. The structural change and the
/// resulting summary cascade land in one history command.
pub fn indent(db: &mut Database, task_id: u64, history: &mut HistoryLog) -> Result<()> {
    let task = db
        .task(task_id)
        .ok_or(ScheduleError::MissingTask { task_id })?;
    let old_parent = task.parent;
    let new_parent = preceding_sibling(db, task_id).ok_or_else(|| {
        ScheduleError::InvalidOperation(format!(
            "task {task_id} has no preceding sibling to indent under"
        ))
    })?;
    validate_reparent(db, task_id, Some(new_parent))?;

    db.task_mut(task_id).expect("validated above").parent = Some(new_parent);
    let mut changed = vec![new_parent];
    changed.extend(old_parent);
    let summary_updates = recalculate_summary_ancestors(db, &changed);

    history.record(
        format!("Indent {}", db.task_name_or_id(task_id)),
        CommandKind::Indent {
            task_id,
            old_parent,
            new_parent: Some(new_parent),
            summary_updates,
        },
    );
    db.mark_dirty();
    Ok(())
}

/// Promote a task to its grandparent's level.
pub fn outdent(db: &mut Database, task_id: u64, history: &mut HistoryLog) -> Result<()> {
    let task = db
        .task(task_id)
        .ok_or(ScheduleError::MissingTask { task_id })?;
    let Some(old_parent) = task.parent else {
        return Err(ScheduleError::InvalidOperation(format!(
            "task {task_id} is already at the top level"
        )));
    };
    let new_parent = db.task(old_parent).and_then(|p| p.parent);
    validate_reparent(db, task_id, new_parent)?;

    db.task_mut(task_id).expect("validated above").parent = new_parent;
    let mut changed = vec![old_parent];
    changed.extend(new_parent);
    let summary_updates = recalculate_summary_ancestors(db, &changed);

    history.record(
        format!("Outdent {}", db.task_name_or_id(task_id)),
        CommandKind::Outdent {
            task_id,
            old_parent: Some(old_parent),
            new_parent,
            summary_updates,
        },
    );
    db.mark_dirty();
    Ok(())
}

/// The parent shared by every member, or an error when members disagree or
/// don't exist. `Ok(None)` means the members are root-level.
fn shared_parent_of(db: &Database, member_ids: &[u64]) -> Result<Option<u64>> {
    let mut shared: Option<Option<u64>> = None;
    for &id in member_ids {
        let task = db.task(id).ok_or(ScheduleError::MissingTask { task_id: id })?;
        match shared {
            None => shared = Some(task.parent),
            Some(p) if p != task.parent => return Err(ScheduleError::MixedParents),
            Some(_) => {}
        }
    }
    Ok(shared.flatten())
}

/// Create a new summary over the members and nest them beneath it. An empty
/// selection is a quiet no-op (`Ok(None)`), never an error.
pub fn group(
    db: &mut Database,
    member_ids: &[u64],
    name: &str,
    history: &mut HistoryLog,
) -> Result<Option<u64>> {
    if member_ids.is_empty() {
        return Ok(None);
    }
    let parent = shared_parent_of(db, member_ids)?;
    for &id in member_ids {
        // Members sink one level; their subtrees must still fit.
        let new_depth = parent.map_or(0, |p| hierarchy_depth(p, db) + 1) + 1 + subtree_height(db, id);
        if new_depth >= MAX_HIERARCHY_DEPTH {
            return Err(ScheduleError::DepthExceeded {
                max: MAX_HIERARCHY_DEPTH,
            });
        }
    }

    let members: Vec<(u64, Option<u64>)> = member_ids
        .iter()
        .map(|&id| (id, db.task(id).expect("validated above").parent))
        .collect();
    let first = db.task(member_ids[0]).expect("validated above");
    let mut summary = Task {
        id: db.next_task_id(),
        name: name.to_string(),
        start: first.start,
        end: first.end,
        progress: 0,
        color: None,
        order: first.order,
        kind: TaskKind::Summary,
        parent,
        open: true,
        hidden: false,
        meta: Default::default(),
    };
    for &id in member_ids {
        let t = db.task(id).expect("validated above");
        summary.start = summary.start.min(t.start);
        summary.end = summary.end.max(t.end);
    }
    let summary_id = summary.id;
    debug!(summary = summary_id, members = member_ids.len(), "grouped tasks");
    db.tasks.push(summary.clone());
    for &id in member_ids {
        db.task_mut(id).expect("validated above").parent = Some(summary_id);
    }

    let mut changed = vec![summary_id];
    changed.extend(parent);
    let summary_updates = recalculate_summary_ancestors(db, &changed);

    history.record(
        format!("Group {} tasks as {}", member_ids.len(), name),
        CommandKind::Group {
            summary,
            members,
            summary_updates,
        },
    );
    db.mark_dirty();
    Ok(Some(summary_id))
}

/// Dissolve a summary: reparent its children to the summary's former parent,
/// delete the summary, and drop only the dependencies in which the summary
/// itself was an endpoint. The children's own mutual dependencies survive.
pub fn ungroup(db: &mut Database, summary_id: u64, history: &mut HistoryLog) -> Result<()> {
    let summary = db
        .task(summary_id)
        .ok_or(ScheduleError::MissingTask { task_id: summary_id })?;
    if summary.kind != TaskKind::Summary {
        return Err(ScheduleError::InvalidOperation(format!(
            "task {summary_id} is not a summary"
        )));
    }
    let summary = summary.clone();
    let target_parent = summary.parent;

    let child_map = build_children_map(&db.tasks);
    let child_ids = child_map.get(&summary_id).cloned().unwrap_or_default();
    let children: Vec<(u64, Option<u64>)> =
        child_ids.iter().map(|&id| (id, target_parent)).collect();

    for &id in &child_ids {
        db.task_mut(id).expect("child of existing summary").parent = target_parent;
    }
    let removed_dependencies = db.remove_dependencies_for_task(summary_id);
    db.tasks.retain(|t| t.id != summary_id);
    debug!(summary = summary_id, children = child_ids.len(), "summary dissolved");

    let summary_updates = match target_parent {
        Some(p) => recalculate_summary_ancestors(db, &[p]),
        None => Vec::new(),
    };

    history.record(
        format!("Ungroup {}", summary.name),
        CommandKind::Ungroup {
            summary,
            children,
            removed_dependencies,
            summary_updates,
        },
    );
    db.mark_dirty();
    Ok(())
}

/// Hide the given tasks and, for summaries, every descendant beneath them.
/// The recorded command snapshots each affected task's prior hidden flag, so
/// undo restores the exact pre-operation hidden set. Returns how many tasks
/// were affected; zero is a quiet no-op that records nothing.
pub fn hide_tasks(db: &mut Database, ids: &[u64], history: &mut HistoryLog) -> usize {
    let child_map = build_children_map(&db.tasks);
    let mut affected: Vec<u64> = Vec::new();
    let mut seen = HashSet::new();
    for &id in ids {
        if db.task(id).is_none() {
            continue;
        }
        if seen.insert(id) {
            affected.push(id);
        }
        let mut descendants = HashSet::new();
        collect_descendants(id, &child_map, &mut descendants);
        let mut ordered: Vec<u64> = descendants.into_iter().collect();
        ordered.sort_unstable();
        for d in ordered {
            if seen.insert(d) {
                affected.push(d);
            }
        }
    }
    if affected.is_empty() {
        return 0;
    }

    let previous: Vec<(u64, bool)> = affected
        .iter()
        .map(|&id| (id, db.task(id).expect("collected above").hidden))
        .collect();
    for &id in &affected {
        db.task_mut(id).expect("collected above").hidden = true;
    }
    let count = affected.len();
    history.record(
        format!("Hide {count} tasks"),
        CommandKind::HideTasks { previous },
    );
    db.mark_dirty();
    count
}

//! Command implementations for the CLI interface.
//!
//! This module contains the subcommand handlers: the thin host shell that
//! invokes the scheduling core, prints its results and messages, and leaves
//! every scheduling decision to the library modules. Handlers never save;
//! the entry point persists once, keyed off the dirty flag.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use clap::Subcommand;
use clap_complete::{generate, Shell};

use crate::cli::Cli;
use crate::db::{build_children_map, Database};
use crate::dependency::DependencyEdit;
use crate::fields::{format_dependency_kind, format_task_kind, DependencyKind, TaskKind};
use crate::graph::topological_sort;
use crate::hierarchy;
use crate::history::HistoryLog;
use crate::schedule::{check_dependency_violations, earliest_start_date, move_tasks, propagate};
use crate::task::Task;

#[derive(Subcommand)]
pub enum Commands {
    /// List tasks, optionally as a hierarchy tree.
    Tasks {
        /// Render as a tree across parent-child relationships.
        #[arg(long)]
        tree: bool,
    },

    /// Add a new task row.
    Add {
        /// Task name.
        name: String,
        /// Start date, YYYY-MM-DD.
        start: NaiveDate,
        /// End date, YYYY-MM-DD (defaults to the start date).
        end: Option<NaiveDate>,
        /// Row kind: task | summary | milestone.
        #[arg(long, value_enum, default_value_t = TaskKind::Task)]
        kind: TaskKind,
        /// Parent task ID.
        #[arg(long)]
        parent: Option<u64>,
        /// Completion percentage, 0-100.
        #[arg(long, default_value_t = 0)]
        progress: u8,
        /// Bar colour (any CSS colour string; passed through to the host).
        #[arg(long)]
        color: Option<String>,
    },

    /// Delete a task, its dependencies, and its children's parent links.
    Remove {
        /// Task ID to delete.
        id: u64,
    },

    /// Create a dependency between two tasks.
    Link {
        /// Predecessor task ID.
        from: u64,
        /// Successor task ID.
        to: u64,
        /// Link type: fs | ss | ff | sf (only FS is scheduled).
        #[arg(long, value_enum, default_value_t = DependencyKind::FinishToStart)]
        kind: DependencyKind,
        /// Lag in days: positive gap, negative overlap.
        #[arg(long, default_value_t = 0)]
        lag: i64,
        /// Also push violated successors later, as part of the same edit.
        #[arg(long)]
        cascade: bool,
    },

    /// Remove a dependency by ID.
    Unlink {
        /// Dependency ID to remove.
        id: u64,
    },

    /// Edit a dependency's type or lag.
    Edit {
        /// Dependency ID to edit.
        id: u64,
        #[arg(long, value_enum)]
        kind: Option<DependencyKind>,
        #[arg(long)]
        lag: Option<i64>,
    },

    /// List dependencies, optionally only those touching one task.
    Deps {
        /// Task ID to filter by.
        task: Option<u64>,
    },

    /// Check whether a candidate link would close a cycle.
    Check {
        from: u64,
        to: u64,
    },

    /// Print tasks in topological order.
    Order,

    /// Push violated successors later until every constraint holds.
    Schedule {
        /// Only cascade downstream of this task.
        #[arg(long)]
        task: Option<u64>,
    },

    /// Report finish-to-start constraints the current dates violate.
    Violations,

    /// Move a task to a new start date, keeping its duration.
    Move {
        /// Task ID to move.
        id: u64,
        /// New start date, YYYY-MM-DD.
        start: NaiveDate,
    },

    /// Nest a task under the row above it.
    Indent { id: u64 },

    /// Promote a task one level up.
    Outdent { id: u64 },

    /// Wrap tasks in a new summary row.
    Group {
        /// Name for the new summary.
        name: String,
        /// Member task IDs.
        ids: Vec<u64>,
    },

    /// Dissolve a summary, keeping its children.
    Ungroup { id: u64 },

    /// Hide tasks (and, for summaries, their descendants).
    Hide {
        /// Task IDs to hide.
        ids: Vec<u64>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Print tasks in a formatted table with optional tree indentation.
fn print_tasks(tasks: &[&Task], depths: Option<&BTreeMap<u64, usize>>) {
    println!(
        "{:<5} {:<10} {:<12} {:<12} {:>5} {:>5}  {}",
        "ID", "Kind", "Start", "End", "Days", "Prog", "Name"
    );
    for t in tasks {
        let indent = depths.and_then(|m| m.get(&t.id).copied()).unwrap_or(0);
        let hidden = if t.hidden { " (hidden)" } else { "" };
        println!(
            "{:<5} {:<10} {:<12} {:<12} {:>5} {:>4}%  {}{}{}",
            t.id,
            format_task_kind(t.kind),
            t.start,
            t.end,
            t.duration_days(),
            t.progress,
            "  ".repeat(indent),
            t.name,
            hidden
        );
    }
}

pub fn cmd_tasks(db: &Database, tree: bool) {
    if db.tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    let mut rows: Vec<&Task> = db.tasks.iter().collect();
    if !tree {
        rows.sort_by_key(|t| (t.order, t.id));
        print_tasks(&rows, None);
        return;
    }

    // Depth-first over the forest in display order.
    let child_map = build_children_map(&db.tasks);
    let mut ordered: Vec<&Task> = Vec::new();
    let mut depths: BTreeMap<u64, usize> = BTreeMap::new();
    let mut roots: Vec<&Task> = db.tasks.iter().filter(|t| t.parent.is_none()).collect();
    roots.sort_by_key(|t| (t.order, t.id));
    let mut stack: Vec<(u64, usize)> = roots.iter().rev().map(|t| (t.id, 0)).collect();
    while let Some((id, depth)) = stack.pop() {
        let Some(task) = db.task(id) else { continue };
        depths.insert(id, depth);
        ordered.push(task);
        if let Some(children) = child_map.get(&id) {
            for &c in children.iter().rev() {
                stack.push((c, depth + 1));
            }
        }
    }
    print_tasks(&ordered, Some(&depths));
}

/// Task rows themselves belong to the host, not the scheduling core: adding
/// and deleting them goes straight onto the database and records no history.
#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    db: &mut Database,
    name: String,
    start: NaiveDate,
    end: Option<NaiveDate>,
    kind: TaskKind,
    parent: Option<u64>,
    progress: u8,
    color: Option<String>,
) {
    if let Some(p) = parent {
        if db.task(p).is_none() {
            eprintln!("Error: parent task {p} does not exist");
            return;
        }
    }
    let end = match kind {
        TaskKind::Milestone => start,
        _ => end.unwrap_or(start),
    };
    if end < start {
        eprintln!("Error: end date {end} precedes start date {start}");
        return;
    }
    let task = Task {
        id: db.next_task_id(),
        name,
        start,
        end,
        progress: progress.min(100),
        color,
        order: db.next_order(),
        kind,
        parent,
        open: true,
        hidden: false,
        meta: Default::default(),
    };
    let id = task.id;
    db.tasks.push(task);
    if let Some(p) = parent {
        hierarchy::recalculate_summary_ancestors(db, &[p]);
    }
    db.mark_dirty();
    println!("Added task {id}");
}

pub fn cmd_remove(db: &mut Database, id: u64) {
    let Some(task) = db.task(id) else {
        println!("No task with ID {id}.");
        return;
    };
    let name = task.name.clone();
    let former_parent = task.parent;
    // Deleting a task cascades away every edge touching it.
    let removed_deps = db.remove_dependencies_for_task(id);
    db.remove_task_ids(&std::collections::HashSet::from([id]));
    if let Some(p) = former_parent {
        hierarchy::recalculate_summary_ancestors(db, &[p]);
    }
    db.mark_dirty();
    println!("Deleted {name} ({} dependencies removed)", removed_deps.len());
}

pub fn cmd_link(
    db: &mut Database,
    history: &mut HistoryLog,
    from: u64,
    to: u64,
    kind: DependencyKind,
    lag: i64,
    cascade: bool,
) {
    match db.add_dependency(from, to, kind, lag, cascade, history) {
        Ok(added) => {
            println!(
                "Linked {} -> {} ({}, lag {}) as dependency {}",
                db.task_name_or_id(from),
                db.task_name_or_id(to),
                format_dependency_kind(added.dependency.kind),
                added.dependency.lag,
                added.dependency.id
            );
            for adj in &added.date_adjustments {
                println!(
                    "  shifted {}: {} -> {}",
                    db.task_name_or_id(adj.task_id),
                    adj.old_start,
                    adj.new_start
                );
            }
        }
        Err(e) => eprintln!("Error: {e}"),
    }
}

pub fn cmd_unlink(db: &mut Database, history: &mut HistoryLog, id: u64) {
    match db.remove_dependency(id, history) {
        Some(removed) => println!(
            "Unlinked {} -> {}",
            db.task_name_or_id(removed.from_task_id),
            db.task_name_or_id(removed.to_task_id)
        ),
        None => println!("No dependency with ID {id}."),
    }
}

pub fn cmd_edit(
    db: &mut Database,
    history: &mut HistoryLog,
    id: u64,
    kind: Option<DependencyKind>,
    lag: Option<i64>,
) {
    let Some(current) = db.dependency_by_id(id) else {
        println!("No dependency with ID {id}.");
        return;
    };
    let edit = DependencyEdit {
        kind: kind.unwrap_or(current.kind),
        lag: lag.unwrap_or(current.lag),
    };
    if db.update_dependency(id, edit, history).is_some() {
        println!(
            "Dependency {id} is now {} with lag {}",
            format_dependency_kind(edit.kind),
            edit.lag
        );
    }
}

pub fn cmd_deps(db: &Database, task: Option<u64>) {
    let deps: Vec<_> = match task {
        Some(id) => db.dependencies_for_task(id),
        None => db.dependencies.iter().collect(),
    };
    if deps.is_empty() {
        println!("No dependencies.");
        return;
    }
    println!("{:<5} {:<4} {:>4}  {}", "ID", "Type", "Lag", "Link");
    for d in deps {
        println!(
            "{:<5} {:<4} {:>4}  {} -> {}",
            d.id,
            format_dependency_kind(d.kind),
            d.lag,
            db.task_name_or_id(d.from_task_id),
            db.task_name_or_id(d.to_task_id)
        );
    }
}

pub fn cmd_check(db: &Database, from: u64, to: u64) {
    if db.check_would_create_cycle(from, to) {
        println!(
            "Linking {} -> {} would create a circular dependency.",
            db.task_name_or_id(from),
            db.task_name_or_id(to)
        );
    } else {
        println!(
            "Linking {} -> {} is safe.",
            db.task_name_or_id(from),
            db.task_name_or_id(to)
        );
    }
}

pub fn cmd_order(db: &Database) {
    for id in topological_sort(&db.tasks, &db.dependencies) {
        println!("{:<5} {}", id, db.task_name_or_id(id));
    }
}

pub fn cmd_schedule(db: &mut Database, history: &mut HistoryLog, task: Option<u64>) {
    let moved = propagate(db, task, history);
    if moved == 0 {
        println!("All constraints already satisfied.");
    } else {
        println!("Rescheduled {moved} tasks.");
    }
}

pub fn cmd_violations(db: &Database) {
    let violations = check_dependency_violations(&db.tasks, &db.dependencies);
    if violations.is_empty() {
        println!("No violations.");
        return;
    }
    for v in violations {
        println!(
            "{} -> {}: must start {} or later, currently starts {}",
            db.task_name_or_id(v.from_task_id),
            db.task_name_or_id(v.to_task_id),
            v.required_start,
            v.actual_start
        );
    }
    println!("Run `gantt schedule` to resolve.");
}

pub fn cmd_move(db: &mut Database, history: &mut HistoryLog, id: u64, start: NaiveDate) {
    if db.task(id).is_none() {
        eprintln!("Error: task {id} does not exist");
        return;
    }
    let moved = move_tasks(db, &[(id, start)], history);
    if moved == 0 {
        println!("Nothing to move.");
        return;
    }
    println!("Moved {} to start {}", db.task_name_or_id(id), start);
    if let Some(earliest) = earliest_start_date(&db.tasks, &db.dependencies, id) {
        if start < earliest {
            println!("Note: predecessors require a start of {earliest} or later; run `gantt schedule`.");
        }
    }
}

pub fn cmd_indent(db: &mut Database, history: &mut HistoryLog, id: u64) {
    match hierarchy::indent(db, id, history) {
        Ok(()) => println!("Indented {}", db.task_name_or_id(id)),
        Err(e) => eprintln!("Error: {e}"),
    }
}

pub fn cmd_outdent(db: &mut Database, history: &mut HistoryLog, id: u64) {
    match hierarchy::outdent(db, id, history) {
        Ok(()) => println!("Outdented {}", db.task_name_or_id(id)),
        Err(e) => eprintln!("Error: {e}"),
    }
}

pub fn cmd_group(db: &mut Database, history: &mut HistoryLog, name: String, ids: Vec<u64>) {
    match hierarchy::group(db, &ids, &name, history) {
        Ok(Some(summary_id)) => println!("Grouped {} tasks under {name} ({summary_id})", ids.len()),
        Ok(None) => println!("Nothing to group."),
        Err(e) => eprintln!("Error: {e}"),
    }
}

pub fn cmd_ungroup(db: &mut Database, history: &mut HistoryLog, id: u64) {
    let name = db.task_name_or_id(id);
    match hierarchy::ungroup(db, id, history) {
        Ok(()) => println!("Ungrouped {name}"),
        Err(e) => eprintln!("Error: {e}"),
    }
}

pub fn cmd_hide(db: &mut Database, history: &mut HistoryLog, ids: Vec<u64>) {
    let count = hierarchy::hide_tasks(db, &ids, history);
    if count == 0 {
        println!("Nothing to hide.");
    } else {
        println!("Hid {count} tasks.");
    }
}

pub fn cmd_completions(shell: Shell) {
    let mut cmd = <Cli as clap::CommandFactory>::command();
    generate(shell, &mut cmd, "gantt", &mut std::io::stdout());
}

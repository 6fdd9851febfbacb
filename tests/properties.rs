//! Property tests for the graph invariants the store must uphold under
//! arbitrary edit sequences.

use std::collections::HashMap;

use chrono::NaiveDate;
use proptest::prelude::*;

use gantt_core::db::Database;
use gantt_core::fields::{DependencyKind, TaskKind};
use gantt_core::graph::{detect_cycle, successors_of, topological_sort, would_create_cycle};
use gantt_core::history::HistoryLog;
use gantt_core::schedule::calculate_date_adjustments;
use gantt_core::task::Task;

const TASK_COUNT: u64 = 8;

fn task(id: u64, start_off: i64, len: i64) -> Task {
    let base = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
    let start = base + chrono::Duration::days(start_off);
    Task {
        id,
        name: format!("task {id}"),
        start,
        end: start + chrono::Duration::days(len),
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

fn db_with_tasks() -> Database {
    Database {
        tasks: (1..=TASK_COUNT).map(|id| task(id, id as i64 * 2, 3)).collect(),
        ..Default::default()
    }
}

/// Feed every attempted edge through the store; only valid ones commit.
fn insert_all(db: &mut Database, attempts: &[(u64, u64)], history: &mut HistoryLog) {
    for &(a, b) in attempts {
        let _ = db.add_dependency(a, b, DependencyKind::FinishToStart, 0, false, history);
    }
}

fn edge_attempts() -> impl Strategy<Value = Vec<(u64, u64)>> {
    proptest::collection::vec((1..=TASK_COUNT, 1..=TASK_COUNT), 0..40)
}

proptest! {
    /// Any sequence of store inserts leaves the edge set acyclic.
    #[test]
    fn store_never_admits_a_cycle(attempts in edge_attempts()) {
        let mut db = db_with_tasks();
        let mut history = HistoryLog::new();
        insert_all(&mut db, &attempts, &mut history);
        prop_assert!(!detect_cycle(&db.dependencies, None).has_cycle);
    }

    /// A self-edge is a cycle no matter what already exists.
    #[test]
    fn self_loop_is_always_a_cycle(attempts in edge_attempts(), x in 1..=TASK_COUNT) {
        let mut db = db_with_tasks();
        let mut history = HistoryLog::new();
        insert_all(&mut db, &attempts, &mut history);
        prop_assert!(would_create_cycle(&db.dependencies, x, x));
    }

    /// An insert is rejected as cyclic exactly when the successor already
    /// reaches the predecessor transitively.
    #[test]
    fn cycle_rejection_is_exact(
        attempts in edge_attempts(),
        from in 1..=TASK_COUNT,
        to in 1..=TASK_COUNT,
    ) {
        prop_assume!(from != to);
        let mut db = db_with_tasks();
        let mut history = HistoryLog::new();
        insert_all(&mut db, &attempts, &mut history);
        prop_assume!(!db.has_dependency(from, to));

        let reaches_back = successors_of(&db.dependencies, to).contains(&from);
        let result = db.add_dependency(from, to, DependencyKind::FinishToStart, 0, false, &mut history);
        prop_assert_eq!(result.is_err(), reaches_back);
    }

    /// Every committed edge places its predecessor strictly before its
    /// successor in the topological order.
    #[test]
    fn topological_order_respects_all_edges(attempts in edge_attempts()) {
        let mut db = db_with_tasks();
        let mut history = HistoryLog::new();
        insert_all(&mut db, &attempts, &mut history);

        let sorted = topological_sort(&db.tasks, &db.dependencies);
        prop_assert_eq!(sorted.len() as u64, TASK_COUNT);
        let pos: HashMap<u64, usize> =
            sorted.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        for d in &db.dependencies {
            prop_assert!(pos[&d.from_task_id] < pos[&d.to_task_id]);
        }
    }

    /// Propagation only pushes tasks later, and a second pass over the
    /// shifted chart finds nothing left to do.
    #[test]
    fn propagation_is_monotonic_and_settles(attempts in edge_attempts()) {
        let mut db = db_with_tasks();
        let mut history = HistoryLog::new();
        insert_all(&mut db, &attempts, &mut history);

        let adjustments = calculate_date_adjustments(&db.tasks, &db.dependencies, None);
        for adj in &adjustments {
            prop_assert!(adj.new_start >= adj.old_start);
            prop_assert_eq!(
                adj.new_end - adj.new_start,
                adj.old_end - adj.old_start
            );
        }
        db.apply_adjustments(&adjustments);
        prop_assert!(calculate_date_adjustments(&db.tasks, &db.dependencies, None).is_empty());
    }
}

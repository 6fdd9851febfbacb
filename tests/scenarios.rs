//! End-to-end scenarios exercising the store, propagation engine, hierarchy
//! cascade and history log together, the way a host drives them.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use gantt_core::db::Database;
use gantt_core::fields::{DependencyKind, TaskKind};
use gantt_core::hierarchy;
use gantt_core::history::HistoryLog;
use gantt_core::schedule::{calculate_date_adjustments, move_tasks};
use gantt_core::task::Task;

fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, m, d).unwrap()
}

fn task(id: u64, name: &str, start: NaiveDate, end: NaiveDate) -> Task {
    Task {
        id,
        name: name.to_string(),
        start,
        end,
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

fn summary(id: u64, name: &str, start: NaiveDate, end: NaiveDate) -> Task {
    let mut t = task(id, name, start, end);
    t.kind = TaskKind::Summary;
    t
}

/// Everything undo must restore: dates, hierarchy, hidden flags and the
/// dependency set.
type Snapshot = (
    BTreeMap<u64, (NaiveDate, NaiveDate, Option<u64>, bool)>,
    Vec<(u64, u64, u64, i64)>,
);

fn snapshot(db: &Database) -> Snapshot {
    let tasks = db
        .tasks
        .iter()
        .map(|t| (t.id, (t.start, t.end, t.parent, t.hidden)))
        .collect();
    let mut deps: Vec<(u64, u64, u64, i64)> = db
        .dependencies
        .iter()
        .map(|d| (d.id, d.from_task_id, d.to_task_id, d.lag))
        .collect();
    deps.sort_unstable();
    (tasks, deps)
}

#[test]
fn linking_pushes_successor_out_preserving_duration() {
    // A runs Jan 1-10; B currently overlaps it.
    let mut db = Database {
        tasks: vec![
            task(1, "A", day(1, 1), day(1, 10)),
            task(2, "B", day(1, 5), day(1, 7)),
        ],
        ..Default::default()
    };
    let mut history = HistoryLog::new();
    db.add_dependency(1, 2, DependencyKind::FinishToStart, 0, false, &mut history)
        .unwrap();

    let adjustments = calculate_date_adjustments(&db.tasks, &db.dependencies, Some(1));
    assert_eq!(adjustments.len(), 1);
    let adj = &adjustments[0];
    assert_eq!(adj.task_id, 2);
    assert_eq!(adj.new_start, day(1, 11));
    assert_eq!(adj.new_end, day(1, 13));
    assert_eq!(
        (adj.new_end - adj.new_start).num_days(),
        (adj.old_end - adj.old_start).num_days()
    );
}

#[test]
fn closing_a_chain_reports_the_named_cycle() {
    let mut db = Database {
        tasks: vec![
            task(1, "A", day(1, 1), day(1, 2)),
            task(2, "B", day(1, 3), day(1, 4)),
            task(3, "C", day(1, 5), day(1, 6)),
        ],
        ..Default::default()
    };
    let mut history = HistoryLog::new();
    db.add_dependency(1, 2, DependencyKind::FinishToStart, 0, false, &mut history)
        .unwrap();
    db.add_dependency(2, 3, DependencyKind::FinishToStart, 0, false, &mut history)
        .unwrap();

    let err = db
        .add_dependency(3, 1, DependencyKind::FinishToStart, 0, false, &mut history)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("circular dependency"));
    assert!(msg.contains("A -> B -> C -> A"));

    // The rejection left no trace: still two edges, still acyclic.
    assert_eq!(db.dependencies.len(), 2);
    assert!(!gantt_core::detect_cycle(&db.dependencies, None).has_cycle);
}

#[test]
fn hide_undo_round_trip_restores_exact_hidden_set() {
    let mut db = Database {
        tasks: vec![
            summary(1, "Phase", day(1, 1), day(1, 9)),
            task(2, "a", day(1, 1), day(1, 4)),
            task(3, "b", day(1, 5), day(1, 9)),
            task(4, "unrelated", day(1, 1), day(1, 2)),
        ],
        ..Default::default()
    };
    db.task_mut(2).unwrap().parent = Some(1);
    db.task_mut(3).unwrap().parent = Some(1);
    // One descendant was hidden before the operation.
    db.task_mut(3).unwrap().hidden = true;
    let mut history = HistoryLog::new();
    let before = snapshot(&db);

    let count = hierarchy::hide_tasks(&mut db, &[1], &mut history);
    assert_eq!(count, 3);
    assert!(db.task(1).unwrap().hidden);
    assert!(db.task(2).unwrap().hidden);
    assert!(db.task(3).unwrap().hidden);
    assert!(!db.task(4).unwrap().hidden);

    history.undo(&mut db);
    assert_eq!(snapshot(&db), before);
}

#[test]
fn ungroup_keeps_children_and_their_mutual_links() {
    let mut db = Database {
        tasks: vec![
            summary(1, "Parent", day(1, 1), day(1, 20)),
            summary(2, "Phase", day(1, 1), day(1, 9)),
            task(3, "x", day(1, 1), day(1, 4)),
            task(4, "y", day(1, 5), day(1, 9)),
            task(5, "z", day(1, 10), day(1, 20)),
        ],
        ..Default::default()
    };
    db.task_mut(2).unwrap().parent = Some(1);
    db.task_mut(3).unwrap().parent = Some(2);
    db.task_mut(4).unwrap().parent = Some(2);
    db.task_mut(5).unwrap().parent = Some(1);
    let mut history = HistoryLog::new();

    // x -> y is the children's own link; Phase -> z touches the summary.
    db.add_dependency(3, 4, DependencyKind::FinishToStart, 0, false, &mut history)
        .unwrap();
    db.add_dependency(2, 5, DependencyKind::FinishToStart, 0, false, &mut history)
        .unwrap();
    let before = snapshot(&db);

    hierarchy::ungroup(&mut db, 2, &mut history).unwrap();
    assert!(db.task(2).is_none());
    assert_eq!(db.task(3).unwrap().parent, Some(1));
    assert_eq!(db.task(4).unwrap().parent, Some(1));
    assert!(db.has_dependency(3, 4), "children's mutual link survives");
    assert!(!db.has_dependency(2, 5), "summary's own link is removed");
    assert_eq!(db.dependencies.len(), 1);

    // Undo restores the summary, the parent pointers and the removed edge.
    history.undo(&mut db);
    assert_eq!(snapshot(&db), before);
    assert_eq!(db.task(2).unwrap().kind, TaskKind::Summary);

    // Redo dissolves it again, identically.
    history.redo(&mut db);
    assert!(db.task(2).is_none());
    assert_eq!(db.dependencies.len(), 1);
    assert!(db.has_dependency(3, 4));
}

#[test]
fn ungrouping_a_root_summary_reparents_children_to_root() {
    let mut db = Database {
        tasks: vec![
            summary(1, "Phase", day(1, 1), day(1, 9)),
            task(2, "x", day(1, 1), day(1, 4)),
            task(3, "y", day(1, 5), day(1, 9)),
        ],
        ..Default::default()
    };
    db.task_mut(2).unwrap().parent = Some(1);
    db.task_mut(3).unwrap().parent = Some(1);
    let mut history = HistoryLog::new();

    hierarchy::ungroup(&mut db, 1, &mut history).unwrap();
    assert_eq!(db.task(2).unwrap().parent, None);
    assert_eq!(db.task(3).unwrap().parent, None);

    history.undo(&mut db);
    assert_eq!(db.task(2).unwrap().parent, Some(1));
    assert_eq!(db.task(3).unwrap().parent, Some(1));
}

#[test]
fn every_command_kind_obeys_the_inverse_law() {
    let mut db = Database {
        tasks: vec![
            task(1, "A", day(1, 1), day(1, 10)),
            task(2, "B", day(1, 5), day(1, 7)),
            task(3, "C", day(2, 1), day(2, 5)),
            task(4, "D", day(2, 6), day(2, 8)),
        ],
        ..Default::default()
    };
    let mut history = HistoryLog::new();

    // Each step: snapshot, mutate, check undo restores the snapshot, check
    // redo restores the mutated state, then redo again to move on.
    let mut check = |db: &mut Database, history: &mut HistoryLog| {
        let after = snapshot(db);
        history.undo(db);
        history.redo(db);
        assert_eq!(snapshot(db), after, "undo+redo must reproduce the state");
    };

    let before = snapshot(&db);
    let added = db
        .add_dependency(1, 2, DependencyKind::FinishToStart, 0, true, &mut history)
        .unwrap();
    assert_eq!(added.date_adjustments.len(), 1);
    check(&mut db, &mut history);
    history.undo(&mut db);
    assert_eq!(snapshot(&db), before, "undo must restore the pre-command state");
    history.redo(&mut db);

    let dep_id = added.dependency.id;
    db.update_dependency(
        dep_id,
        gantt_core::DependencyEdit {
            kind: DependencyKind::FinishToStart,
            lag: 2,
        },
        &mut history,
    )
    .unwrap();
    check(&mut db, &mut history);

    move_tasks(&mut db, &[(3, day(2, 10)), (4, day(2, 15))], &mut history);
    check(&mut db, &mut history);

    hierarchy::group(&mut db, &[3, 4], "Late work", &mut history).unwrap();
    check(&mut db, &mut history);

    hierarchy::indent(&mut db, 2, &mut history).unwrap();
    check(&mut db, &mut history);

    hierarchy::outdent(&mut db, 2, &mut history).unwrap();
    check(&mut db, &mut history);

    hierarchy::hide_tasks(&mut db, &[1], &mut history);
    check(&mut db, &mut history);

    db.remove_dependency(dep_id, &mut history).unwrap();
    check(&mut db, &mut history);

    // Unwind the whole session: the chart is exactly where it started.
    while history.can_undo() {
        history.undo(&mut db);
    }
    assert_eq!(snapshot(&db), before);
}

#[test]
fn history_is_cleared_on_load_and_never_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chart.json");
    let mut db = Database {
        tasks: vec![
            task(1, "A", day(1, 1), day(1, 2)),
            task(2, "B", day(1, 3), day(1, 4)),
        ],
        ..Default::default()
    };
    let mut history = HistoryLog::new();
    db.add_dependency(1, 2, DependencyKind::FinishToStart, 0, false, &mut history)
        .unwrap();
    assert!(history.can_undo());
    db.save(&path).unwrap();

    // A fresh load starts with an empty log, as on every file open.
    let loaded = Database::load(&path);
    history.clear();
    assert!(!history.can_undo());
    assert!(!history.can_redo());
    assert_eq!(loaded.dependencies.len(), 1);
    assert_eq!(
        loaded.dependencies[0].kind,
        DependencyKind::FinishToStart
    );
}

#[test]
fn dependency_snapshot_uses_the_chart_field_names() {
    let mut db = Database {
        tasks: vec![
            task(1, "A", day(1, 1), day(1, 2)),
            task(2, "B", day(1, 3), day(1, 4)),
        ],
        ..Default::default()
    };
    let mut history = HistoryLog::new();
    db.add_dependency(1, 2, DependencyKind::FinishToStart, 3, false, &mut history)
        .unwrap();

    let json = serde_json::to_value(&db.dependencies[0]).unwrap();
    assert_eq!(json["fromTaskId"], 1);
    assert_eq!(json["toTaskId"], 2);
    assert_eq!(json["type"], "FS");
    assert_eq!(json["lag"], 3);
    assert!(json["createdAt"].is_string());
    assert!(json["id"].is_number());
}

//! Chart database and utility functions.
//!
//! This module provides the `Database` struct owning the task list and the
//! authoritative dependency list, along with the dirty flag the host's save
//! logic keys off and the hierarchical walk helpers the cascade code uses.
//!
//! The JSON snapshot load/save here is the whole of the file layer: the
//! scheduling core itself only ever reads tasks and applies patches.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dependency::Dependency;
use crate::task::{DateAdjustment, Task};

/// In-memory chart state: every task row plus every dependency edge.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Database {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Set after any committed mutation; cleared by a successful save.
    #[serde(skip)]
    pub dirty: bool,
    /// Host-side selection pointer, cleared when the selected edge is
    /// removed. Never persisted.
    #[serde(skip)]
    pub selected_dependency: Option<u64>,
}

impl Database {
    /// Load a chart from a JSON file, starting empty if it doesn't exist.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Database::default();
        }
        let mut buf = String::new();
        match File::open(path).and_then(|mut f| f.read_to_string(&mut buf)) {
            Ok(_) => match serde_json::from_str(&buf) {
                Ok(db) => db,
                Err(e) => {
                    warn!("error parsing chart file, starting fresh: {e}");
                    Database::default()
                }
            },
            Err(e) => {
                warn!("error reading chart file, starting fresh: {e}");
                Database::default()
            }
        }
    }

    /// Save the chart to a JSON file using atomic write (temp file + rename)
    /// and clear the dirty flag.
    pub fn save(&mut self, path: &Path) -> std::io::Result<()> {
        // Atomic-ish write via temp + rename.
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        self.dirty = false;
        Ok(())
    }

    /// Flag that persisted state has diverged from the file.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Generate the next available task ID.
    pub fn next_task_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    /// Generate the next available dependency ID.
    pub fn next_dependency_id(&self) -> u64 {
        self.dependencies.iter().map(|d| d.id).max().unwrap_or(0) + 1
    }

    /// The next `order` value, placing a new row after every existing one.
    pub fn next_order(&self) -> u32 {
        self.tasks.iter().map(|t| t.order).max().map_or(0, |o| o + 1)
    }

    /// Index mapping task IDs to positions in the task vector.
    pub fn index(&self) -> HashMap<u64, usize> {
        let mut m = HashMap::new();
        for (i, t) in self.tasks.iter().enumerate() {
            m.insert(t.id, i);
        }
        m
    }

    /// Get a task by ID.
    pub fn task(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Get a mutable reference to a task by ID.
    pub fn task_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Resolve a task ID to its display name, falling back to the raw ID
    /// when the task no longer exists.
    pub fn task_name_or_id(&self, id: u64) -> String {
        self.task(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Remove tasks by ID, clearing parent pointers of surviving children
    /// that pointed into the removed set. Dependency cleanup is the caller's
    /// job via `remove_dependencies_for_task`.
    pub fn remove_task_ids(&mut self, ids: &HashSet<u64>) {
        self.tasks.retain(|t| !ids.contains(&t.id));
        for t in self.tasks.iter_mut() {
            if let Some(p) = t.parent {
                if ids.contains(&p) {
                    t.parent = None;
                }
            }
        }
    }

    /// Apply one date adjustment to its task. Missing tasks are skipped.
    pub fn apply_adjustment(&mut self, adj: &DateAdjustment) {
        if let Some(t) = self.task_mut(adj.task_id) {
            t.start = adj.new_start;
            t.end = adj.new_end;
        }
    }

    /// Apply a batch of date adjustments and mark the document dirty when
    /// anything was touched.
    pub fn apply_adjustments(&mut self, adjustments: &[DateAdjustment]) {
        for adj in adjustments {
            self.apply_adjustment(adj);
        }
        if !adjustments.is_empty() {
            self.mark_dirty();
        }
    }

    /// Revert a batch of date adjustments (restore the `old_` dates).
    pub fn revert_adjustments(&mut self, adjustments: &[DateAdjustment]) {
        for adj in adjustments {
            if let Some(t) = self.task_mut(adj.task_id) {
                t.start = adj.old_start;
                t.end = adj.old_end;
            }
        }
        if !adjustments.is_empty() {
            self.mark_dirty();
        }
    }
}

/// Build a map of parent task IDs to their children's IDs, children sorted
/// by display order.
pub fn build_children_map(tasks: &[Task]) -> BTreeMap<u64, Vec<u64>> {
    let mut order: HashMap<u64, u32> = HashMap::new();
    for t in tasks {
        order.insert(t.id, t.order);
    }
    let mut map: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    for t in tasks {
        if let Some(p) = t.parent {
            map.entry(p).or_default().push(t.id);
        }
    }
    for v in map.values_mut() {
        v.sort_unstable_by_key(|id| (order.get(id).copied().unwrap_or(u32::MAX), *id));
    }
    map
}

/// Collect all descendant task IDs from a root task, iteratively.
pub fn collect_descendants(root: u64, child_map: &BTreeMap<u64, Vec<u64>>, out: &mut HashSet<u64>) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(children) = child_map.get(&id) {
            for &c in children {
                if out.insert(c) {
                    stack.push(c);
                }
            }
        }
    }
}

/// Collect all ancestor task IDs by following parent references upward.
pub fn collect_ancestors(mut id: u64, db: &Database) -> Vec<u64> {
    let index = db.index();
    let mut chain = Vec::new();
    while let Some(t) = index.get(&id).and_then(|&i| db.tasks.get(i)) {
        if let Some(p) = t.parent {
            // A malformed file could contain a parent loop; stop rather
            // than spin.
            if chain.contains(&p) {
                break;
            }
            chain.push(p);
            id = p;
        } else {
            break;
        }
    }
    chain
}

/// Depth of a task in the forest: 0 for roots.
pub fn hierarchy_depth(id: u64, db: &Database) -> usize {
    collect_ancestors(id, db).len()
}

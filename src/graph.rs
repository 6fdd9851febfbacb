//! Dependency graph index and algorithms.
//!
//! The graph is rebuilt from the dependency list on every query rather than
//! maintained incrementally: chart dependency counts are small enough that
//! O(V+E) rebuilds are cheap, and a fresh build can never be stale.
//!
//! Three consumers share the index: the cycle detector (DFS with an explicit
//! stack, reconstructing the offending path), the topological sorter (Kahn's
//! algorithm with deterministic tie ordering) and the transitive
//! successor/predecessor queries (BFS closures).

use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::{debug, warn};

use crate::dependency::Dependency;
use crate::task::Task;

/// Forward dependency graph over task IDs.
pub struct DependencyGraph {
    graph: DiGraph<u64, ()>,
    id_to_node: HashMap<u64, NodeIndex>,
}

impl DependencyGraph {
    /// Build a graph whose nodes are the dependency endpoints themselves,
    /// optionally injecting a candidate edge. Endpoints with no task row
    /// still get a node, so validation sees exactly what the edge set says.
    pub fn from_edges(dependencies: &[Dependency], candidate: Option<(u64, u64)>) -> Self {
        let mut g = DependencyGraph {
            graph: DiGraph::new(),
            id_to_node: HashMap::new(),
        };
        for dep in dependencies {
            let from = g.node_for(dep.from_task_id);
            let to = g.node_for(dep.to_task_id);
            g.graph.add_edge(from, to, ());
        }
        if let Some((from_id, to_id)) = candidate {
            let from = g.node_for(from_id);
            let to = g.node_for(to_id);
            g.graph.add_edge(from, to, ());
        }
        debug!(
            nodes = g.graph.node_count(),
            edges = g.graph.edge_count(),
            "built edge graph"
        );
        g
    }

    /// Build a graph with one node per existing task, skipping any edge
    /// whose endpoint task no longer exists.
    pub fn from_tasks(tasks: &[Task], dependencies: &[Dependency]) -> Self {
        let mut g = DependencyGraph {
            graph: DiGraph::new(),
            id_to_node: HashMap::new(),
        };
        for task in tasks {
            g.node_for(task.id);
        }
        for dep in dependencies {
            match (
                g.id_to_node.get(&dep.from_task_id),
                g.id_to_node.get(&dep.to_task_id),
            ) {
                (Some(&from), Some(&to)) => {
                    g.graph.add_edge(from, to, ());
                }
                _ => {
                    debug!(dep = dep.id, "skipping edge with missing endpoint");
                }
            }
        }
        g
    }

    fn node_for(&mut self, id: u64) -> NodeIndex {
        if let Some(&n) = self.id_to_node.get(&id) {
            return n;
        }
        let n = self.graph.add_node(id);
        self.id_to_node.insert(id, n);
        n
    }
}

/// Outcome of a cycle scan. When a cycle exists, `cycle_path` lists the task
/// IDs along it in edge order, closing back on the first entry
/// (e.g. `[a, b, c, a]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleCheck {
    pub has_cycle: bool,
    pub cycle_path: Option<Vec<u64>>,
}

impl CycleCheck {
    fn clean() -> Self {
        CycleCheck {
            has_cycle: false,
            cycle_path: None,
        }
    }
}

/// DFS node colouring for the iterative cycle scan.
#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Scan the dependency edge set for a cycle, optionally as if `candidate`
/// had already been inserted. Every disconnected component is visited.
pub fn detect_cycle(dependencies: &[Dependency], candidate: Option<(u64, u64)>) -> CycleCheck {
    let g = DependencyGraph::from_edges(dependencies, candidate);
    let graph = &g.graph;

    let mut mark = vec![Mark::Unvisited; graph.node_count()];
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    for start in graph.node_indices() {
        if mark[start.index()] != Mark::Unvisited {
            continue;
        }
        // Explicit stack instead of call-stack recursion: each frame holds
        // the node and its remaining unexplored neighbours.
        mark[start.index()] = Mark::OnStack;
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> =
            vec![(start, graph.neighbors(start).collect())];

        while let Some((node, pending)) = stack.last_mut() {
            let node = *node;
            match pending.pop() {
                Some(next) => match mark[next.index()] {
                    Mark::Unvisited => {
                        mark[next.index()] = Mark::OnStack;
                        parent.insert(next, node);
                        let neighbours = graph.neighbors(next).collect();
                        stack.push((next, neighbours));
                    }
                    Mark::OnStack => {
                        // Back edge: walk parents from `node` up to `next`
                        // to recover the cycle, then close it.
                        let mut rev = vec![graph[node]];
                        let mut cur = node;
                        while cur != next {
                            cur = parent[&cur];
                            rev.push(graph[cur]);
                        }
                        rev.reverse();
                        rev.push(graph[next]);
                        return CycleCheck {
                            has_cycle: true,
                            cycle_path: Some(rev),
                        };
                    }
                    Mark::Done => {}
                },
                None => {
                    mark[node.index()] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }

    CycleCheck::clean()
}

/// Whether inserting `from -> to` would close a cycle. A self-edge is a
/// trivial cycle regardless of the existing edge set.
pub fn would_create_cycle(dependencies: &[Dependency], from: u64, to: u64) -> bool {
    if from == to {
        return true;
    }
    detect_cycle(dependencies, Some((from, to))).has_cycle
}

/// Topologically order all tasks so that every predecessor precedes its
/// successors, via Kahn's algorithm. Edges with a missing endpoint task are
/// skipped. Ready tasks drain in ascending display order (then ID), so the
/// result is deterministic.
pub fn topological_sort(tasks: &[Task], dependencies: &[Dependency]) -> Vec<u64> {
    let g = DependencyGraph::from_tasks(tasks, dependencies);
    let graph = &g.graph;

    let sort_key: HashMap<u64, (u32, u64)> =
        tasks.iter().map(|t| (t.id, (t.order, t.id))).collect();
    let key_of = |id: u64| sort_key.get(&id).copied().unwrap_or((u32::MAX, id));

    let mut in_degree: HashMap<NodeIndex, usize> = HashMap::new();
    for n in graph.node_indices() {
        in_degree.insert(n, graph.neighbors_directed(n, Direction::Incoming).count());
    }

    // Min-heap on (order, id) keeps equal-rank tasks in display order.
    let mut ready: BinaryHeap<std::cmp::Reverse<((u32, u64), NodeIndex)>> = graph
        .node_indices()
        .filter(|n| in_degree[n] == 0)
        .map(|n| std::cmp::Reverse((key_of(graph[n]), n)))
        .collect();

    let mut sorted = Vec::with_capacity(graph.node_count());
    while let Some(std::cmp::Reverse((_, node))) = ready.pop() {
        sorted.push(graph[node]);
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            let deg = in_degree.get_mut(&next).expect("node has a degree entry");
            *deg -= 1;
            if *deg == 0 {
                ready.push(std::cmp::Reverse((key_of(graph[next]), next)));
            }
        }
    }

    // The store enforces acyclicity, so this only fires on a corrupt file.
    if sorted.len() < graph.node_count() {
        warn!("dependency graph contains a cycle; appending unsorted tasks");
        let placed: HashSet<u64> = sorted.iter().copied().collect();
        let mut rest: Vec<u64> = graph
            .node_indices()
            .map(|n| graph[n])
            .filter(|id| !placed.contains(id))
            .collect();
        rest.sort_unstable_by_key(|&id| key_of(id));
        sorted.extend(rest);
    }

    sorted
}

/// Every task transitively downstream of `task_id`, excluding the task
/// itself. Breadth-first over the forward adjacency.
pub fn successors_of(dependencies: &[Dependency], task_id: u64) -> HashSet<u64> {
    reachable(dependencies, task_id, Direction::Outgoing)
}

/// Every task transitively upstream of `task_id`, excluding the task itself.
pub fn predecessors_of(dependencies: &[Dependency], task_id: u64) -> HashSet<u64> {
    reachable(dependencies, task_id, Direction::Incoming)
}

fn reachable(dependencies: &[Dependency], task_id: u64, dir: Direction) -> HashSet<u64> {
    let g = DependencyGraph::from_edges(dependencies, None);
    let Some(&start) = g.id_to_node.get(&task_id) else {
        return HashSet::new();
    };

    let mut seen: HashSet<NodeIndex> = HashSet::from([start]);
    let mut queue: VecDeque<NodeIndex> = VecDeque::from([start]);
    let mut out = HashSet::new();
    while let Some(node) = queue.pop_front() {
        for next in g.graph.neighbors_directed(node, dir) {
            if seen.insert(next) {
                out.insert(g.graph[next]);
                queue.push_back(next);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{DependencyKind, TaskKind};
    use chrono::{NaiveDate, Utc};

    fn task(id: u64) -> Task {
        Task {
            id,
            name: format!("task {id}"),
            start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
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

    fn dep(id: u64, from: u64, to: u64) -> Dependency {
        Dependency {
            id,
            from_task_id: from,
            to_task_id: to,
            kind: DependencyKind::FinishToStart,
            lag: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn no_cycle_in_chain() {
        let deps = vec![dep(1, 1, 2), dep(2, 2, 3)];
        let check = detect_cycle(&deps, None);
        assert!(!check.has_cycle);
        assert!(check.cycle_path.is_none());
    }

    #[test]
    fn candidate_edge_closes_cycle_with_path() {
        // 1 -> 2 -> 3, candidate 3 -> 1
        let deps = vec![dep(1, 1, 2), dep(2, 2, 3)];
        let check = detect_cycle(&deps, Some((3, 1)));
        assert!(check.has_cycle);
        assert_eq!(check.cycle_path, Some(vec![1, 2, 3, 1]));
    }

    #[test]
    fn disconnected_components_are_scanned() {
        // 1 -> 2 clean; 3 -> 4 -> 3 cyclic, in a separate component.
        let deps = vec![dep(1, 1, 2), dep(2, 3, 4), dep(3, 4, 3)];
        assert!(detect_cycle(&deps, None).has_cycle);
    }

    #[test]
    fn self_edge_is_trivial_cycle() {
        assert!(would_create_cycle(&[], 7, 7));
    }

    #[test]
    fn candidate_endpoint_not_in_edge_set() {
        // 9 appears nowhere yet; a synthetic node still lets 2 -> 9 pass.
        let deps = vec![dep(1, 1, 2)];
        assert!(!would_create_cycle(&deps, 2, 9));
        assert!(would_create_cycle(&deps, 2, 1));
    }

    #[test]
    fn topological_sort_respects_every_edge() {
        let tasks: Vec<Task> = (1..=5).map(task).collect();
        let deps = vec![dep(1, 3, 1), dep(2, 1, 5), dep(3, 3, 4)];
        let sorted = topological_sort(&tasks, &deps);
        assert_eq!(sorted.len(), 5);
        let pos: HashMap<u64, usize> =
            sorted.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        for d in &deps {
            assert!(pos[&d.from_task_id] < pos[&d.to_task_id]);
        }
    }

    #[test]
    fn topological_sort_skips_edges_to_deleted_tasks() {
        let tasks = vec![task(1), task(2)];
        // Task 99 was deleted but its edge lingers; it must not appear.
        let deps = vec![dep(1, 1, 2), dep(2, 99, 2)];
        let sorted = topological_sort(&tasks, &deps);
        assert_eq!(sorted, vec![1, 2]);
    }

    #[test]
    fn ties_drain_in_display_order() {
        let tasks: Vec<Task> = (1..=4).map(task).collect();
        let sorted = topological_sort(&tasks, &[]);
        assert_eq!(sorted, vec![1, 2, 3, 4]);
    }

    #[test]
    fn transitive_closures_exclude_start() {
        // 1 -> 2 -> 3, 1 -> 4
        let deps = vec![dep(1, 1, 2), dep(2, 2, 3), dep(3, 1, 4)];
        assert_eq!(successors_of(&deps, 1), HashSet::from([2, 3, 4]));
        assert_eq!(successors_of(&deps, 3), HashSet::new());
        assert_eq!(predecessors_of(&deps, 3), HashSet::from([1, 2]));
        assert_eq!(predecessors_of(&deps, 42), HashSet::new());
    }
}

// A* pathfinding over the navigation graph.
//
// Standard A* with a `BinaryHeap` open set (min-heap via reversed ordering).
// Edge cost is the Euclidean distance between linked nodes and the heuristic
// is the straight-line distance to the goal, which is admissible and
// consistent, so the first time the goal is popped its path is optimal.
//
// Per-node search metrics (g, h, f, opened/closed, parent) live in a
// `SearchScratch` indexed in parallel with the graph's node arena, never on
// the nodes themselves. The graph stays immutable during a search and any
// number of searches may run concurrently over one graph as long as each
// has its own scratch.
//
// Decrease-key is done by lazy re-insertion: an improved node is pushed
// again with its new f, and stale heap entries are skipped on pop because
// the node is already closed.
//
// When the goal cannot be reached the search still returns a path: the one
// leading to the expanded node with the lowest f (excluding the start), with
// `complete == false`. If nothing but the start was expanded the partial
// path is just the start node.
//
// See also: `graph.rs` for the `NavGraph` being searched, `navigator.rs`
// which exposes these operations to agents.

use crate::graph::NavGraph;
use crate::types::NavNodeId;
use glam::Vec3;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// The result of a node-level search.
#[derive(Clone, Debug, PartialEq)]
pub struct PathResult {
    /// Sequence of node IDs from start to the last node reached (inclusive).
    pub nodes: Vec<NavNodeId>,
    /// True iff the last node is the goal.
    pub complete: bool,
    /// Summed Euclidean length of the path.
    pub total_cost: f32,
}

/// The result of a point-to-point query: the positions to walk through.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FoundPath {
    pub locations: Vec<Vec3>,
    pub complete: bool,
}

/// A* bookkeeping for one node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeMetrics {
    pub g: f32,
    pub h: f32,
    pub f: f32,
    pub opened: bool,
    pub closed: bool,
    pub parent: Option<NavNodeId>,
}

impl NodeMetrics {
    const NEUTRAL: Self = Self {
        g: 0.0,
        h: 0.0,
        f: 0.0,
        opened: false,
        closed: false,
        parent: None,
    };
}

/// Reusable per-search scratch space. Keep one per agent (or per thread) to
/// avoid reallocating on every query.
#[derive(Clone, Debug, Default)]
pub struct SearchScratch {
    metrics: Vec<NodeMetrics>,
    expanded: Vec<NavNodeId>,
}

impl SearchScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every node's metrics to neutral, sized for `node_count` nodes.
    fn reset(&mut self, node_count: usize) {
        self.metrics.clear();
        self.metrics.resize(node_count, NodeMetrics::NEUTRAL);
        self.expanded.clear();
    }

    /// Metrics left behind by the last search.
    pub fn metrics(&self, node: NavNodeId) -> Option<&NodeMetrics> {
        self.metrics.get(node.index())
    }
}

/// Entry in the A* open set (min-heap via reversed ordering).
struct OpenEntry {
    node: NavNodeId,
    f_score: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score.total_cmp(&other.f_score) == Ordering::Equal && self.node == other.node
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score is "greatest".
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.node.0.cmp(&self.node.0))
    }
}

/// Find the node nearest to `point`. `None` only for an empty graph.
pub fn find_closest_node(graph: &NavGraph, point: Vec3) -> Option<NavNodeId> {
    graph.find_nearest_node(point)
}

/// A* from `start` to `goal` with a throwaway scratch.
///
/// Returns `None` only if the graph is empty or either ID is out of range;
/// an unreachable goal yields a partial path with `complete == false`.
pub fn astar(graph: &NavGraph, start: NavNodeId, goal: NavNodeId) -> Option<PathResult> {
    let mut scratch = SearchScratch::new();
    astar_with(graph, start, goal, &mut scratch)
}

/// A* from `start` to `goal` reusing `scratch`.
pub fn astar_with(
    graph: &NavGraph,
    start: NavNodeId,
    goal: NavNodeId,
    scratch: &mut SearchScratch,
) -> Option<PathResult> {
    let n = graph.node_count();
    if n == 0 || start.index() >= n || goal.index() >= n {
        return None;
    }

    scratch.reset(n);
    let goal_pos = graph.node(goal).location;

    {
        let s = &mut scratch.metrics[start.index()];
        s.h = graph.node(start).location.distance(goal_pos);
        s.f = s.h;
        s.opened = true;
    }

    let mut open = BinaryHeap::new();
    open.push(OpenEntry {
        node: start,
        f_score: scratch.metrics[start.index()].f,
    });

    while let Some(current) = open.pop() {
        let current_id = current.node;
        let ci = current_id.index();

        if scratch.metrics[ci].closed {
            continue;
        }
        scratch.metrics[ci].closed = true;
        if current_id != start {
            scratch.expanded.push(current_id);
        }

        if current_id == goal {
            return Some(reconstruct_path(graph, &scratch.metrics, goal, true));
        }

        let current_pos = graph.node(current_id).location;
        let current_g = scratch.metrics[ci].g;

        for &neighbor in graph.neighbors(current_id) {
            let ni = neighbor.index();
            let m = &mut scratch.metrics[ni];
            if m.closed {
                continue;
            }

            let neighbor_pos = graph.node(neighbor).location;
            let tentative_g = current_g + current_pos.distance(neighbor_pos);

            if !m.opened || tentative_g < m.g {
                m.g = tentative_g;
                m.h = neighbor_pos.distance(goal_pos);
                m.f = m.g + m.h;
                m.parent = Some(current_id);
                m.opened = true;
                open.push(OpenEntry {
                    node: neighbor,
                    f_score: m.f,
                });
            }
        }
    }

    // Open set exhausted: best effort toward the goal.
    let mut best = start;
    let mut best_f = f32::INFINITY;
    for &id in &scratch.expanded {
        let f = scratch.metrics[id.index()].f;
        if f < best_f {
            best_f = f;
            best = id;
        }
    }
    tracing::warn!(
        start = %start,
        goal = %goal,
        fallback = %best,
        min_f = best_f,
        "no complete path; returning partial path"
    );
    Some(reconstruct_path(graph, &scratch.metrics, best, false))
}

/// Walk parent links back from `end` and return the forward path.
fn reconstruct_path(
    graph: &NavGraph,
    metrics: &[NodeMetrics],
    end: NavNodeId,
    complete: bool,
) -> PathResult {
    let mut nodes = vec![end];
    let mut current = end;
    while let Some(parent) = metrics[current.index()].parent {
        nodes.push(parent);
        current = parent;
    }
    nodes.reverse();

    let total_cost = nodes
        .windows(2)
        .map(|w| graph.node(w[0]).location.distance(graph.node(w[1]).location))
        .sum();

    PathResult {
        nodes,
        complete,
        total_cost,
    }
}

/// Snap both points onto the graph and search between them. An empty graph
/// yields an empty, incomplete path.
pub fn find_path(graph: &NavGraph, start_point: Vec3, end_point: Vec3) -> FoundPath {
    let mut scratch = SearchScratch::new();
    find_path_with(graph, start_point, end_point, &mut scratch)
}

/// `find_path` reusing `scratch`.
pub fn find_path_with(
    graph: &NavGraph,
    start_point: Vec3,
    end_point: Vec3,
    scratch: &mut SearchScratch,
) -> FoundPath {
    let (Some(start), Some(goal)) = (
        find_closest_node(graph, start_point),
        find_closest_node(graph, end_point),
    ) else {
        tracing::warn!("no closest nodes: navigation graph is empty");
        return FoundPath::default();
    };

    match astar_with(graph, start, goal, scratch) {
        Some(result) => FoundPath {
            locations: result
                .nodes
                .iter()
                .map(|&id| graph.node(id).location)
                .collect(),
            complete: result.complete,
        },
        None => FoundPath::default(),
    }
}

/// Location and normal of the node after the start on the path from
/// `current` toward `target`. `None` if the path has fewer than two nodes.
pub fn find_next_location_and_normal(
    graph: &NavGraph,
    current: Vec3,
    target: Vec3,
) -> Option<(Vec3, Vec3)> {
    let start = find_closest_node(graph, current)?;
    let goal = find_closest_node(graph, target)?;
    let result = astar(graph, start, goal)?;
    let next = graph.node(*result.nodes.get(1)?);
    Some((next.location, next.normal))
}

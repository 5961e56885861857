// Navigation graph for surface-crawling creatures.
//
// The graph is an arena of `NavNode`s (position, surface normal, neighbor
// list) stored in a single `Vec` and addressed by `NavNodeId`. A node's id is
// always equal to its position in that `Vec`, so neighbor and parent lookups
// are O(1) index dereferences and never pointers. Edges are implicit in the
// neighbor lists; every edge is an unobstructed straight line and its cost
// is the Euclidean length, computed on demand by `pathfinding.rs`.
//
// Graphs come from two places: `persistence.rs` rebuilds them from a saved
// record (filling `saved_indices`, which maps the record's index scheme to
// arena positions), and the offline builder hands over its finished working
// set. Once loaded into a `Navigator` the graph is only read.
//
// See also: `pathfinding.rs` for A* over this graph, `persistence.rs` for
// the flat saved form, `navigator.rs` which owns the loaded graph.

use crate::types::{NavNodeId, UP};
use glam::Vec3;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Inline neighbor storage. Surface grids rarely exceed a dozen links.
pub type NeighborList = SmallVec<[NavNodeId; 12]>;

/// A position a spider can cling to.
#[derive(Clone, Debug, PartialEq)]
pub struct NavNode {
    pub id: NavNodeId,
    pub location: Vec3,
    /// Unit surface normal; the direction the spider treats as "up".
    pub normal: Vec3,
    pub neighbors: NeighborList,
}

/// The navigation graph container.
#[derive(Clone, Debug, Default)]
pub struct NavGraph {
    pub nodes: Vec<NavNode>,
    /// Index used by the saved record -> arena position. Only populated for
    /// graphs that came from a record.
    pub saved_indices: BTreeMap<u32, NavNodeId>,
}

impl NavGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Returns its ID (its arena position).
    pub fn add_node(&mut self, location: Vec3, normal: Vec3) -> NavNodeId {
        let id = NavNodeId(self.nodes.len() as u32);
        self.nodes.push(NavNode {
            id,
            location,
            normal: normal.try_normalize().unwrap_or(UP),
            neighbors: NeighborList::new(),
        });
        id
    }

    /// Add a node and remember which record index it was saved under.
    pub fn add_saved_node(&mut self, saved_index: u32, location: Vec3, normal: Vec3) -> NavNodeId {
        let id = self.add_node(location, normal);
        self.saved_indices.insert(saved_index, id);
        id
    }

    /// Arena position of the node saved under `saved_index`.
    pub fn resolve_saved(&self, saved_index: u32) -> Option<NavNodeId> {
        self.saved_indices.get(&saved_index).copied()
    }

    /// Add a link in both directions. Self-links and duplicates are ignored.
    pub fn add_edge(&mut self, a: NavNodeId, b: NavNodeId) {
        self.add_directed_neighbor(a, b);
        self.add_directed_neighbor(b, a);
    }

    /// Add `to` to `from`'s neighbor list only. Saved records store each
    /// node's list independently, so loading goes through here and relies on
    /// `symmetrize()` (or a symmetric record) for the reverse direction.
    pub fn add_directed_neighbor(&mut self, from: NavNodeId, to: NavNodeId) {
        if from == to {
            return;
        }
        let neighbors = &mut self.nodes[from.index()].neighbors;
        if !neighbors.contains(&to) {
            neighbors.push(to);
        }
    }

    /// Make every link bidirectional.
    pub fn symmetrize(&mut self) {
        let mut missing = Vec::new();
        for node in &self.nodes {
            for &n in &node.neighbors {
                if !self.nodes[n.index()].neighbors.contains(&node.id) {
                    missing.push((n, node.id));
                }
            }
        }
        for (from, to) in missing {
            self.add_directed_neighbor(from, to);
        }
    }

    /// Ids match arena positions and every link points at an existing node
    /// that links back.
    pub fn is_well_formed(&self) -> bool {
        let len = self.nodes.len();
        let in_range = self.nodes.iter().enumerate().all(|(i, node)| {
            node.id.index() == i && node.neighbors.iter().all(|n| n.index() < len)
        });
        in_range && self.is_symmetric()
    }

    /// Repair a graph that did not come from this crate's own builders:
    /// renumber ids to arena positions, drop self links and links to
    /// missing nodes, then symmetrize. Returns the number of links dropped.
    pub fn normalize(&mut self) -> usize {
        let len = self.nodes.len();
        let mut dropped = 0;
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.id = NavNodeId(i as u32);
            let before = node.neighbors.len();
            node.neighbors.retain(|n| n.index() < len && n.index() != i);
            dropped += before - node.neighbors.len();
        }
        self.saved_indices.retain(|_, id| id.index() < len);
        self.symmetrize();
        dropped
    }

    /// True if for every A→B link there is a B→A link.
    pub fn is_symmetric(&self) -> bool {
        self.nodes.iter().all(|node| {
            node.neighbors
                .iter()
                .all(|n| self.nodes[n.index()].neighbors.contains(&node.id))
        })
    }

    /// Neighbors of a node.
    pub fn neighbors(&self, node: NavNodeId) -> &[NavNodeId] {
        &self.nodes[node.index()].neighbors
    }

    /// Get a node by ID.
    pub fn node(&self, id: NavNodeId) -> &NavNode {
        &self.nodes[id.index()]
    }

    /// Get a node by ID, or `None` if the ID is out of range.
    pub fn get(&self, id: NavNodeId) -> Option<&NavNode> {
        self.nodes.get(id.index())
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of undirected links, counting an asymmetric link once.
    pub fn edge_count(&self) -> usize {
        let mut count = 0;
        for node in &self.nodes {
            for &n in &node.neighbors {
                let reverse = self.nodes[n.index()].neighbors.contains(&node.id);
                if !reverse || node.id < n {
                    count += 1;
                }
            }
        }
        count
    }

    /// Find the node nearest to `point` (Euclidean). Linear scan; on ties the
    /// node with the lowest ID wins. Returns `None` if the graph is empty.
    pub fn find_nearest_node(&self, point: Vec3) -> Option<NavNodeId> {
        let mut best: Option<(NavNodeId, f32)> = None;
        for node in &self.nodes {
            let d = node.location.distance_squared(point);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((node.id, d)),
            }
        }
        best.map(|(id, _)| id)
    }
}

// Counters collected over one build.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    /// Lattice points sampled inside the builder volume.
    pub tracers: usize,
    /// Tracers dropped because they overlapped solid geometry.
    pub enclosed_tracers_removed: usize,
    pub rays_cast: usize,
    pub ray_hits: usize,
    /// Hits rejected by the allow/deny lists.
    pub rejected_by_filter: usize,
    /// Hits rejected for landing too close to an accepted point.
    pub rejected_by_proximity: usize,
    /// Surface nodes that entered adjacency.
    pub surface_nodes: usize,
    /// Direct line-of-sight links.
    pub edges: usize,
    /// Close pairs without line of sight.
    pub possible_edges: usize,
    /// Corner nodes synthesized from possible edges.
    pub edge_nodes: usize,
    /// Possible edges resolved through a corner node.
    pub resolved_edges: usize,
    /// Nodes dropped for having one neighbor or none.
    pub pruned_nodes: usize,
    /// Nodes in the finished graph.
    pub final_nodes: usize,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tracers ({} enclosed), {} rays / {} hits, {} surface nodes, \
             {} edges, {} possible edges ({} resolved via {} corner nodes), \
             {} pruned, {} final nodes",
            self.tracers,
            self.enclosed_tracers_removed,
            self.rays_cast,
            self.ray_hits,
            self.surface_nodes,
            self.edges,
            self.possible_edges,
            self.resolved_edges,
            self.edge_nodes,
            self.pruned_nodes,
            self.final_nodes,
        )
    }
}

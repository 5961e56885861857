// Orphan pruning and graph assembly.
//
// One pass over the finished adjacency: nodes with one neighbor or none are
// dropped, the survivors are renumbered in their original order, and links
// to dropped nodes are removed. A node that falls to one neighbor because
// its other neighbor was pruned is kept; pruning is not repeated.

use crate::adjacency::Adjacency;
use crate::surface::SurfacePoint;
use spider_nav::{NavGraph, NavNodeId};

/// Build the final graph from `points` and `adjacency`. Returns the graph
/// and the number of pruned nodes.
pub fn prune_orphans(points: &[SurfacePoint], adjacency: &Adjacency) -> (NavGraph, usize) {
    let mut remap: Vec<Option<NavNodeId>> = vec![None; points.len()];
    let mut graph = NavGraph::new();
    for (i, point) in points.iter().enumerate() {
        if adjacency.neighbors[i].len() > 1 {
            remap[i] = Some(graph.add_node(point.location, point.normal));
        }
    }

    for (i, neighbors) in adjacency.neighbors.iter().enumerate() {
        let Some(from) = remap[i] else {
            continue;
        };
        for &j in neighbors {
            if let Some(to) = remap[j as usize] {
                graph.add_directed_neighbor(from, to);
            }
        }
    }

    let pruned = points.len() - graph.node_count();
    (graph, pruned)
}

// Visibility adjacency between surface points.
//
// All points go into a spatial hash whose cells are the connection radius
// times `relation_cell_multiplier` (never smaller than the radius, so the
// 3x3x3 neighborhood always covers it). Each point then looks at the
// candidates around it with a higher index and within the connection
// radius, and asks the world whether the straight line between them is
// clear, ignoring the builder volume. Clear pairs become symmetric links;
// blocked pairs are kept as possible edges for `edges.rs` to resolve.
//
// Points are processed in parallel with rayon. Each worker computes its
// point's links on its own and only takes the shared lock to merge the
// finished result, inserting both directions in one critical section.
// Because only pairs `i < j` are tested, every pair is decided exactly once
// and the result does not depend on scheduling.

use crate::cancel::CancelToken;
use crate::config::{BuildConfig, BuilderVolume};
use crate::error::Result;
use crate::executor::{Ray, WorldHandle};
use crate::spatial_hash::SpatialHash;
use crate::surface::SurfacePoint;
use glam::Vec3;
use parking_lot::Mutex;
use rayon::prelude::*;
use spider_nav::debug::{Color, DebugSink};
use std::collections::BTreeSet;

/// Links between surface points, by index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Adjacency {
    /// Symmetric neighbor sets, parallel to the point list.
    pub neighbors: Vec<BTreeSet<u32>>,
    /// Close pairs `(i, j)`, `i < j`, with no line of sight. Sorted.
    pub possible_edges: Vec<(u32, u32)>,
}

impl Adjacency {
    /// Number of undirected links.
    pub fn edge_count(&self) -> usize {
        self.neighbors.iter().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn link(&mut self, a: u32, b: u32) {
        if a != b {
            self.neighbors[a as usize].insert(b);
            self.neighbors[b as usize].insert(a);
        }
    }

    pub fn is_symmetric(&self) -> bool {
        self.neighbors.iter().enumerate().all(|(i, set)| {
            set.iter()
                .all(|&j| self.neighbors[j as usize].contains(&(i as u32)))
        })
    }
}

/// Candidates `j > i` within `radius` of point `i`, ascending.
fn candidates(hash: &SpatialHash, locations: &[Vec3], i: usize, radius_sq: f32) -> Vec<u32> {
    let a = locations[i];
    let mut found: Vec<u32> = hash
        .neighbors(a)
        .filter(|&(b, j)| j as usize > i && a.distance_squared(b) <= radius_sq)
        .map(|(_, j)| j)
        .collect();
    found.sort_unstable();
    found
}

/// Link every mutually visible pair within the connection radius.
pub fn build_adjacency(
    world: &WorldHandle,
    points: &[SurfacePoint],
    config: &BuildConfig,
    volume: &BuilderVolume,
    sink: &dyn DebugSink,
    cancel: &CancelToken,
) -> Result<Adjacency> {
    let locations: Vec<Vec3> = points.iter().map(|p| p.location).collect();
    let radius = config.connection_radius();
    let radius_sq = radius * radius;
    let hash = SpatialHash::from_points(&locations, config.cell_size().max(radius));
    let ignore = volume.ignore_set();
    tracing::debug!(
        points = locations.len(),
        cells = hash.cell_count(),
        cell_size = hash.cell_size(),
        "spatial hash built"
    );

    let neighbors = Mutex::new(vec![BTreeSet::new(); locations.len()]);
    let possible = Mutex::new(Vec::new());

    (0..locations.len()).into_par_iter().try_for_each(|i| -> Result<()> {
        cancel.check()?;
        let near = candidates(&hash, &locations, i, radius_sq);
        if near.is_empty() {
            return Ok(());
        }
        let a = locations[i];
        let rays: Vec<Ray> = near.iter().map(|&j| (a, locations[j as usize])).collect();
        let hits = world.line_trace_batch(rays, &ignore)?;

        let mut visible = Vec::new();
        let mut blocked = Vec::new();
        for (&j, hit) in near.iter().zip(hits) {
            if hit.is_none() {
                visible.push(j);
                if config.debug_draw {
                    sink.line(a, locations[j as usize], Color::BLUE, 1.0);
                }
            } else {
                blocked.push((i as u32, j));
            }
        }

        {
            let mut shared = neighbors.lock();
            for &j in &visible {
                shared[i].insert(j);
                shared[j as usize].insert(i as u32);
            }
        }
        if !blocked.is_empty() {
            possible.lock().extend(blocked);
        }
        Ok(())
    })?;

    let mut possible_edges = possible.into_inner();
    possible_edges.sort_unstable();
    Ok(Adjacency {
        neighbors: neighbors.into_inner(),
        possible_edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::WorldExecutor;
    use glam::UVec3;
    use spider_nav::ObjectId;
    use spider_nav::debug::NullSink;
    use spider_nav::world::VoxelWorld;

    fn point(x: f32, y: f32, z: f32) -> SurfacePoint {
        SurfacePoint {
            location: Vec3::new(x, y, z),
            normal: Vec3::Z,
        }
    }

    fn empty_world() -> VoxelWorld {
        VoxelWorld::new(UVec3::splat(40), Vec3::splat(-200.0), 10.0)
    }

    fn run(world: VoxelWorld, points: &[SurfacePoint], config: &BuildConfig) -> Adjacency {
        let executor = WorldExecutor::spawn(world).unwrap();
        let handle = executor.handle();
        build_adjacency(
            &handle,
            points,
            config,
            &BuilderVolume::new(Vec3::ZERO, Vec3::splat(200.0)),
            &NullSink,
            &CancelToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn links_points_within_radius_only() {
        // Default radius is 88: 80 apart links, 89 apart does not.
        let points = [
            point(-100.0, 0.0, 5.0),
            point(-20.0, 0.0, 5.0),
            point(60.0, 0.0, 5.0),
            point(149.0, 0.0, 5.0),
        ];
        let adj = run(empty_world(), &points, &BuildConfig::default());
        assert_eq!(adj.neighbors[0], BTreeSet::from([1]));
        assert_eq!(adj.neighbors[1], BTreeSet::from([0, 2]));
        assert_eq!(adj.neighbors[2], BTreeSet::from([1]));
        assert!(adj.neighbors[3].is_empty());
        assert!(adj.possible_edges.is_empty());
        assert_eq!(adj.edge_count(), 2);
    }

    #[test]
    fn blocked_pairs_become_possible_edges() {
        let mut world = empty_world();
        // Wall across x in [30, 50].
        world.fill_box(
            Vec3::new(30.0, -200.0, -200.0),
            Vec3::new(50.0, 200.0, 200.0),
            Some(ObjectId(4)),
        );
        let points = [point(0.0, 0.0, 5.0), point(80.0, 0.0, 5.0), point(0.0, 30.0, 5.0)];
        let adj = run(world, &points, &BuildConfig::default());
        assert_eq!(adj.neighbors[0], BTreeSet::from([2]));
        assert!(adj.neighbors[1].is_empty());
        assert_eq!(adj.possible_edges, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn result_is_symmetric_on_dense_cloud() {
        let points: Vec<SurfacePoint> = (0..6)
            .flat_map(|x| {
                (0..6).map(move |y| point(x as f32 * 35.0 - 90.0, y as f32 * 35.0 - 90.0, 5.0))
            })
            .collect();
        let adj = run(empty_world(), &points, &BuildConfig::default());
        assert!(adj.is_symmetric());
        // Spacing 35, radius 88: an interior point reaches offsets with
        // dx^2 + dy^2 <= 5 (4 + 4 + 4 + 8). The (2, 2) diagonal is 99 away.
        let interior = 2 * 6 + 2;
        assert_eq!(adj.neighbors[interior].len(), 20);
    }

    #[test]
    fn cancelled_before_start() {
        let executor = WorldExecutor::spawn(empty_world()).unwrap();
        let handle = executor.handle();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = build_adjacency(
            &handle,
            &[point(0.0, 0.0, 0.0), point(1.0, 0.0, 0.0)],
            &BuildConfig::default(),
            &BuilderVolume::new(Vec3::ZERO, Vec3::ONE),
            &NullSink,
            &cancel,
        );
        assert!(matches!(result, Err(crate::error::BuildError::Cancelled)));
    }
}

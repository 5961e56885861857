// Edge-intersection nodes: routing around convex corners.
//
// Two surface points on adjacent faces of a box (say the top and a side)
// are close together but cannot see each other: the straight line between
// them cuts through the corner. A spider can still walk from one to the
// other by going over the edge. For each such possible edge, both points
// probe short lines in the 26 lattice directions; wherever a probe from
// each side nearly meets the other (closest approach within
// `edge_deviation`, both closest points forward of their origins and no
// further than the probe length), the midpoint of the closest approach is a
// candidate corner node. Both links to a corner are ordinary graph links,
// so a candidate further than the connection radius from either point is
// discarded. The candidate with the shortest detour that both points can
// see becomes a new node linked to both, with the blended normal of the
// pair.
//
// Candidate search and visibility checks run in parallel across pairs.
// Nodes are then created sequentially in pair order, so the output is
// deterministic. A corner node that lands within the dedup distance of one
// created earlier reuses the nearest such node that both points can see
// and that lies within the connection radius of both. Earlier corner nodes
// are looked up through a spatial hash. Visibility is always traced from
// the original points toward the corner.

use crate::adjacency::Adjacency;
use crate::cancel::CancelToken;
use crate::config::{BuildConfig, BuilderVolume};
use crate::error::Result;
use crate::executor::{Ray, WorldHandle};
use crate::spatial_hash::SpatialHash;
use crate::stats::BuildStats;
use crate::surface::SurfacePoint;
use glam::Vec3;
use rayon::prelude::*;
use spider_nav::ObjectId;
use spider_nav::debug::{Color, DebugSink};
use spider_nav::types::blend_normals;

/// Below this, two probe directions count as parallel.
const PARALLEL_EPSILON: f32 = 1e-4;

/// Candidates checked for visibility per executor round trip.
const VISIBILITY_CHUNK: usize = 16;

/// The 26 unit directions toward the neighbors of a lattice cell.
pub fn lattice_directions() -> Vec<Vec3> {
    let mut dirs = Vec::with_capacity(26);
    for x in -1..=1 {
        for y in -1..=1 {
            for z in -1..=1 {
                if (x, y, z) != (0, 0, 0) {
                    dirs.push(Vec3::new(x as f32, y as f32, z as f32).normalize());
                }
            }
        }
    }
    dirs
}

/// Closest approach between the segments `p1 + s * d1` and `p3 + t * d3`
/// treated as infinite lines. Returns `(s, t, point_on_first,
/// point_on_second)`, or `None` if the lines are parallel.
pub fn closest_points_between_lines(
    p1: Vec3,
    d1: Vec3,
    p3: Vec3,
    d3: Vec3,
) -> Option<(f32, f32, Vec3, Vec3)> {
    let p13 = p1 - p3;
    let d1343 = p13.dot(d3);
    let d4321 = d3.dot(d1);
    let d1321 = p13.dot(d1);
    let d4343 = d3.dot(d3);
    let d2121 = d1.dot(d1);

    if d4343 < f32::EPSILON || d2121 < f32::EPSILON {
        return None;
    }
    let denom = d2121 * d4343 - d4321 * d4321;
    if denom.abs() < PARALLEL_EPSILON * d2121 * d4343 {
        return None;
    }
    let s = (d1343 * d4321 - d1321 * d4343) / denom;
    let t = (d1343 + s * d4321) / d4343;
    Some((s, t, p1 + d1 * s, p3 + d3 * t))
}

/// A geometric corner candidate for one pair.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CornerCandidate {
    point: Vec3,
    detour: f32,
}

/// Corner candidates for the pair `a`/`b`, shortest detour first. Neither
/// leg of a candidate is longer than `max_leg`.
fn corner_candidates(
    a: Vec3,
    b: Vec3,
    dirs: &[Vec3],
    probe_length: f32,
    max_deviation: f32,
    max_leg: f32,
) -> Vec<CornerCandidate> {
    let mut found = Vec::new();
    for &da in dirs {
        for &db in dirs {
            if da.dot(db).abs() > 1.0 - PARALLEL_EPSILON {
                continue;
            }
            let Some((s, t, on_a, on_b)) =
                closest_points_between_lines(a, da * probe_length, b, db * probe_length)
            else {
                continue;
            };
            if s <= 0.0 || s > 1.0 || t <= 0.0 || t > 1.0 {
                continue;
            }
            if on_a.distance(on_b) > max_deviation {
                continue;
            }
            let point = (on_a + on_b) * 0.5;
            let (leg_a, leg_b) = (a.distance(point), point.distance(b));
            if leg_a > max_leg || leg_b > max_leg {
                continue;
            }
            found.push(CornerCandidate {
                point,
                detour: leg_a + leg_b,
            });
        }
    }
    found.sort_by(|x, y| x.detour.total_cmp(&y.detour));
    found.dedup_by(|x, y| x.point.distance_squared(y.point) < 1e-6);
    found
}

/// Shortest-detour candidate both endpoints can see, if any.
fn resolve_pair(
    world: &WorldHandle,
    a: Vec3,
    b: Vec3,
    dirs: &[Vec3],
    config: &BuildConfig,
    ignore: &[ObjectId],
) -> Result<Option<Vec3>> {
    let candidates = corner_candidates(
        a,
        b,
        dirs,
        config.edge_trace_distance(),
        config.edge_deviation(),
        config.connection_radius(),
    );
    for chunk in candidates.chunks(VISIBILITY_CHUNK) {
        let rays: Vec<Ray> = chunk
            .iter()
            .flat_map(|c| [(a, c.point), (b, c.point)])
            .collect();
        let hits = world.line_trace_batch(rays, ignore)?;
        let visible = chunk
            .iter()
            .zip(hits.chunks(2))
            .find(|(_, pair)| pair.iter().all(Option::is_none));
        if let Some((c, _)) = visible {
            return Ok(Some(c.point));
        }
    }
    Ok(None)
}

/// Resolve possible edges into corner nodes. New nodes are appended to
/// `points` and `adjacency.neighbors`.
#[allow(clippy::too_many_arguments)]
pub fn resolve_edges(
    world: &WorldHandle,
    points: &mut Vec<SurfacePoint>,
    adjacency: &mut Adjacency,
    config: &BuildConfig,
    volume: &BuilderVolume,
    sink: &dyn DebugSink,
    cancel: &CancelToken,
    stats: &mut BuildStats,
) -> Result<()> {
    let dirs = lattice_directions();
    let ignore = volume.ignore_set();

    let resolved: Vec<(u32, u32, Vec3)> = {
        let points = &*points;
        adjacency
            .possible_edges
            .par_iter()
            .map(|&(i, j)| -> Result<Option<(u32, u32, Vec3)>> {
                cancel.check()?;
                let (a, b) = (points[i as usize].location, points[j as usize].location);
                Ok(resolve_pair(world, a, b, &dirs, config, &ignore)?.map(|p| (i, j, p)))
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect()
    };

    let reuse_radius = config.dedup_distance();
    let max_leg = config.connection_radius();
    let mut corner_nodes = SpatialHash::new(reuse_radius);
    for (i, j, corner) in resolved {
        cancel.check()?;
        let (a, b) = (points[i as usize], points[j as usize]);

        let mut nearby: Vec<(f32, u32)> = corner_nodes
            .neighbors(corner)
            .filter(|&(at, _)| {
                at.distance(corner) <= reuse_radius
                    && a.location.distance(at) <= max_leg
                    && b.location.distance(at) <= max_leg
            })
            .map(|(at, k)| (at.distance(corner), k))
            .collect();
        nearby.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

        let mut target = None;
        for (_, existing) in nearby {
            let at = points[existing as usize].location;
            if world.line_of_sight(a.location, at, &ignore)?
                && world.line_of_sight(b.location, at, &ignore)?
            {
                target = Some(existing);
                break;
            }
        }
        let node = match target {
            Some(existing) => existing,
            None => {
                let index = points.len() as u32;
                points.push(SurfacePoint {
                    location: corner,
                    normal: blend_normals(a.normal, b.normal),
                });
                adjacency.neighbors.push(Default::default());
                corner_nodes.insert(corner, index);
                stats.edge_nodes += 1;
                if config.debug_draw {
                    sink.sphere(corner, 6.0, Color::MAGENTA, 1.0);
                }
                index
            }
        };
        adjacency.link(i, node);
        adjacency.link(j, node);
        stats.resolved_edges += 1;
        if config.debug_draw {
            sink.line(a.location, corner, Color::CYAN, 1.0);
            sink.line(corner, b.location, Color::CYAN, 1.0);
        }
    }
    tracing::debug!(
        possible = adjacency.possible_edges.len(),
        resolved = stats.resolved_edges,
        corner_nodes = stats.edge_nodes,
        "edge intersections resolved"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::WorldExecutor;
    use glam::UVec3;
    use spider_nav::debug::NullSink;
    use spider_nav::world::VoxelWorld;
    use std::collections::BTreeSet;

    #[test]
    fn twenty_six_unit_directions() {
        let dirs = lattice_directions();
        assert_eq!(dirs.len(), 26);
        assert!(dirs.iter().all(|d| (d.length() - 1.0).abs() < 1e-5));
    }

    #[test]
    fn perpendicular_lines_meet() {
        let (s, t, pa, pb) = closest_points_between_lines(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(5.0, -5.0, 2.0),
            Vec3::new(0.0, 10.0, 0.0),
        )
        .unwrap();
        assert!((s - 0.5).abs() < 1e-5);
        assert!((t - 0.5).abs() < 1e-5);
        assert!((pa - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);
        assert!((pb - Vec3::new(5.0, 0.0, 2.0)).length() < 1e-4);
    }

    #[test]
    fn parallel_lines_have_no_intersection() {
        assert!(
            closest_points_between_lines(Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::X * 3.0).is_none()
        );
        assert!(closest_points_between_lines(Vec3::ZERO, Vec3::ZERO, Vec3::Y, Vec3::X).is_none());
    }

    #[test]
    fn candidates_must_lie_ahead_of_both_points() {
        // Points facing away: any meeting point would be behind one of them.
        let dirs = [Vec3::X, Vec3::Y];
        let behind = Vec3::new(-10.0, -10.0, 0.0);
        assert!(corner_candidates(Vec3::ZERO, behind, &dirs, 50.0, 1.0, 100.0).is_empty());

        let found =
            corner_candidates(Vec3::ZERO, Vec3::new(10.0, -10.0, 0.0), &dirs, 50.0, 1.0, 100.0);
        assert_eq!(found.len(), 1);
        assert!((found[0].point - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn candidates_respect_the_leg_limit() {
        let dirs = [Vec3::X, Vec3::Y];
        let b = Vec3::new(10.0, -10.0, 0.0);
        // The only meeting point, (10, 0, 0), is 10 from both ends.
        assert_eq!(corner_candidates(Vec3::ZERO, b, &dirs, 50.0, 1.0, 10.0).len(), 1);
        assert!(corner_candidates(Vec3::ZERO, b, &dirs, 50.0, 1.0, 9.0).is_empty());
    }

    /// A solid block whose top face is z = 0 and whose +x face is x = 0.
    fn step_world() -> VoxelWorld {
        let mut world = VoxelWorld::new(UVec3::splat(40), Vec3::splat(-200.0), 10.0);
        world.fill_box(
            Vec3::new(-200.0, -200.0, -200.0),
            Vec3::new(0.0, 200.0, 0.0),
            Some(ObjectId(1)),
        );
        world
    }

    #[test]
    fn corner_node_bridges_top_and_side() {
        let executor = WorldExecutor::spawn(step_world()).unwrap();
        let world = executor.handle();

        // One node on the top face, one on the +x side face.
        let mut points = vec![
            SurfacePoint {
                location: Vec3::new(-30.0, 0.0, 5.0),
                normal: Vec3::Z,
            },
            SurfacePoint {
                location: Vec3::new(5.0, 0.0, -30.0),
                normal: Vec3::X,
            },
        ];
        assert!(!world.line_of_sight(points[0].location, points[1].location, &[]).unwrap());

        let mut adjacency = Adjacency {
            neighbors: vec![BTreeSet::new(), BTreeSet::new()],
            possible_edges: vec![(0, 1)],
        };
        let mut stats = BuildStats::default();
        resolve_edges(
            &world,
            &mut points,
            &mut adjacency,
            &BuildConfig::default(),
            &BuilderVolume::new(Vec3::ZERO, Vec3::splat(100.0)),
            &NullSink,
            &CancelToken::new(),
            &mut stats,
        )
        .unwrap();

        assert_eq!(stats.edge_nodes, 1);
        assert_eq!(points.len(), 3);
        let (a, b, corner) = (points[0].location, points[1].location, points[2]);
        assert!(world.line_of_sight(a, corner.location, &[]).unwrap());
        assert!(world.line_of_sight(b, corner.location, &[]).unwrap());
        // (5, 0, 5), straight over the edge, is always a candidate; nothing
        // worse than it may win.
        let detour = a.distance(corner.location) + corner.location.distance(b);
        assert!(detour <= 70.0 + 1e-3, "detour {detour}");
        let expected_normal = (Vec3::Z + Vec3::X).normalize();
        assert!((corner.normal - expected_normal).length() < 1e-5);

        assert_eq!(adjacency.neighbors[0], BTreeSet::from([2]));
        assert_eq!(adjacency.neighbors[1], BTreeSet::from([2]));
        assert_eq!(adjacency.neighbors[2], BTreeSet::from([0, 1]));
        assert!(adjacency.is_symmetric());
    }

    #[test]
    fn nearby_corner_nodes_are_shared() {
        let executor = WorldExecutor::spawn(step_world()).unwrap();
        let world = executor.handle();
        // Two coincident copies of the top/side pair resolve to the same
        // corner; the second one links to the first's node.
        let top = SurfacePoint {
            location: Vec3::new(-30.0, 0.0, 5.0),
            normal: Vec3::Z,
        };
        let side = SurfacePoint {
            location: Vec3::new(5.0, 0.0, -30.0),
            normal: Vec3::X,
        };
        let mut points = vec![top, side, top, side];
        let mut adjacency = Adjacency {
            neighbors: vec![BTreeSet::new(); 4],
            possible_edges: vec![(0, 1), (2, 3)],
        };
        let mut stats = BuildStats::default();
        resolve_edges(
            &world,
            &mut points,
            &mut adjacency,
            &BuildConfig::default(),
            &BuilderVolume::new(Vec3::ZERO, Vec3::splat(100.0)),
            &NullSink,
            &CancelToken::new(),
            &mut stats,
        )
        .unwrap();

        assert_eq!(stats.resolved_edges, 2);
        assert_eq!(stats.edge_nodes, 1);
        assert_eq!(points.len(), 5);
        assert_eq!(adjacency.neighbors[4], BTreeSet::from([0, 1, 2, 3]));
    }

    #[test]
    fn mirrored_slab_pairs_do_not_share_a_far_corner() {
        // Two slabs with a 120-unit gap. Each pair couples a top node with an
        // underside node further along y; the only corner both can see hangs
        // in the middle of the gap, more than a link length from either.
        let mut world = VoxelWorld::new(UVec3::splat(40), Vec3::splat(-200.0), 10.0);
        for (min_x, max_x) in [(-200.0, -60.0), (60.0, 200.0)] {
            world.fill_box(
                Vec3::new(min_x, -100.0, -20.0),
                Vec3::new(max_x, 100.0, 0.0),
                Some(ObjectId(5)),
            );
        }
        let executor = WorldExecutor::spawn(world).unwrap();
        let handle = executor.handle();
        let at = |x: f32, y: f32, z: f32, normal: Vec3| SurfacePoint {
            location: Vec3::new(x, y, z),
            normal,
        };
        let mut points = vec![
            at(-80.0, -60.0, 5.0, Vec3::Z),
            at(-80.0, 20.0, -25.0, Vec3::NEG_Z),
            at(80.0, -60.0, 5.0, Vec3::Z),
            at(80.0, 20.0, -25.0, Vec3::NEG_Z),
        ];
        let mut adjacency = Adjacency {
            neighbors: vec![BTreeSet::new(); 4],
            possible_edges: vec![(0, 1), (2, 3)],
        };
        let config = BuildConfig::default();
        let mut stats = BuildStats::default();
        resolve_edges(
            &handle,
            &mut points,
            &mut adjacency,
            &config,
            &BuilderVolume::new(Vec3::ZERO, Vec3::splat(200.0)),
            &NullSink,
            &CancelToken::new(),
            &mut stats,
        )
        .unwrap();

        for (k, neighbors) in adjacency.neighbors.iter().enumerate().skip(4) {
            let corner = points[k].location;
            let sides: BTreeSet<bool> = neighbors.iter().map(|&n| n < 2).collect();
            assert_eq!(sides.len(), 1, "corner {corner} joins both slabs");
            for &n in neighbors {
                assert!(points[n as usize].location.distance(corner) <= config.connection_radius());
            }
        }
        assert_eq!(stats.edge_nodes, 0);
    }

    #[test]
    fn fully_enclosed_pair_stays_unresolved() {
        let mut world = VoxelWorld::new(UVec3::splat(40), Vec3::splat(-200.0), 10.0);
        // A thick wall between the two points, taller than any probe reaches.
        world.fill_box(
            Vec3::new(-20.0, -200.0, -200.0),
            Vec3::new(20.0, 200.0, 200.0),
            Some(ObjectId(3)),
        );
        let executor = WorldExecutor::spawn(world).unwrap();
        let handle = executor.handle();
        let mut points = vec![
            SurfacePoint {
                location: Vec3::new(-40.0, 0.0, 0.0),
                normal: Vec3::NEG_X,
            },
            SurfacePoint {
                location: Vec3::new(40.0, 0.0, 0.0),
                normal: Vec3::X,
            },
        ];
        let mut adjacency = Adjacency {
            neighbors: vec![BTreeSet::new(); 2],
            possible_edges: vec![(0, 1)],
        };
        let mut stats = BuildStats::default();
        resolve_edges(
            &handle,
            &mut points,
            &mut adjacency,
            &BuildConfig::default(),
            &BuilderVolume::new(Vec3::ZERO, Vec3::splat(100.0)),
            &NullSink,
            &CancelToken::new(),
            &mut stats,
        )
        .unwrap();
        assert_eq!(stats.edge_nodes, 0);
        assert_eq!(points.len(), 2);
        assert!(adjacency.neighbors.iter().all(BTreeSet::is_empty));
    }
}

// Surface discovery: from tracer points to surface nodes.
//
// Each tracer casts six axis-aligned rays. A ray starts `trace_start_offset`
// from the tracer and runs `trace_distance` further; a blocking hit becomes
// a candidate node pushed `bounce_distance` off the surface along the hit
// normal, so nodes float just above the geometry instead of sitting on it.
//
// Candidates pass through `SurfacePointSet::add_candidate`: the optional
// allow list, then the optional deny list, then proximity dedup against
// every already-accepted point. Dedup goes through a spatial hash whose
// cells equal the dedup threshold, so it stays cheap for large scenes.
// First come, first kept: results depend on tracer order, which sampling
// makes deterministic.
//
// Before tracing, tracers that overlap solid geometry can be removed
// (`remove_enclosed_tracers`). A tracer inside a wall would otherwise
// report hits on the wall's inner faces.

use crate::cancel::CancelToken;
use crate::config::{BuildConfig, BuilderVolume};
use crate::error::Result;
use crate::executor::{Ray, WorldHandle};
use crate::spatial_hash::SpatialHash;
use crate::stats::BuildStats;
use glam::Vec3;
use spider_nav::debug::{Color, DebugSink};
use spider_nav::{ObjectId, OverlapShape};
use std::collections::BTreeSet;

/// The six directions traced from every tracer.
pub const TRACE_DIRECTIONS: [Vec3; 6] = [
    Vec3::X,
    Vec3::NEG_X,
    Vec3::Y,
    Vec3::NEG_Y,
    Vec3::Z,
    Vec3::NEG_Z,
];

/// A node-to-be: position and surface normal, no identity yet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfacePoint {
    pub location: Vec3,
    pub normal: Vec3,
}

/// Outcome of offering a hit to the point set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Candidate {
    /// Kept, at this index.
    Accepted(u32),
    /// Rejected by the allow or deny list.
    Filtered,
    /// Rejected for lying within the dedup distance of a kept point.
    TooClose,
}

/// Accepted surface points plus the filters that guard them.
#[derive(Clone, Debug)]
pub struct SurfacePointSet {
    points: Vec<SurfacePoint>,
    hash: SpatialHash,
    dedup_distance: f32,
    allow: Option<BTreeSet<ObjectId>>,
    deny: Option<BTreeSet<ObjectId>>,
}

impl SurfacePointSet {
    pub fn new(config: &BuildConfig) -> Self {
        let dedup_distance = config.dedup_distance();
        Self {
            points: Vec::new(),
            hash: SpatialHash::new(dedup_distance),
            dedup_distance,
            allow: config.allow_list.clone(),
            deny: config.deny_list.clone(),
        }
    }

    pub fn add_candidate(&mut self, location: Vec3, normal: Vec3, object: ObjectId) -> Candidate {
        if self.allow.as_ref().is_some_and(|allow| !allow.contains(&object)) {
            return Candidate::Filtered;
        }
        if self.deny.as_ref().is_some_and(|deny| deny.contains(&object)) {
            return Candidate::Filtered;
        }
        if self.hash.any_within(location, self.dedup_distance) {
            return Candidate::TooClose;
        }

        let index = self.points.len() as u32;
        self.hash.insert(location, index);
        self.points.push(SurfacePoint {
            location,
            normal: spider_nav::types::normalize_or_up(normal),
        });
        Candidate::Accepted(index)
    }

    pub fn points(&self) -> &[SurfacePoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<SurfacePoint> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Drop tracers whose overlap sphere touches anything but the builder
/// volume. Returns the survivors, in order.
pub fn remove_enclosed_tracers(
    world: &WorldHandle,
    tracers: Vec<Vec3>,
    config: &BuildConfig,
    volume: &BuilderVolume,
    cancel: &CancelToken,
    stats: &mut BuildStats,
) -> Result<Vec<Vec3>> {
    let ignore = volume.ignore_set();
    let radius = config.enclosed_check_distance;
    let mut kept = Vec::with_capacity(tracers.len());

    for batch in tracers.chunks(config.trace_batch_size) {
        cancel.check()?;
        let shapes = batch
            .iter()
            .map(|&center| OverlapShape::Sphere { center, radius })
            .collect();
        let overlaps = world.overlap_batch(shapes, &ignore)?;
        for (&tracer, found) in batch.iter().zip(overlaps) {
            if found.is_empty() {
                kept.push(tracer);
            } else {
                stats.enclosed_tracers_removed += 1;
            }
        }
    }
    tracing::debug!(
        kept = kept.len(),
        removed = stats.enclosed_tracers_removed,
        "enclosed tracer check done"
    );
    Ok(kept)
}

/// Cast the six rays from every tracer and collect accepted surface points.
pub fn trace_surface_points(
    world: &WorldHandle,
    tracers: &[Vec3],
    config: &BuildConfig,
    volume: &BuilderVolume,
    sink: &dyn DebugSink,
    cancel: &CancelToken,
    stats: &mut BuildStats,
) -> Result<SurfacePointSet> {
    let ignore = volume.ignore_set();
    let offset = config.trace_start_offset;
    let distance = config.trace_distance();
    let mut set = SurfacePointSet::new(config);

    for (batch_index, batch) in tracers.chunks(config.trace_batch_size).enumerate() {
        cancel.check()?;
        let rays: Vec<Ray> = batch
            .iter()
            .flat_map(|&base| {
                TRACE_DIRECTIONS.iter().map(move |&dir| {
                    let start = base + dir * offset;
                    (start, start + dir * distance)
                })
            })
            .collect();
        stats.rays_cast += rays.len();
        let hits = world.line_trace_batch(rays.clone(), &ignore)?;

        for (&(start, end), hit) in rays.iter().zip(hits) {
            let Some(hit) = hit else {
                if config.debug_draw {
                    sink.line(start, end, Color::RED, 0.25);
                }
                continue;
            };
            stats.ray_hits += 1;
            let location = hit.location + hit.normal * config.bounce_distance;
            match set.add_candidate(location, hit.normal, hit.object) {
                Candidate::Accepted(_) => {
                    if config.debug_draw {
                        sink.sphere(location, 6.0, Color::GREEN, 0.75);
                    }
                }
                Candidate::Filtered => stats.rejected_by_filter += 1,
                Candidate::TooClose => stats.rejected_by_proximity += 1,
            }
        }
        tracing::trace!(batch = batch_index, accepted = set.len(), "surface batch traced");
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::WorldExecutor;
    use glam::UVec3;
    use spider_nav::debug::{DebugDraw, NullSink, RecordingSink};
    use spider_nav::world::VoxelWorld;

    const FLOOR: ObjectId = ObjectId(1);
    const PILLAR: ObjectId = ObjectId(2);

    fn config() -> BuildConfig {
        BuildConfig::default()
    }

    #[test]
    fn points_one_unit_apart_collapse_to_one() {
        let mut set = SurfacePointSet::new(&config());
        assert_eq!(set.add_candidate(Vec3::ZERO, Vec3::Z, FLOOR), Candidate::Accepted(0));
        assert_eq!(
            set.add_candidate(Vec3::new(1.0, 0.0, 0.0), Vec3::Z, FLOOR),
            Candidate::TooClose
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn points_beyond_threshold_are_kept() {
        let mut set = SurfacePointSet::new(&config());
        set.add_candidate(Vec3::ZERO, Vec3::Z, FLOOR);
        assert_eq!(
            set.add_candidate(Vec3::new(10.5, 0.0, 0.0), Vec3::Z, FLOOR),
            Candidate::Accepted(1)
        );
    }

    #[test]
    fn allow_then_deny_lists() {
        let mut cfg = config();
        cfg.allow_list = Some([FLOOR, PILLAR].into_iter().collect());
        cfg.deny_list = Some([PILLAR].into_iter().collect());
        let mut set = SurfacePointSet::new(&cfg);

        assert_eq!(set.add_candidate(Vec3::ZERO, Vec3::Z, ObjectId(9)), Candidate::Filtered);
        assert_eq!(
            set.add_candidate(Vec3::new(50.0, 0.0, 0.0), Vec3::X, PILLAR),
            Candidate::Filtered
        );
        assert_eq!(
            set.add_candidate(Vec3::new(100.0, 0.0, 0.0), Vec3::Z, FLOOR),
            Candidate::Accepted(0)
        );
    }

    #[test]
    fn degenerate_normal_falls_back_up() {
        let mut set = SurfacePointSet::new(&config());
        set.add_candidate(Vec3::ZERO, Vec3::ZERO, FLOOR);
        assert_eq!(set.points()[0].normal, Vec3::Z);
    }

    /// Floor slab with its top face at z = 0.
    fn floor_world() -> VoxelWorld {
        let mut world =
            VoxelWorld::new(UVec3::new(40, 40, 10), Vec3::new(-200.0, -200.0, -100.0), 10.0);
        world.fill_box(
            Vec3::new(-200.0, -200.0, -100.0),
            Vec3::new(200.0, 200.0, 0.0),
            Some(FLOOR),
        );
        world
    }

    #[test]
    fn tracing_above_floor_finds_bounced_nodes() {
        let executor = WorldExecutor::spawn(floor_world()).unwrap();
        let world = executor.handle();
        let volume = BuilderVolume::new(Vec3::new(0.0, 0.0, 50.0), Vec3::splat(50.0));
        let tracers = vec![Vec3::new(0.0, 0.0, 40.0), Vec3::new(40.0, 0.0, 40.0)];
        let mut stats = BuildStats::default();

        let set = trace_surface_points(
            &world,
            &tracers,
            &config(),
            &volume,
            &NullSink,
            &CancelToken::new(),
            &mut stats,
        )
        .unwrap();

        assert_eq!(stats.rays_cast, 12);
        assert_eq!(stats.ray_hits, 2);
        assert_eq!(set.len(), 2);
        for p in set.points() {
            assert!((p.location.z - 5.0).abs() < 1e-3);
            assert_eq!(p.normal, Vec3::Z);
        }
    }

    #[test]
    fn debug_draws_hits_and_misses() {
        let executor = WorldExecutor::spawn(floor_world()).unwrap();
        let world = executor.handle();
        let volume = BuilderVolume::new(Vec3::new(0.0, 0.0, 50.0), Vec3::splat(50.0));
        let cfg = BuildConfig {
            debug_draw: true,
            ..config()
        };
        let sink = RecordingSink::new();
        let mut stats = BuildStats::default();
        trace_surface_points(
            &world,
            &[Vec3::new(0.0, 0.0, 40.0)],
            &cfg,
            &volume,
            &sink,
            &CancelToken::new(),
            &mut stats,
        )
        .unwrap();

        let draws = sink.drain();
        let spheres = draws.iter().filter(|d| matches!(d, DebugDraw::Sphere { .. })).count();
        let lines = draws.iter().filter(|d| matches!(d, DebugDraw::Line { .. })).count();
        assert_eq!((spheres, lines), (1, 5));
    }

    #[test]
    fn enclosed_tracers_are_removed() {
        let executor = WorldExecutor::spawn(floor_world()).unwrap();
        let world = executor.handle();
        let volume = BuilderVolume::new(Vec3::ZERO, Vec3::splat(100.0));
        let tracers = vec![
            Vec3::new(0.0, 0.0, -40.0), // buried in the slab
            Vec3::new(0.0, 0.0, 5.0),   // within 10 of the top face
            Vec3::new(0.0, 0.0, 40.0),  // clear
        ];
        let mut stats = BuildStats::default();
        let kept = remove_enclosed_tracers(
            &world,
            tracers,
            &config(),
            &volume,
            &CancelToken::new(),
            &mut stats,
        )
        .unwrap();
        assert_eq!(kept, vec![Vec3::new(0.0, 0.0, 40.0)]);
        assert_eq!(stats.enclosed_tracers_removed, 2);
    }

    #[test]
    fn volume_object_is_ignored() {
        let mut world = floor_world();
        // The volume's own collision box fills the air above the floor.
        world.fill_box(
            Vec3::new(-50.0, -50.0, 0.0),
            Vec3::new(50.0, 50.0, 100.0),
            Some(ObjectId(99)),
        );
        let executor = WorldExecutor::spawn(world).unwrap();
        let handle = executor.handle();
        let volume = BuilderVolume::new(Vec3::new(0.0, 0.0, 50.0), Vec3::splat(50.0))
            .with_object(ObjectId(99));
        let mut stats = BuildStats::default();
        let kept = remove_enclosed_tracers(
            &handle,
            vec![Vec3::new(0.0, 0.0, 40.0)],
            &config(),
            &volume,
            &CancelToken::new(),
            &mut stats,
        )
        .unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn cancelled_trace_stops() {
        let executor = WorldExecutor::spawn(floor_world()).unwrap();
        let world = executor.handle();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = trace_surface_points(
            &world,
            &[Vec3::ZERO],
            &config(),
            &BuilderVolume::new(Vec3::ZERO, Vec3::ONE),
            &NullSink,
            &cancel,
            &mut BuildStats::default(),
        );
        assert!(matches!(result, Err(crate::error::BuildError::Cancelled)));
    }
}

// Collision capability the navigation code needs from the host world.
//
// Neither the graph nor the builder intersects rays with level geometry
// themselves. They ask a `CollisionWorld`: "what does this segment hit
// first?" and "which objects overlap this region?". A game engine binding
// implements the trait over its physics scene; `world.rs` provides a voxel
// implementation used by the bake CLI and the tests.
//
// Implementations are not required to be `Sync`. The builder moves its world
// into a single executor thread and serializes every query through it (see
// `spider_nav_builder::executor`), matching engines whose collision queries
// must run on one designated thread.

use crate::types::ObjectId;
use glam::Vec3;
use std::collections::BTreeSet;

/// First blocking hit along a traced segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceHit {
    /// Point where the segment enters the blocking object.
    pub location: Vec3,
    /// Unit normal of the surface at `location`, facing back toward the ray.
    pub normal: Vec3,
    /// The object that was struck.
    pub object: ObjectId,
}

/// Region for overlap queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OverlapShape {
    Sphere { center: Vec3, radius: f32 },
    /// Axis-aligned box.
    Box { center: Vec3, half_extents: Vec3 },
}

impl OverlapShape {
    /// Axis-aligned bounds of the shape.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        match *self {
            OverlapShape::Sphere { center, radius } => {
                (center - Vec3::splat(radius), center + Vec3::splat(radius))
            }
            OverlapShape::Box {
                center,
                half_extents,
            } => (center - half_extents, center + half_extents),
        }
    }

    /// Whether the shape overlaps the axis-aligned box `[min, max]`.
    pub fn overlaps_aabb(&self, min: Vec3, max: Vec3) -> bool {
        match *self {
            OverlapShape::Sphere { center, radius } => {
                let closest = center.clamp(min, max);
                closest.distance_squared(center) <= radius * radius
            }
            OverlapShape::Box {
                center,
                half_extents,
            } => {
                let (lo, hi) = (center - half_extents, center + half_extents);
                lo.cmple(max).all() && hi.cmpge(min).all()
            }
        }
    }
}

/// Queries the navigation code needs from the host's collision scene.
pub trait CollisionWorld {
    /// First hit along `start -> end`, skipping objects in `ignore`.
    fn line_trace(&self, start: Vec3, end: Vec3, ignore: &[ObjectId]) -> Option<TraceHit>;

    /// Every object overlapping `shape`, skipping objects in `ignore`.
    fn overlap(&self, shape: OverlapShape, ignore: &[ObjectId]) -> BTreeSet<ObjectId>;

    /// True if nothing blocks the segment.
    fn line_of_sight(&self, start: Vec3, end: Vec3, ignore: &[ObjectId]) -> bool {
        self.line_trace(start, end, ignore).is_none()
    }
}

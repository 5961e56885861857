// Core types shared across the navigation crates.
//
// Defines the compact integer identifiers used throughout the graph
// (`NavNodeId`, `ObjectId`), the string key for externally registered grid
// sources (`GridSourceId`), and the world's "up" convention. Positions and
// normals are plain `glam::Vec3` values; this module only adds the small
// helpers the graph code needs on top of them.
//
// The world is Z-up. Any place that needs a normal but has none to hand
// (sampled tracers, records saved without a normal, degenerate normal sums)
// falls back to `UP`.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// World "up". Fallback surface normal.
pub const UP: Vec3 = Vec3::Z;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Compact identifier for a navigation graph node. Equal to the node's
/// position in its graph's backing `Vec`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NavNodeId(pub u32);

impl NavNodeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NavNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies a collision object in the host world (an actor, a mesh, a
/// voxel material). Used by allow/deny lists and ignore sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object {}", self.0)
    }
}

/// Name of an independently built grid contributed to a world at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridSourceId(pub String);

impl GridSourceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for GridSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Vector helpers
// ---------------------------------------------------------------------------

/// Normalize `v`, or return `UP` if it has no usable direction.
pub fn normalize_or_up(v: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(UP)
}

/// Combined normal for a point between two surface nodes.
pub fn blend_normals(a: Vec3, b: Vec3) -> Vec3 {
    normalize_or_up(a + b)
}

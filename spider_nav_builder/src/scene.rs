// Scene descriptions for the `bake` tool.
//
// A scene is a JSON file describing a `VoxelWorld` (grid dimensions, origin
// and voxel size), a list of solid boxes stamped into it, and the builder
// volume to sample. Boxes are applied in order, so a later box can carve
// out an earlier one by using `"object": null`.
//
// Example:
//
//   {
//     "world": { "size": [40, 40, 20], "origin": [-200, -200, -100], "voxel_size": 10 },
//     "boxes": [
//       { "min": [-200, -200, -100], "max": [200, 200, 0], "object": 1 },
//       { "min": [-50, -50, 0], "max": [50, 50, 100], "object": 2 }
//     ],
//     "volume": { "center": [0, 0, 60], "half_extents": [120, 120, 60] }
//   }

use crate::config::BuilderVolume;
use crate::error::Result;
use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};
use spider_nav::ObjectId;
use spider_nav::world::VoxelWorld;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldSpec {
    pub size: UVec3,
    pub origin: Vec3,
    pub voxel_size: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneBox {
    pub min: Vec3,
    pub max: Vec3,
    pub object: Option<ObjectId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub world: WorldSpec,
    #[serde(default)]
    pub boxes: Vec<SceneBox>,
    pub volume: BuilderVolume,
}

impl Scene {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Voxelize the scene's boxes.
    pub fn build_world(&self) -> VoxelWorld {
        let mut world = VoxelWorld::new(self.world.size, self.world.origin, self.world.voxel_size);
        for b in &self.boxes {
            let written = world.fill_box(b.min, b.max, b.object);
            tracing::debug!(min = ?b.min, max = ?b.max, cells = written, "scene box stamped");
        }
        world
    }
}

// Test scenes and helpers for end-to-end navigation tests.
//
// Each scene is a real `Scene` (voxel world + builder volume) baked by the
// real `GridBuilder`; the only test-specific code here is the scene
// geometry and a few assertions over finished graphs. Queries in the tests
// go through the same `Navigator` the runtime uses.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};
use glam::{UVec3, Vec3};
use spider_nav::debug::{DebugDraw, DebugSink};
use spider_nav::{CollisionWorld, NavGraph, SaveStore};
use spider_nav_builder::scene::{SceneBox, WorldSpec};
use spider_nav_builder::{BuildConfig, BuildOutput, BuilderVolume, GridBuilder, Scene};

/// Object ids used by the scenes.
pub const FLOOR: u32 = 1;
pub const CUBE: u32 = 2;
pub const PLATFORM: u32 = 3;

fn solid(min: Vec3, max: Vec3, object: u32) -> SceneBox {
    SceneBox {
        min,
        max,
        object: Some(spider_nav::ObjectId(object)),
    }
}

/// A 400x400 floor with a 100-unit cube standing on it at the origin.
/// Floor top is z = 0, cube top is z = 100.
pub fn cube_on_floor() -> Scene {
    Scene {
        world: WorldSpec {
            size: UVec3::new(40, 40, 30),
            origin: Vec3::new(-200.0, -200.0, -100.0),
            voxel_size: 10.0,
        },
        boxes: vec![
            solid(Vec3::new(-200.0, -200.0, -100.0), Vec3::new(200.0, 200.0, 0.0), FLOOR),
            solid(Vec3::new(-50.0, -50.0, 0.0), Vec3::new(50.0, 50.0, 100.0), CUBE),
        ],
        volume: BuilderVolume::new(Vec3::new(0.0, 0.0, 80.0), Vec3::new(120.0, 120.0, 80.0)),
    }
}

/// Two floating slabs with a 120-unit gap between them along X, too wide
/// for any link to cross.
pub fn two_platforms() -> Scene {
    Scene {
        world: WorldSpec {
            size: UVec3::new(48, 24, 16),
            origin: Vec3::new(-240.0, -120.0, -80.0),
            voxel_size: 10.0,
        },
        boxes: vec![
            solid(Vec3::new(-200.0, -100.0, -20.0), Vec3::new(-60.0, 100.0, 0.0), PLATFORM),
            solid(Vec3::new(60.0, -100.0, -20.0), Vec3::new(200.0, 100.0, 0.0), PLATFORM + 1),
        ],
        volume: BuilderVolume::new(Vec3::ZERO, Vec3::new(200.0, 100.0, 60.0)),
    }
}

/// Bake `scene` with default settings, optionally saving into `store`.
pub fn bake(scene: &Scene, store: Option<(Arc<dyn SaveStore>, &str, u32)>) -> BuildOutput {
    let mut builder = GridBuilder::new(BuildConfig::default(), scene.volume).expect("valid config");
    if let Some((store, slot, index)) = store {
        builder = builder.save_to(store, slot, index);
    }
    builder.run(scene.build_world()).expect("bake succeeds")
}

/// Assert every link in `graph` is clear of geometry in `world`, traced
/// from the lower node id to the higher one as the builder traces it.
pub fn assert_links_clear(graph: &NavGraph, world: &impl CollisionWorld) {
    for node in &graph.nodes {
        for &n in node.neighbors.iter().filter(|&&n| n > node.id) {
            let other = graph.node(n).location;
            assert!(
                world.line_of_sight(node.location, other, &[]),
                "link {:?} -> {:?} passes through geometry",
                node.location,
                other
            );
        }
    }
}

/// Assert consecutive path points are clear of geometry in `world`. Paths
/// walk links in either direction, so either trace may pass.
pub fn assert_path_clear(path: &[Vec3], world: &impl CollisionWorld) {
    for pair in path.windows(2) {
        assert!(
            world.line_of_sight(pair[0], pair[1], &[])
                || world.line_of_sight(pair[1], pair[0], &[]),
            "path step {:?} -> {:?} passes through geometry",
            pair[0],
            pair[1]
        );
    }
}

/// Summed length of a polyline.
pub fn path_length(path: &[Vec3]) -> f32 {
    path.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Debug sink that parks the drawing thread on its first draw until the
/// test releases it. Lets a test act on a build that is known to be in
/// progress.
pub struct GateSink {
    tripped: AtomicBool,
    reached: Sender<()>,
    release: Receiver<()>,
}

/// Test-side ends of a `GateSink`.
pub struct Gate {
    pub reached: Receiver<()>,
    pub release: Sender<()>,
}

impl GateSink {
    pub fn pair() -> (Arc<Self>, Gate) {
        let (reached_tx, reached_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        let sink = Arc::new(Self {
            tripped: AtomicBool::new(false),
            reached: reached_tx,
            release: release_rx,
        });
        let gate = Gate {
            reached: reached_rx,
            release: release_tx,
        };
        (sink, gate)
    }
}

impl DebugSink for GateSink {
    fn draw(&self, _command: DebugDraw) {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            let _ = self.reached.send(());
            let _ = self.release.recv();
        }
    }
}

// spider_nav_builder: offline baking of spider navigation grids.
//
// Turns collision geometry into the surface graph `spider_nav` queries. The
// bake is a staged pipeline (see `pipeline.rs`) over a `CollisionWorld`
// that is served from a single dedicated thread, with the heavy per-node
// stages fanned out over rayon.
//
// Module overview:
// - `pipeline.rs`:     GridBuilder (stage driver), BuildHandle, BuildOutput.
// - `sampling.rs`:     Regular tracer lattice over the (rotated) builder volume.
// - `surface.rs`:      Enclosed-tracer removal, six-axis surface raycasts, filters + dedup.
// - `spatial_hash.rs`: Uniform grid hash for dedup and neighbor candidates.
// - `adjacency.rs`:    Parallel line-of-sight linking; collects possible edges.
// - `edges.rs`:        Corner nodes for close pairs without line of sight.
// - `prune.rs`:        Drops dead-end nodes and assembles the NavGraph.
// - `executor.rs`:     WorldExecutor thread and cloneable WorldHandle.
// - `cancel.rs`:       CancelToken.
// - `stats.rs`:        BuildStats counters.
// - `config.rs`:       BuildConfig and BuilderVolume.
// - `scene.rs`:        JSON scene descriptions for the `bake` binary.
// - `error.rs`:        BuildError.

pub mod adjacency;
pub mod cancel;
pub mod config;
pub mod edges;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod prune;
pub mod sampling;
pub mod scene;
pub mod spatial_hash;
pub mod stats;
pub mod surface;

pub use cancel::CancelToken;
pub use config::{BuildConfig, BuilderVolume};
pub use error::{BuildError, Result};
pub use pipeline::{BuildHandle, BuildOutput, GridBuilder};
pub use scene::Scene;
pub use stats::BuildStats;

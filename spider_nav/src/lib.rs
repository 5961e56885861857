// spider_nav: surface navigation for wall- and ceiling-crawling creatures.
//
// Spiders do not walk a flat navmesh. They cling to arbitrary 3D surfaces,
// so their world is a precomputed graph of surface-adhering nodes, each with
// a position and the surface normal the creature orients against. This
// crate is the query side of that system: the graph, A* over it, its saved
// form, and the runtime navigator agents talk to. The offline tool that
// bakes graphs from level geometry lives in `spider_nav_builder`.
//
// Module overview:
// - `types.rs`:       NavNodeId, ObjectId, GridSourceId, the `UP` axis, normal helpers.
// - `graph.rs`:       NavGraph arena of nodes with index-addressed neighbor lists.
// - `pathfinding.rs`: Closest-node lookup, A* with partial-path fallback, next-step queries.
// - `persistence.rs`: Flat SavedGrid record, save/load conversion, slot-keyed stores.
// - `navigator.rs`:   Navigator (agent-facing queries + grid sources), NavigationSubsystem,
//                     NavigationProvider capability and its registry.
// - `collision.rs`:   CollisionWorld capability (line traces, overlaps) the builder consumes.
// - `world.rs`:       VoxelWorld, a dense voxel CollisionWorld for tools and tests.
// - `debug.rs`:       DebugSink capability for draw commands, plus null/recording sinks.
// - `config.rs`:      NavigatorConfig.
// - `error.rs`:       NavError.
//
// The world is Z-up. Queries never fail loudly: with no graph loaded they
// return `None` or an empty path. Only storage access returns errors.

pub mod collision;
pub mod config;
pub mod debug;
pub mod error;
pub mod graph;
pub mod navigator;
pub mod pathfinding;
pub mod persistence;
pub mod types;
pub mod world;

pub use collision::{CollisionWorld, OverlapShape, TraceHit};
pub use config::NavigatorConfig;
pub use error::{NavError, Result};
pub use graph::{NavGraph, NavNode};
pub use navigator::{NavigationProvider, NavigationSubsystem, Navigator, ProviderRegistry};
pub use pathfinding::FoundPath;
pub use persistence::{DirStore, MemoryStore, SaveStore, SavedGrid};
pub use types::{GridSourceId, NavNodeId, ObjectId, UP};

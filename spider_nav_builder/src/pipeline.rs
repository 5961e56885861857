// The staged bake: from a collision world to a saved navigation graph.
//
// Stages run strictly in order, each consuming the whole output of the one
// before:
//
//   sample -> remove enclosed tracers -> trace surfaces -> adjacency
//          -> edge intersections -> prune -> save
//
// The collision world is moved onto a `WorldExecutor` thread for the
// duration of the run; every stage reaches it through a `WorldHandle`. The
// cancel token is checked between stages and inside the long loops of each
// stage, and a cancelled run returns `BuildError::Cancelled` without saving.
// Tokens belong to a single run, never to the builder, so cancelling one
// run leaves the builder free to run again.
//
// `GridBuilder::run` blocks the calling thread. `GridBuilder::spawn` runs
// the same pipeline on a background thread and returns a `BuildHandle` for
// cancelling or joining it, so an editor thread is never blocked.
//
// See also: `spider_nav::persistence` for the saved record and stores.

use crate::adjacency::build_adjacency;
use crate::cancel::CancelToken;
use crate::config::{BuildConfig, BuilderVolume};
use crate::edges::resolve_edges;
use crate::error::{BuildError, Result};
use crate::executor::{WorldExecutor, WorldHandle};
use crate::prune::prune_orphans;
use crate::sampling::{lattice_size, sample_volume};
use crate::stats::BuildStats;
use crate::surface::{remove_enclosed_tracers, trace_surface_points};
use spider_nav::debug::{Color, DebugSink, NullSink};
use spider_nav::persistence;
use spider_nav::{CollisionWorld, NavGraph, SaveStore, SavedGrid};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;

/// Largest tracer lattice a builder accepts.
pub const MAX_LATTICE_POINTS: usize = 1 << 26;

/// Everything a finished bake produces.
#[derive(Clone, Debug)]
pub struct BuildOutput {
    pub graph: NavGraph,
    /// The graph in saved form, as written to the store (if any).
    pub record: SavedGrid,
    pub stats: BuildStats,
}

/// Where a finished bake is written.
#[derive(Clone)]
struct SaveTarget {
    store: Arc<dyn SaveStore>,
    slot: String,
    index: u32,
}

/// Configured bake over one builder volume.
#[derive(Clone)]
pub struct GridBuilder {
    config: BuildConfig,
    volume: BuilderVolume,
    sink: Arc<dyn DebugSink>,
    save: Option<SaveTarget>,
}

impl GridBuilder {
    /// Validate `config` against `volume`. Besides the config's own checks,
    /// the tracer lattice the step spans over the volume must stay within
    /// `MAX_LATTICE_POINTS`.
    pub fn new(config: BuildConfig, volume: BuilderVolume) -> Result<Self> {
        config.validate()?;
        match lattice_size(&volume, config.grid_step_size) {
            Some(n) if n <= MAX_LATTICE_POINTS => {}
            size => {
                return Err(BuildError::InvalidConfig(format!(
                    "grid_step_size {} spans {} tracers over the volume, limit is {}",
                    config.grid_step_size,
                    size.map_or_else(|| "too many".to_string(), |n| n.to_string()),
                    MAX_LATTICE_POINTS
                )));
            }
        }
        Ok(Self {
            config,
            volume,
            sink: Arc::new(NullSink),
            save: None,
        })
    }

    /// Send debug draws here. Only used when `debug_draw` is on.
    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Save the finished grid under `slot`/`index` in `store`.
    pub fn save_to(
        mut self,
        store: Arc<dyn SaveStore>,
        slot: impl Into<String>,
        index: u32,
    ) -> Self {
        self.save = Some(SaveTarget {
            store,
            slot: slot.into(),
            index,
        });
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn volume(&self) -> &BuilderVolume {
        &self.volume
    }

    /// Run the whole bake on the calling thread.
    pub fn run<W: CollisionWorld + Send + 'static>(&self, world: W) -> Result<BuildOutput> {
        self.run_with_cancel(world, &CancelToken::new())
    }

    /// Run the whole bake on the calling thread, stopping early once
    /// `cancel` fires.
    pub fn run_with_cancel<W: CollisionWorld + Send + 'static>(
        &self,
        world: W,
        cancel: &CancelToken,
    ) -> Result<BuildOutput> {
        let executor = WorldExecutor::spawn(world)?;
        let result = self.run_stages(&executor.handle(), cancel);
        let shutdown = executor.shutdown();
        if let Err(BuildError::Cancelled) = &result {
            info!("grid build cancelled");
        }
        let output = result?;
        shutdown?;
        Ok(output)
    }

    /// Run the bake on a background thread with its own cancel token.
    pub fn spawn<W: CollisionWorld + Send + 'static>(self, world: W) -> Result<BuildHandle> {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("spider-nav-build".into())
            .spawn(move || self.run_with_cancel(world, &token))?;
        Ok(BuildHandle { thread, cancel })
    }

    fn run_stages(&self, world: &WorldHandle, cancel: &CancelToken) -> Result<BuildOutput> {
        let config = &self.config;
        let volume = &self.volume;
        let sink = self.sink.as_ref();
        let mut stats = BuildStats::default();

        // Sampling
        info!(step = config.grid_step_size, "sampling builder volume");
        let mut tracers = sample_volume(volume, config.grid_step_size);
        stats.tracers = tracers.len();
        if config.debug_draw {
            for &tracer in &tracers {
                sink.point(tracer, 2.0, Color::YELLOW, 0.25);
            }
        }
        cancel.check()?;

        if config.remove_enclosed_tracers {
            tracers = remove_enclosed_tracers(world, tracers, config, volume, cancel, &mut stats)?;
        }
        info!(
            tracers = tracers.len(),
            enclosed = stats.enclosed_tracers_removed,
            "tracers ready"
        );
        cancel.check()?;

        // Surface raycasting
        let surface =
            trace_surface_points(world, &tracers, config, volume, sink, cancel, &mut stats)?;
        let mut points = surface.into_points();
        stats.surface_nodes = points.len();
        info!(
            rays = stats.rays_cast,
            hits = stats.ray_hits,
            nodes = points.len(),
            filtered = stats.rejected_by_filter,
            too_close = stats.rejected_by_proximity,
            "surface points traced"
        );
        cancel.check()?;

        // Adjacency
        let mut adjacency = build_adjacency(world, &points, config, volume, sink, cancel)?;
        stats.edges = adjacency.edge_count();
        stats.possible_edges = adjacency.possible_edges.len();
        info!(
            edges = stats.edges,
            possible_edges = stats.possible_edges,
            "adjacency built"
        );
        cancel.check()?;

        // Edge intersections
        resolve_edges(
            world,
            &mut points,
            &mut adjacency,
            config,
            volume,
            sink,
            cancel,
            &mut stats,
        )?;
        info!(
            resolved = stats.resolved_edges,
            corner_nodes = stats.edge_nodes,
            "edge intersections resolved"
        );
        cancel.check()?;

        // Pruning
        let (graph, pruned) = prune_orphans(&points, &adjacency);
        stats.pruned_nodes = pruned;
        stats.final_nodes = graph.node_count();
        info!(
            pruned,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph pruned"
        );
        cancel.check()?;

        // Persistence
        let record = persistence::save(&graph);
        if let Some(target) = &self.save {
            target.store.save(&target.slot, target.index, &record)?;
            info!(
                slot = %target.slot,
                index = target.index,
                nodes = record.node_count(),
                "grid saved"
            );
        }
        Ok(BuildOutput {
            graph,
            record,
            stats,
        })
    }
}

/// A bake running on a background thread.
pub struct BuildHandle {
    thread: JoinHandle<Result<BuildOutput>>,
    cancel: CancelToken,
}

impl BuildHandle {
    /// Ask the build to stop at its next check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the build. A panic on the build thread is re-raised here.
    pub fn join(self) -> Result<BuildOutput> {
        match self.thread.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

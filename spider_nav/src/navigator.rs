// Runtime navigation surface exposed to agents.
//
// `Navigator` owns the loaded grid (read-only, shared through `Arc`) plus
// any additional grid sources registered at runtime by independently built
// grids that coexist in the same world. Agents call it to snap points onto
// the graph and to plan paths. Every query degrades to `None` or an empty
// `FoundPath` when no graph is loaded; nothing here panics or errors.
//
// With several grids present, point queries consider all of them and path
// queries run inside the grid whose closest node is nearest the start
// point. Paths never hop between grids.
//
// Every graph that enters a navigator (loaded, handed over directly, or
// registered as a source) passes through `NavGraph::normalize` first if it
// is not already well formed, so searches never see one-way or dangling
// links.
//
// `NavigationSubsystem` loads grids by slot name and index from a
// `SaveStore`. `ProviderRegistry` maps logical names to
// `NavigationProvider` implementations so callers resolve their provider
// once at startup instead of searching for it on every tick.
//
// See also: `pathfinding.rs` for the searches, `persistence.rs` for the
// saved record and stores, `config.rs` for `NavigatorConfig`.

use crate::config::NavigatorConfig;
use crate::debug::{Color, DebugSink};
use crate::error::{NavError, Result};
use crate::graph::{NavGraph, NavNode};
use crate::pathfinding::{self, FoundPath};
use crate::persistence::{self, SaveStore};
use crate::types::GridSourceId;
use glam::Vec3;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Provider capability
// ---------------------------------------------------------------------------

/// What an agent needs from whatever hosts the navigation graph.
pub trait NavigationProvider: Send + Sync {
    fn find_closest_node_location(&self, point: Vec3) -> Option<Vec3>;
    fn find_closest_node_normal(&self, point: Vec3) -> Option<Vec3>;
    fn find_path_between_points(&self, start: Vec3, end: Vec3) -> FoundPath;
    fn find_next_location_and_normal(&self, current: Vec3, target: Vec3) -> Option<(Vec3, Vec3)>;
}

/// Named navigation providers, resolved by callers at startup.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn NavigationProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`, returning whatever it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn NavigationProvider>,
    ) -> Option<Arc<dyn NavigationProvider>> {
        self.providers.insert(name.into(), provider)
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn NavigationProvider>> {
        self.providers.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn NavigationProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Subsystem
// ---------------------------------------------------------------------------

/// Loads saved grids out of a store.
#[derive(Clone)]
pub struct NavigationSubsystem {
    store: Arc<dyn SaveStore>,
}

impl NavigationSubsystem {
    pub fn new(store: Arc<dyn SaveStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SaveStore> {
        &self.store
    }

    /// Read `slot`/`index` and rebuild the graph. The graph is normalized
    /// so a record written by an older or hand-edited build is still safe
    /// to search.
    pub fn load_grid(&self, slot: &str, index: u32) -> Result<NavGraph> {
        tracing::info!(slot, index, "loading navigation grid");
        let record = self.store.load(slot, index)?;
        let mut graph = persistence::load(&record);
        if !graph.is_well_formed() {
            let dropped = graph.normalize();
            tracing::warn!(slot, index, dropped, "saved grid has broken links, repaired");
        }
        Ok(graph)
    }

    /// Every saved grid in the store.
    pub fn list_grids(&self) -> Result<Vec<(String, u32)>> {
        self.store.list()
    }
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// `graph`, normalized if it needs it.
fn prepared(graph: Arc<NavGraph>, origin: &str) -> Arc<NavGraph> {
    if graph.is_well_formed() {
        return graph;
    }
    let mut graph = Arc::unwrap_or_clone(graph);
    let dropped = graph.normalize();
    tracing::warn!(origin, dropped, "navigation graph has broken links, repaired");
    Arc::new(graph)
}

pub struct Navigator {
    config: NavigatorConfig,
    graph: RwLock<Option<Arc<NavGraph>>>,
    sources: RwLock<BTreeMap<GridSourceId, Arc<NavGraph>>>,
}

impl Navigator {
    /// A navigator with no graph loaded.
    pub fn new(config: NavigatorConfig) -> Self {
        Self {
            config,
            graph: RwLock::new(None),
            sources: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_graph(config: NavigatorConfig, graph: NavGraph) -> Self {
        let navigator = Self::new(config);
        navigator.set_graph(Some(Arc::new(graph)));
        navigator
    }

    /// Build a navigator and, if `auto_load` is set, load the configured
    /// slot. A slot that does not exist yet leaves the navigator empty;
    /// other store failures are returned.
    pub fn from_store(config: NavigatorConfig, subsystem: &NavigationSubsystem) -> Result<Self> {
        let navigator = Self::new(config);
        if navigator.config.auto_load {
            navigator.reload(subsystem)?;
        }
        Ok(navigator)
    }

    /// (Re)load the configured slot. Returns whether a graph is now loaded.
    pub fn reload(&self, subsystem: &NavigationSubsystem) -> Result<bool> {
        let (slot, index) = (self.config.save_slot.as_str(), self.config.save_index);
        match subsystem.load_grid(slot, index) {
            Ok(graph) => {
                self.set_graph(Some(Arc::new(graph)));
                Ok(true)
            }
            Err(NavError::SlotNotFound { .. }) => {
                tracing::warn!(slot, index, "no saved navigation grid, navigator is empty");
                self.set_graph(None);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Replace the primary graph. A graph that is not well formed is
    /// normalized first.
    pub fn set_graph(&self, graph: Option<Arc<NavGraph>>) {
        let graph = graph.map(|g| prepared(g, "primary"));
        *self.graph.write() = graph;
    }

    pub fn graph(&self) -> Option<Arc<NavGraph>> {
        self.graph.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.graph.read().is_some()
    }

    // -- grid sources --

    /// Add (or replace) an externally built grid. Returns true if `id` was
    /// already registered. A graph that is not well formed is normalized
    /// first.
    pub fn register_grid_source(&self, id: GridSourceId, graph: Arc<NavGraph>) -> bool {
        let graph = prepared(graph, &id.0);
        tracing::debug!(source = %id, nodes = graph.node_count(), "grid source registered");
        self.sources.write().insert(id, graph).is_some()
    }

    /// Returns true if `id` was registered.
    pub fn unregister_grid_source(&self, id: &GridSourceId) -> bool {
        self.sources.write().remove(id).is_some()
    }

    /// Registered source ids in sorted order.
    pub fn list_grid_sources(&self) -> Vec<GridSourceId> {
        self.sources.read().keys().cloned().collect()
    }

    /// Primary graph first, then sources by id.
    fn all_graphs(&self) -> Vec<Arc<NavGraph>> {
        let mut graphs: Vec<_> = self.graph.read().iter().cloned().collect();
        graphs.extend(self.sources.read().values().cloned());
        graphs
    }

    /// The graph holding the node nearest `point`, and that node. Earlier
    /// graphs win ties.
    fn closest_across_graphs(&self, point: Vec3) -> Option<(Arc<NavGraph>, NavNode)> {
        let mut best: Option<(Arc<NavGraph>, NavNode, f32)> = None;
        for graph in self.all_graphs() {
            let Some(id) = pathfinding::find_closest_node(&graph, point) else {
                continue;
            };
            let node = graph.node(id).clone();
            let dist = node.location.distance_squared(point);
            if best.as_ref().is_none_or(|(_, _, d)| dist < *d) {
                best = Some((graph, node, dist));
            }
        }
        best.map(|(graph, node, _)| (graph, node))
    }

    // -- debug --

    /// Draw every node's normal and every link once.
    pub fn draw_debug_relations(&self, sink: &dyn DebugSink) {
        let lifetime = self.config.debug_draw_lifetime;
        let normal_length = self.config.debug_normal_length;
        for graph in self.all_graphs() {
            for node in &graph.nodes {
                sink.line(
                    node.location,
                    node.location + node.normal * normal_length,
                    Color::BLUE,
                    lifetime,
                );
                for &neighbor in &node.neighbors {
                    if neighbor > node.id {
                        sink.line(
                            node.location,
                            graph.node(neighbor).location,
                            Color::GREEN,
                            lifetime,
                        );
                    }
                }
            }
        }
    }
}

impl NavigationProvider for Navigator {
    fn find_closest_node_location(&self, point: Vec3) -> Option<Vec3> {
        self.closest_across_graphs(point).map(|(_, node)| node.location)
    }

    fn find_closest_node_normal(&self, point: Vec3) -> Option<Vec3> {
        self.closest_across_graphs(point).map(|(_, node)| node.normal)
    }

    fn find_path_between_points(&self, start: Vec3, end: Vec3) -> FoundPath {
        match self.closest_across_graphs(start) {
            Some((graph, _)) => pathfinding::find_path(&graph, start, end),
            None => {
                tracing::debug!("path requested with no navigation graph loaded");
                FoundPath::default()
            }
        }
    }

    fn find_next_location_and_normal(&self, current: Vec3, target: Vec3) -> Option<(Vec3, Vec3)> {
        let (graph, _) = self.closest_across_graphs(current)?;
        pathfinding::find_next_location_and_normal(&graph, current, target)
    }
}

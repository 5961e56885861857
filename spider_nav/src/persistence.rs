// Conversion between the in-memory graph and its flat saved form, plus the
// slot-keyed stores that hold saved grids.
//
// `SavedGrid` is three parallel maps keyed by node index: location, normal,
// and neighbor index list. It carries no addresses, only indices, so it
// round-trips through any serde format; the stores here use JSON.
//
// Loading is lenient: keys need not be contiguous
// (a hand-edited file may skip indices), a missing normal falls back to
// `UP`, and a neighbor index with no matching location is dropped with a
// log line rather than failing the whole load.
//
// See also: `graph.rs` for `NavGraph` and its saved-index map,
// `navigator.rs` (`NavigationSubsystem`) which loads grids from a store.

use crate::error::{NavError, Result};
use crate::graph::NavGraph;
use crate::types::UP;
use glam::Vec3;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Flat, index-based record of a navigation grid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedGrid {
    #[serde(default)]
    pub locations: BTreeMap<u32, Vec3>,
    #[serde(default)]
    pub normals: BTreeMap<u32, Vec3>,
    #[serde(default)]
    pub relations: BTreeMap<u32, Vec<u32>>,
}

impl SavedGrid {
    pub fn node_count(&self) -> usize {
        self.locations.len()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Flatten a graph into a record. Node IDs become record indices.
pub fn save(graph: &NavGraph) -> SavedGrid {
    let mut record = SavedGrid::default();
    for node in &graph.nodes {
        record.locations.insert(node.id.0, node.location);
        record.normals.insert(node.id.0, node.normal);
        record
            .relations
            .insert(node.id.0, node.neighbors.iter().map(|n| n.0).collect());
    }
    record
}

/// Rebuild a graph from a record. Nodes are added in ascending index order;
/// `NavGraph::saved_indices` maps record indices to arena positions.
pub fn load(record: &SavedGrid) -> NavGraph {
    let mut graph = NavGraph::new();
    for (&saved, &location) in &record.locations {
        let normal = record.normals.get(&saved).copied().unwrap_or(UP);
        graph.add_saved_node(saved, location, normal);
    }

    let mut dropped = 0usize;
    for (&saved, neighbors) in &record.relations {
        let Some(id) = graph.resolve_saved(saved) else {
            dropped += neighbors.len();
            continue;
        };
        for &neighbor_saved in neighbors {
            match graph.resolve_saved(neighbor_saved) {
                Some(neighbor) => graph.add_directed_neighbor(id, neighbor),
                None => dropped += 1,
            }
        }
    }

    if dropped > 0 {
        tracing::warn!(dropped, "skipped unresolvable neighbor references while loading grid");
    }
    tracing::info!(nodes = graph.node_count(), "navigation grid loaded");
    graph
}

// ---------------------------------------------------------------------------
// Save stores
// ---------------------------------------------------------------------------

/// Slot-keyed storage for saved grids: a string slot name plus a numeric
/// index identify one record.
pub trait SaveStore: Send + Sync {
    fn save(&self, slot: &str, index: u32, grid: &SavedGrid) -> Result<()>;
    fn load(&self, slot: &str, index: u32) -> Result<SavedGrid>;
    /// Every `(slot, index)` currently stored, sorted.
    fn list(&self) -> Result<Vec<(String, u32)>>;
}

fn check_slot_name(slot: &str) -> Result<()> {
    let ok = !slot.is_empty()
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(NavError::InvalidSlotName(slot.to_string()))
    }
}

/// In-process store. Records are kept as serialized blobs so a load always
/// goes through the same decode path as a file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<BTreeMap<(String, u32), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaveStore for MemoryStore {
    fn save(&self, slot: &str, index: u32, grid: &SavedGrid) -> Result<()> {
        check_slot_name(slot)?;
        let blob = grid.to_json()?;
        self.slots.lock().insert((slot.to_string(), index), blob);
        Ok(())
    }

    fn load(&self, slot: &str, index: u32) -> Result<SavedGrid> {
        let slots = self.slots.lock();
        let blob = slots
            .get(&(slot.to_string(), index))
            .ok_or_else(|| NavError::SlotNotFound {
                slot: slot.to_string(),
                index,
            })?;
        SavedGrid::from_json(blob)
    }

    fn list(&self) -> Result<Vec<(String, u32)>> {
        Ok(self.slots.lock().keys().cloned().collect())
    }
}

/// Directory-backed store: one `<slot>_<index>.json` file per record.
#[derive(Clone, Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, slot: &str, index: u32) -> PathBuf {
        self.root.join(format!("{slot}_{index}.json"))
    }
}

impl SaveStore for DirStore {
    fn save(&self, slot: &str, index: u32, grid: &SavedGrid) -> Result<()> {
        check_slot_name(slot)?;
        let path = self.path_for(slot, index);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, grid.to_json()?)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), nodes = grid.node_count(), "grid saved");
        Ok(())
    }

    fn load(&self, slot: &str, index: u32) -> Result<SavedGrid> {
        check_slot_name(slot)?;
        let path = self.path_for(slot, index);
        match fs::read(&path) {
            Ok(bytes) => SavedGrid::from_json(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(NavError::SlotNotFound {
                slot: slot.to_string(),
                index,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<(String, u32)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            let Some((slot, index)) = stem.rsplit_once('_') else {
                continue;
            };
            if let Ok(index) = index.parse::<u32>() {
                out.push((slot.to_string(), index));
            }
        }
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NavNodeId;
    use std::collections::BTreeSet;

    fn sample_graph() -> NavGraph {
        let mut graph = NavGraph::new();
        let a = graph.add_node(Vec3::new(0.0, 0.0, 0.0), Vec3::Z);
        let b = graph.add_node(Vec3::new(10.0, 0.0, 0.0), Vec3::X);
        let c = graph.add_node(Vec3::new(10.0, 10.0, 0.0), Vec3::Y);
        graph.add_edge(a, b);
        graph.add_edge(b, c);
        graph.add_edge(c, a);
        graph
    }

    fn neighbor_set(graph: &NavGraph, id: NavNodeId) -> BTreeSet<NavNodeId> {
        graph.neighbors(id).iter().copied().collect()
    }

    #[test]
    fn save_then_load_is_isomorphic() {
        let graph = sample_graph();
        let restored = load(&save(&graph));
        assert_eq!(restored.node_count(), graph.node_count());
        for node in &graph.nodes {
            let other = restored.node(node.id);
            assert_eq!(other.location, node.location);
            assert_eq!(other.normal, node.normal);
            assert_eq!(neighbor_set(&restored, node.id), neighbor_set(&graph, node.id));
        }
    }

    #[test]
    fn record_survives_json_and_bincode() {
        let record = save(&sample_graph());
        let json = record.to_json().unwrap();
        assert_eq!(SavedGrid::from_json(&json).unwrap(), record);

        let bytes = bincode::serialize(&record).unwrap();
        let decoded: SavedGrid = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn load_non_contiguous_indices() {
        let mut record = SavedGrid::default();
        record.locations.insert(10, Vec3::new(1.0, 0.0, 0.0));
        record.locations.insert(42, Vec3::new(2.0, 0.0, 0.0));
        record.normals.insert(10, Vec3::X);
        record.normals.insert(42, Vec3::Y);
        record.relations.insert(10, vec![42]);
        record.relations.insert(42, vec![10]);

        let graph = load(&record);
        assert_eq!(graph.node_count(), 2);
        let a = graph.resolve_saved(10).unwrap();
        let b = graph.resolve_saved(42).unwrap();
        assert_eq!(a, NavNodeId(0));
        assert_eq!(b, NavNodeId(1));
        assert_eq!(graph.neighbors(a), &[b]);
        assert_eq!(graph.neighbors(b), &[a]);
    }

    #[test]
    fn dangling_neighbors_are_dropped() {
        let mut record = SavedGrid::default();
        record.locations.insert(0, Vec3::ZERO);
        record.locations.insert(1, Vec3::X);
        record.relations.insert(0, vec![1, 99]);
        record.relations.insert(1, vec![0]);
        // Relation list for a node that has no location at all.
        record.relations.insert(7, vec![0]);

        let graph = load(&record);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.neighbors(NavNodeId(0)), &[NavNodeId(1)]);
        assert_eq!(graph.neighbors(NavNodeId(1)), &[NavNodeId(0)]);
    }

    #[test]
    fn missing_normal_defaults_up() {
        let mut record = SavedGrid::default();
        record.locations.insert(0, Vec3::ZERO);
        let graph = load(&record);
        assert_eq!(graph.node(NavNodeId(0)).normal, UP);
    }

    #[test]
    fn empty_json_object_is_empty_grid() {
        let record = SavedGrid::from_json(b"{}").unwrap();
        assert_eq!(record.node_count(), 0);
        assert!(load(&record).is_empty());
    }

    #[test]
    fn memory_store_roundtrip_and_missing_slot() {
        let store = MemoryStore::new();
        let record = save(&sample_graph());
        store.save("SpiderNavGridSave", 0, &record).unwrap();
        assert_eq!(store.load("SpiderNavGridSave", 0).unwrap(), record);
        assert!(matches!(
            store.load("SpiderNavGridSave", 1),
            Err(NavError::SlotNotFound { index: 1, .. })
        ));
        assert_eq!(store.list().unwrap(), vec![("SpiderNavGridSave".to_string(), 0)]);
    }

    #[test]
    fn dir_store_roundtrip_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        let record = save(&sample_graph());
        store.save("cave_level", 2, &record).unwrap();
        store.save("Tower", 0, &record).unwrap();

        assert_eq!(store.load("cave_level", 2).unwrap(), record);
        assert!(matches!(
            store.load("cave_level", 3),
            Err(NavError::SlotNotFound { .. })
        ));
        assert_eq!(
            store.list().unwrap(),
            vec![("Tower".to_string(), 0), ("cave_level".to_string(), 2)]
        );
    }

    #[test]
    fn slot_names_cannot_escape_the_store() {
        let store = MemoryStore::new();
        let record = SavedGrid::default();
        assert!(matches!(
            store.save("../etc", 0, &record),
            Err(NavError::InvalidSlotName(_))
        ));
        assert!(matches!(
            store.save("", 0, &record),
            Err(NavError::InvalidSlotName(_))
        ));
    }
}

// Uniform spatial hash over node positions.
//
// Points are bucketed by `floor(position / cell_size)`. A neighborhood query
// returns everything in the point's own cell and the 26 cells around it, so
// any point within `cell_size` of the query is guaranteed to be returned.
// Callers filter by exact distance themselves.
//
// Used twice by the builder: with the dedup threshold as cell size while
// accepting surface points, and with the connection radius times
// `relation_cell_multiplier` while building adjacency.

use glam::{IVec3, Vec3};
use rustc_hash::FxHashMap;

#[derive(Clone, Debug)]
pub struct SpatialHash {
    cell_size: f32,
    inv_cell_size: f32,
    cells: FxHashMap<IVec3, Vec<(Vec3, u32)>>,
    len: usize,
}

/// Offsets of a cell and its 26 neighbors.
fn neighborhood() -> impl Iterator<Item = IVec3> {
    (-1..=1).flat_map(|x| (-1..=1).flat_map(move |y| (-1..=1).map(move |z| IVec3::new(x, y, z))))
}

impl SpatialHash {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = cell_size.max(f32::EPSILON);
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: FxHashMap::default(),
            len: 0,
        }
    }

    /// Hash `points`, tagging each with its position in the slice.
    pub fn from_points(points: &[Vec3], cell_size: f32) -> Self {
        let mut hash = Self::new(cell_size);
        for (i, &p) in points.iter().enumerate() {
            hash.insert(p, i as u32);
        }
        hash
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn cell_key(&self, position: Vec3) -> IVec3 {
        (position * self.inv_cell_size).floor().as_ivec3()
    }

    pub fn insert(&mut self, position: Vec3, id: u32) {
        let key = self.cell_key(position);
        self.cells.entry(key).or_default().push((position, id));
        self.len += 1;
    }

    /// Everything in the 3x3x3 block of cells around `position`.
    pub fn neighbors(&self, position: Vec3) -> impl Iterator<Item = (Vec3, u32)> + '_ {
        let center = self.cell_key(position);
        neighborhood()
            .filter_map(move |offset| self.cells.get(&(center + offset)))
            .flatten()
            .copied()
    }

    /// Whether any entry lies within `radius` of `position`. `radius` must
    /// not exceed the cell size.
    pub fn any_within(&self, position: Vec3, radius: f32) -> bool {
        let radius_sq = radius * radius;
        self.neighbors(position)
            .any(|(p, _)| p.distance_squared(position) <= radius_sq)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of occupied cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

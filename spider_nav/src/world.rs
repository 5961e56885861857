// Dense voxel collision world.
//
// Reference `CollisionWorld` backend for hosts without their own physics
// scene: the `bake` CLI builds one from a scene description, and the tests
// use it to get real geometry under the builder. Each cell is either empty
// or owned by an `ObjectId`, so traces can report which object they struck
// and skip an ignore list.
//
// Storage is a flat `Vec<Option<ObjectId>>` indexed by
// `x + y * size_x + z * size_x * size_y`. Cell `(0,0,0)` covers the world
// box `[origin, origin + voxel_size)`. Out-of-bounds reads are empty and
// out-of-bounds writes are no-ops.
//
// `line_trace` is a 3D DDA (Amanatides & Woo) walk over the cells the
// segment crosses. The reported normal is the face through which the ray
// entered the struck cell. A segment that starts inside a solid cell hits
// immediately, with the normal pointing back along the ray.
//
// See also: `collision.rs` for the trait this implements.

use crate::collision::{CollisionWorld, OverlapShape, TraceHit};
use crate::types::{ObjectId, UP};
use glam::{IVec3, UVec3, Vec3};
use std::collections::BTreeSet;

/// Dense voxel grid of object-owned cells.
#[derive(Clone, Debug)]
pub struct VoxelWorld {
    cells: Vec<Option<ObjectId>>,
    size: UVec3,
    origin: Vec3,
    voxel_size: f32,
}

impl VoxelWorld {
    /// Create an empty world of `size` cells, each `voxel_size` units on a
    /// side, whose minimum corner sits at `origin`.
    pub fn new(size: UVec3, origin: Vec3, voxel_size: f32) -> Self {
        let total = size.x as usize * size.y as usize * size.z as usize;
        Self {
            cells: vec![None; total],
            size,
            origin,
            voxel_size: voxel_size.max(f32::EPSILON),
        }
    }

    pub fn size(&self) -> UVec3 {
        self.size
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    pub fn in_bounds(&self, cell: IVec3) -> bool {
        cell.cmpge(IVec3::ZERO).all() && cell.as_uvec3().cmplt(self.size).all()
    }

    fn index(&self, cell: IVec3) -> Option<usize> {
        if self.in_bounds(cell) {
            let (sx, sy) = (self.size.x as usize, self.size.y as usize);
            Some(cell.x as usize + cell.y as usize * sx + cell.z as usize * sx * sy)
        } else {
            None
        }
    }

    /// Owner of a cell. Out-of-bounds cells are empty.
    pub fn get(&self, cell: IVec3) -> Option<ObjectId> {
        self.index(cell).and_then(|i| self.cells[i])
    }

    /// Set the owner of a cell. Out-of-bounds writes are ignored.
    pub fn set(&mut self, cell: IVec3, object: Option<ObjectId>) {
        if let Some(i) = self.index(cell) {
            self.cells[i] = object;
        }
    }

    /// Cell containing a world-space point.
    pub fn cell_at(&self, point: Vec3) -> IVec3 {
        self.to_grid(point).floor().as_ivec3()
    }

    /// World-space box covered by a cell.
    pub fn cell_bounds(&self, cell: IVec3) -> (Vec3, Vec3) {
        let min = self.origin + cell.as_vec3() * self.voxel_size;
        (min, min + Vec3::splat(self.voxel_size))
    }

    pub fn is_solid_at(&self, point: Vec3) -> bool {
        self.get(self.cell_at(point)).is_some()
    }

    /// Assign every cell whose center lies inside the world-space box
    /// `[min, max]` to `object`. Returns the number of cells written.
    pub fn fill_box(&mut self, min: Vec3, max: Vec3, object: Option<ObjectId>) -> usize {
        let (lo, hi) = self.cell_range(min, max);
        let mut written = 0;
        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let cell = IVec3::new(x, y, z);
                    let (cmin, cmax) = self.cell_bounds(cell);
                    let center = (cmin + cmax) * 0.5;
                    if center.cmpge(min).all() && center.cmple(max).all() && self.in_bounds(cell) {
                        self.set(cell, object);
                        written += 1;
                    }
                }
            }
        }
        written
    }

    fn to_grid(&self, point: Vec3) -> Vec3 {
        (point - self.origin) / self.voxel_size
    }

    /// In-bounds inclusive cell range touched by the world box `[min, max]`.
    fn cell_range(&self, min: Vec3, max: Vec3) -> (IVec3, IVec3) {
        let upper = self.size.as_ivec3() - IVec3::ONE;
        let lo = self.cell_at(min).clamp(IVec3::ZERO, upper.max(IVec3::ZERO));
        let hi = self.cell_at(max).clamp(IVec3::ZERO, upper.max(IVec3::ZERO));
        (lo, hi)
    }

    fn blocking(&self, cell: IVec3, ignore: &[ObjectId]) -> Option<ObjectId> {
        self.get(cell).filter(|object| !ignore.contains(object))
    }
}

impl CollisionWorld for VoxelWorld {
    fn line_trace(&self, start: Vec3, end: Vec3, ignore: &[ObjectId]) -> Option<TraceHit> {
        let from = self.to_grid(start);
        let dir = self.to_grid(end) - from;

        let mut cell = from.floor().as_ivec3();
        let mut step = IVec3::ZERO;
        let mut t_max = Vec3::INFINITY;
        let mut t_delta = Vec3::INFINITY;

        for axis in 0..3 {
            if dir[axis] > 0.0 {
                step[axis] = 1;
                t_delta[axis] = 1.0 / dir[axis];
                t_max[axis] = ((cell[axis] as f32 + 1.0) - from[axis]) / dir[axis];
            } else if dir[axis] < 0.0 {
                step[axis] = -1;
                t_delta[axis] = 1.0 / -dir[axis];
                t_max[axis] = (from[axis] - cell[axis] as f32) / -dir[axis];
            }
            // dir == 0: the axis never advances.
        }

        let mut t_entry = 0.0;
        let mut entered_axis: Option<usize> = None;
        loop {
            if let Some(object) = self.blocking(cell, ignore) {
                let normal = match entered_axis {
                    Some(axis) => {
                        let mut n = Vec3::ZERO;
                        n[axis] = -(step[axis] as f32);
                        n
                    }
                    None => (start - end).try_normalize().unwrap_or(UP),
                };
                return Some(TraceHit {
                    location: start.lerp(end, t_entry),
                    normal,
                    object,
                });
            }

            let axis = if t_max.x <= t_max.y && t_max.x <= t_max.z {
                0
            } else if t_max.y <= t_max.z {
                1
            } else {
                2
            };

            if t_max[axis] > 1.0 {
                return None;
            }

            t_entry = t_max[axis];
            entered_axis = Some(axis);
            cell[axis] += step[axis];
            t_max[axis] += t_delta[axis];
        }
    }

    fn overlap(&self, shape: OverlapShape, ignore: &[ObjectId]) -> BTreeSet<ObjectId> {
        let (min, max) = shape.bounds();
        let (lo, hi) = self.cell_range(min, max);
        let mut found = BTreeSet::new();
        if self.cells.is_empty() {
            return found;
        }
        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let cell = IVec3::new(x, y, z);
                    if let Some(object) = self.blocking(cell, ignore) {
                        let (cmin, cmax) = self.cell_bounds(cell);
                        if shape.overlaps_aabb(cmin, cmax) {
                            found.insert(object);
                        }
                    }
                }
            }
        }
        found
    }
}

// Single-threaded executor for world queries.
//
// Many engines only allow collision queries from one designated thread. The
// builder honors that by moving its `CollisionWorld` into a dedicated
// thread and sending every trace and overlap to it over a channel; worker
// threads (rayon in the adjacency and edge stages) hold cheap cloneable
// `WorldHandle`s and block on a reply channel per request. Batched variants
// amortize the round trip over many queries.
//
// The executor runs until every handle is dropped, then hands the world
// back from `shutdown`. If the world panics mid-query, or the executor is
// gone, callers get `BuildError::WorldUnavailable`.
//
// See also: `spider_nav::collision` for the trait being served.

use crate::error::{BuildError, Result};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use glam::Vec3;
use spider_nav::{CollisionWorld, ObjectId, OverlapShape, TraceHit};
use std::collections::BTreeSet;
use std::thread::JoinHandle;

/// A segment to trace, `start -> end`.
pub type Ray = (Vec3, Vec3);

enum WorldRequest {
    Trace {
        ray: Ray,
        ignore: Vec<ObjectId>,
        reply: Sender<Option<TraceHit>>,
    },
    TraceBatch {
        rays: Vec<Ray>,
        ignore: Vec<ObjectId>,
        reply: Sender<Vec<Option<TraceHit>>>,
    },
    OverlapBatch {
        shapes: Vec<OverlapShape>,
        ignore: Vec<ObjectId>,
        reply: Sender<Vec<BTreeSet<ObjectId>>>,
    },
}

/// Owns the executor thread.
pub struct WorldExecutor<W> {
    handle: WorldHandle,
    thread: JoinHandle<W>,
}

impl<W: CollisionWorld + Send + 'static> WorldExecutor<W> {
    /// Move `world` onto its own thread and start serving queries.
    pub fn spawn(world: W) -> Result<Self> {
        let (tx, rx) = unbounded();
        let thread = std::thread::Builder::new()
            .name("spider-nav-world".into())
            .spawn(move || serve(world, rx))?;
        Ok(Self {
            handle: WorldHandle { tx },
            thread,
        })
    }

    pub fn handle(&self) -> WorldHandle {
        self.handle.clone()
    }

    /// Stop serving once all outstanding handles are dropped, and return
    /// the world.
    pub fn shutdown(self) -> Result<W> {
        drop(self.handle);
        self.thread.join().map_err(|_| BuildError::WorldUnavailable)
    }
}

fn serve<W: CollisionWorld>(world: W, rx: Receiver<WorldRequest>) -> W {
    let mut served = 0u64;
    for request in rx {
        // A dropped reply receiver means the caller gave up; nothing to do.
        match request {
            WorldRequest::Trace { ray, ignore, reply } => {
                served += 1;
                reply.send(world.line_trace(ray.0, ray.1, &ignore)).ok();
            }
            WorldRequest::TraceBatch { rays, ignore, reply } => {
                served += rays.len() as u64;
                let hits = rays
                    .iter()
                    .map(|&(start, end)| world.line_trace(start, end, &ignore))
                    .collect();
                reply.send(hits).ok();
            }
            WorldRequest::OverlapBatch {
                shapes,
                ignore,
                reply,
            } => {
                served += shapes.len() as u64;
                let found = shapes
                    .iter()
                    .map(|&shape| world.overlap(shape, &ignore))
                    .collect();
                reply.send(found).ok();
            }
        }
    }
    tracing::debug!(queries = served, "world executor stopped");
    world
}

/// Cloneable, thread-safe access to the executor.
#[derive(Clone)]
pub struct WorldHandle {
    tx: Sender<WorldRequest>,
}

impl WorldHandle {
    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> WorldRequest) -> Result<T> {
        let (reply, rx) = bounded(1);
        self.tx
            .send(make(reply))
            .map_err(|_| BuildError::WorldUnavailable)?;
        rx.recv().map_err(|_| BuildError::WorldUnavailable)
    }

    pub fn line_trace(
        &self,
        start: Vec3,
        end: Vec3,
        ignore: &[ObjectId],
    ) -> Result<Option<TraceHit>> {
        self.request(|reply| WorldRequest::Trace {
            ray: (start, end),
            ignore: ignore.to_vec(),
            reply,
        })
    }

    pub fn line_of_sight(&self, start: Vec3, end: Vec3, ignore: &[ObjectId]) -> Result<bool> {
        Ok(self.line_trace(start, end, ignore)?.is_none())
    }

    /// Trace every ray in one round trip. Results are in input order.
    pub fn line_trace_batch(
        &self,
        rays: Vec<Ray>,
        ignore: &[ObjectId],
    ) -> Result<Vec<Option<TraceHit>>> {
        if rays.is_empty() {
            return Ok(Vec::new());
        }
        self.request(|reply| WorldRequest::TraceBatch {
            rays,
            ignore: ignore.to_vec(),
            reply,
        })
    }

    /// Run every overlap in one round trip. Results are in input order.
    pub fn overlap_batch(
        &self,
        shapes: Vec<OverlapShape>,
        ignore: &[ObjectId],
    ) -> Result<Vec<BTreeSet<ObjectId>>> {
        if shapes.is_empty() {
            return Ok(Vec::new());
        }
        self.request(|reply| WorldRequest::OverlapBatch {
            shapes,
            ignore: ignore.to_vec(),
            reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{IVec3, UVec3};
    use rayon::prelude::*;
    use spider_nav::world::VoxelWorld;

    fn world_with_wall() -> VoxelWorld {
        let mut world = VoxelWorld::new(UVec3::splat(16), Vec3::ZERO, 1.0);
        for y in 0..16 {
            for z in 0..16 {
                world.set(IVec3::new(8, y, z), Some(ObjectId(7)));
            }
        }
        world
    }

    #[test]
    fn single_and_batched_traces_agree() {
        let executor = WorldExecutor::spawn(world_with_wall()).unwrap();
        let handle = executor.handle();

        let through = (Vec3::new(1.5, 3.5, 3.5), Vec3::new(14.5, 3.5, 3.5));
        let beside = (Vec3::new(1.5, 3.5, 3.5), Vec3::new(6.5, 3.5, 3.5));

        let single = handle.line_trace(through.0, through.1, &[]).unwrap();
        assert_eq!(single.map(|h| h.object), Some(ObjectId(7)));
        assert!(handle.line_of_sight(beside.0, beside.1, &[]).unwrap());

        let batch = handle.line_trace_batch(vec![through, beside], &[]).unwrap();
        assert_eq!(batch, vec![single, None]);

        let ignored = handle.line_trace(through.0, through.1, &[ObjectId(7)]).unwrap();
        assert!(ignored.is_none());

        drop(handle);
        let world = executor.shutdown().unwrap();
        assert_eq!(world.get(IVec3::new(8, 0, 0)), Some(ObjectId(7)));
    }

    #[test]
    fn overlap_batch_in_input_order() {
        let executor = WorldExecutor::spawn(world_with_wall()).unwrap();
        let handle = executor.handle();
        let near = OverlapShape::Sphere {
            center: Vec3::new(7.5, 2.0, 2.0),
            radius: 1.0,
        };
        let far = OverlapShape::Sphere {
            center: Vec3::new(2.0, 2.0, 2.0),
            radius: 1.0,
        };
        let found = handle.overlap_batch(vec![far, near], &[]).unwrap();
        assert!(found[0].is_empty());
        assert!(found[1].contains(&ObjectId(7)));
        assert!(handle.overlap_batch(Vec::new(), &[]).unwrap().is_empty());
    }

    #[test]
    fn serves_parallel_workers() {
        let executor = WorldExecutor::spawn(world_with_wall()).unwrap();
        let handle = executor.handle();
        let blocked: usize = (0..64)
            .into_par_iter()
            .map(|i| {
                let y = (i % 16) as f32 + 0.5;
                let end_x = if i % 2 == 0 { 14.5 } else { 6.5 };
                let hit = handle
                    .line_trace(Vec3::new(0.5, y, 0.5), Vec3::new(end_x, y, 0.5), &[])
                    .unwrap();
                usize::from(hit.is_some())
            })
            .sum();
        assert_eq!(blocked, 32);
    }

    struct BrokenWorld;

    impl CollisionWorld for BrokenWorld {
        fn line_trace(&self, _: Vec3, _: Vec3, _: &[ObjectId]) -> Option<TraceHit> {
            panic!("collision scene torn down");
        }

        fn overlap(&self, _: OverlapShape, _: &[ObjectId]) -> BTreeSet<ObjectId> {
            BTreeSet::new()
        }
    }

    #[test]
    fn panicking_world_reports_unavailable() {
        let executor = WorldExecutor::spawn(BrokenWorld).unwrap();
        let handle = executor.handle();
        assert!(matches!(
            handle.line_trace(Vec3::ZERO, Vec3::ONE, &[]),
            Err(BuildError::WorldUnavailable)
        ));
        let sphere = OverlapShape::Sphere {
            center: Vec3::ZERO,
            radius: 1.0,
        };
        assert!(matches!(
            handle.overlap_batch(vec![sphere], &[]),
            Err(BuildError::WorldUnavailable)
        ));
        drop(handle);
        assert!(matches!(executor.shutdown(), Err(BuildError::WorldUnavailable)));
    }
}

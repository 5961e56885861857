// Tracer sampling: a regular lattice over the builder volume.
//
// The lattice spans the world-space bounding box of the (possibly rotated)
// volume with spacing `step`, starting at the box's minimum corner. Each
// lattice point is mapped into the volume's local frame and kept only if it
// lies within the half extents on all three local axes. Lattice coordinates
// are computed as `min + i * step` from integer counts rather than by
// repeated addition, so the far face is reached exactly and the result is
// reproducible. Containment allows a small tolerance relative to `step` for
// the same reason.
//
// Output order is x-major, then y, then z. `lattice_size` reports the
// number of lattice points before containment filtering, or `None` if the
// count does not fit in a `usize`; `GridBuilder::new` uses it to reject
// volumes the configured step would oversample.

use crate::config::BuilderVolume;
use glam::Vec3;

/// Containment slack as a fraction of the step.
const EDGE_TOLERANCE: f32 = 1e-3;

/// Number of lattice samples along an axis of length `span`.
fn samples_along(span: f32, step: f32) -> u64 {
    (((span / step) + EDGE_TOLERANCE).floor().max(0.0) as u64).saturating_add(1)
}

fn lattice_dims(volume: &BuilderVolume, step: f32) -> (u64, u64, u64) {
    let span = volume.world_half_extents() * 2.0;
    (
        samples_along(span.x, step),
        samples_along(span.y, step),
        samples_along(span.z, step),
    )
}

/// Lattice points spanned by `volume` at spacing `step`, before
/// containment filtering.
pub fn lattice_size(volume: &BuilderVolume, step: f32) -> Option<usize> {
    if !step.is_finite() || step <= 0.0 {
        return Some(0);
    }
    let (nx, ny, nz) = lattice_dims(volume, step);
    let total = nx.checked_mul(ny)?.checked_mul(nz)?;
    usize::try_from(total).ok()
}

/// Lattice points of spacing `step` that fall inside `volume`.
pub fn sample_volume(volume: &BuilderVolume, step: f32) -> Vec<Vec3> {
    if !step.is_finite() || step <= 0.0 {
        return Vec::new();
    }
    let min = volume.center - volume.world_half_extents();
    let (nx, ny, nz) = lattice_dims(volume, step);
    let tolerance = step * EDGE_TOLERANCE;

    let mut points = Vec::new();
    for ix in 0..nx {
        for iy in 0..ny {
            for iz in 0..nz {
                let point = min + Vec3::new(ix as f32, iy as f32, iz as f32) * step;
                if volume.contains(point, tolerance) {
                    points.push(point);
                }
            }
        }
    }
    tracing::debug!(
        tracers = points.len(),
        lattice = ?lattice_size(volume, step),
        "sampled builder volume"
    );
    points
}

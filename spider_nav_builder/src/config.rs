// Builder configuration.
//
// `BuildConfig` holds every tunable of the bake: the sampling step and the
// factors that scale it into trace distances, dedup and connection radii,
// and edge-intersection tolerances. Distances are derived from
// `grid_step_size` so a whole grid can be coarsened or refined by changing
// one number. Loaded from JSON with per-field defaults.
//
// `BuilderVolume` is the (possibly rotated) box the builder samples. Its
// optional `object` is the collision object representing the volume
// itself, which every world query ignores.
//
// See also: `pipeline.rs`, which reads this config stage by stage.

use crate::error::{BuildError, Result};
use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use spider_nav::ObjectId;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Lattice spacing for tracer sampling, in world units.
    pub grid_step_size: f32,
    /// How far a surface node is pushed off the surface along its normal.
    pub bounce_distance: f32,
    /// Surface rays start this far from their tracer.
    pub trace_start_offset: f32,
    /// Surface ray length = `grid_step_size * trace_distance_factor`.
    pub trace_distance_factor: f32,
    /// Dedup threshold = `grid_step_size * close_points_factor`.
    pub close_points_factor: f32,
    /// Connection radius = `grid_step_size * connection_radius_factor`.
    pub connection_radius_factor: f32,
    /// Spatial hash cell = connection radius times this. At least 1.
    pub relation_cell_multiplier: f32,
    /// Edge probe length = `grid_step_size * edge_trace_distance_factor`.
    pub edge_trace_distance_factor: f32,
    /// Max gap between two probe lines = `grid_step_size * edge_deviation_factor`.
    pub edge_deviation_factor: f32,
    /// Drop tracers that overlap solid geometry before tracing from them.
    pub remove_enclosed_tracers: bool,
    /// Radius of the overlap sphere used to find enclosed tracers.
    pub enclosed_check_distance: f32,
    /// Tracers per world-executor round trip during surface tracing.
    pub trace_batch_size: usize,
    /// If set, only hits on these objects become nodes.
    pub allow_list: Option<BTreeSet<ObjectId>>,
    /// Hits on these objects never become nodes.
    pub deny_list: Option<BTreeSet<ObjectId>>,
    /// Emit tracer/hit/edge draw commands into the debug sink.
    pub debug_draw: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            grid_step_size: 40.0,
            bounce_distance: 5.0,
            trace_start_offset: 5.0,
            trace_distance_factor: 3.5,
            close_points_factor: 0.25,
            connection_radius_factor: 2.2,
            relation_cell_multiplier: 1.25,
            edge_trace_distance_factor: 4.0,
            edge_deviation_factor: 0.8,
            remove_enclosed_tracers: true,
            enclosed_check_distance: 10.0,
            trace_batch_size: 2000,
            allow_list: None,
            deny_list: None,
            debug_draw: false,
        }
    }
}

impl BuildConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Reject values that would make the pipeline degenerate.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("grid_step_size", self.grid_step_size),
            ("trace_distance_factor", self.trace_distance_factor),
            ("close_points_factor", self.close_points_factor),
            ("connection_radius_factor", self.connection_radius_factor),
            ("edge_trace_distance_factor", self.edge_trace_distance_factor),
            ("edge_deviation_factor", self.edge_deviation_factor),
            ("enclosed_check_distance", self.enclosed_check_distance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(BuildError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("bounce_distance", self.bounce_distance),
            ("trace_start_offset", self.trace_start_offset),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BuildError::InvalidConfig(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        if self.relation_cell_multiplier.is_nan() || self.relation_cell_multiplier < 1.0 {
            return Err(BuildError::InvalidConfig(format!(
                "relation_cell_multiplier must be at least 1, got {}",
                self.relation_cell_multiplier
            )));
        }
        if self.trace_batch_size == 0 {
            return Err(BuildError::InvalidConfig(
                "trace_batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn trace_distance(&self) -> f32 {
        self.grid_step_size * self.trace_distance_factor
    }

    pub fn dedup_distance(&self) -> f32 {
        self.grid_step_size * self.close_points_factor
    }

    pub fn connection_radius(&self) -> f32 {
        self.grid_step_size * self.connection_radius_factor
    }

    pub fn cell_size(&self) -> f32 {
        self.connection_radius() * self.relation_cell_multiplier
    }

    pub fn edge_trace_distance(&self) -> f32 {
        self.grid_step_size * self.edge_trace_distance_factor
    }

    pub fn edge_deviation(&self) -> f32 {
        self.grid_step_size * self.edge_deviation_factor
    }
}

/// Oriented box the builder samples.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuilderVolume {
    pub center: Vec3,
    pub half_extents: Vec3,
    #[serde(default = "identity")]
    pub rotation: Quat,
    /// Collision object of the volume itself; ignored by every world query.
    #[serde(default)]
    pub object: Option<ObjectId>,
}

fn identity() -> Quat {
    Quat::IDENTITY
}

impl BuilderVolume {
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents: half_extents.abs(),
            rotation: Quat::IDENTITY,
            object: None,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation.normalize();
        self
    }

    pub fn with_object(mut self, object: ObjectId) -> Self {
        self.object = Some(object);
        self
    }

    /// `point` expressed in the volume's own frame.
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.center)
    }

    /// Whether `point` lies inside the box, with `tolerance` slack on each
    /// local axis.
    pub fn contains(&self, point: Vec3, tolerance: f32) -> bool {
        let local = self.to_local(point).abs();
        local.cmple(self.half_extents + Vec3::splat(tolerance)).all()
    }

    /// World-space axis-aligned half extents of the rotated box.
    pub fn world_half_extents(&self) -> Vec3 {
        let m = Mat3::from_quat(self.rotation);
        let abs = Mat3::from_cols(m.x_axis.abs(), m.y_axis.abs(), m.z_axis.abs());
        abs * self.half_extents
    }

    /// Objects world queries should skip.
    pub fn ignore_set(&self) -> Vec<ObjectId> {
        self.object.into_iter().collect()
    }
}

// Runtime configuration for the navigator.
//
// `NavigatorConfig` says where the baked grid lives (save slot name and
// index), whether to load it as soon as the navigator is constructed, and
// how relation debug drawing looks. Loaded from JSON; every field has a
// default so a partial file (or `{}`) is valid.
//
// Builder parameters are separate: see `spider_nav_builder::config`.
//
// See also: `navigator.rs`, which consumes this config.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default save slot used by both the bake tool and the runtime navigator.
pub const DEFAULT_SAVE_SLOT: &str = "SpiderNavGridSave";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Save slot the grid is read from.
    pub save_slot: String,
    /// Index within the slot.
    pub save_index: u32,
    /// Load the grid while constructing the navigator.
    pub auto_load: bool,
    /// Length of the normal lines drawn by `draw_debug_relations`.
    pub debug_normal_length: f32,
    /// Seconds each debug draw command stays visible.
    pub debug_draw_lifetime: f32,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            save_slot: DEFAULT_SAVE_SLOT.to_string(),
            save_index: 0,
            auto_load: true,
            debug_normal_length: 100.0,
            debug_draw_lifetime: 2.0,
        }
    }
}

impl NavigatorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

// Error types for the navigation crate.
//
// Only operations that touch storage return errors. Queries against a graph
// (closest node, path search) never fail loudly: they hand back `None` or an
// empty/incomplete path instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed grid record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no saved grid in slot '{slot}' index {index}")]
    SlotNotFound { slot: String, index: u32 },

    #[error("invalid slot name '{0}'")]
    InvalidSlotName(String),
}

pub type Result<T> = std::result::Result<T, NavError>;

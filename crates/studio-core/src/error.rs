//! Error taxonomy shared by the core and the store.

use crate::id::CanvasId;

/// Convenience result type used across the studio crates.
pub type StateResult<T> = Result<T, StateError>;

#[derive(thiserror::Error, Debug)]
pub enum StateError {
    /// A value failed schema validation after migration.
    #[error("validation error in `{slice}`: {reason}")]
    Validation { slice: &'static str, reason: String },

    /// A migration step could not transform its input.
    #[error("migration error in `{slice}` at v{from}: {reason}")]
    Migration {
        slice: &'static str,
        from: u32,
        reason: String,
    },

    /// The blob was written by a newer schema than this build knows.
    #[error("`{slice}` has version {found}, newest supported is {supported}")]
    UnsupportedVersion {
        slice: &'static str,
        found: u32,
        supported: u32,
    },

    /// Per-canvas state that must exist once the canvas is created is missing.
    #[error("`{slice}` has no instance for canvas {canvas_id}")]
    MissingInstance {
        slice: &'static str,
        canvas_id: CanvasId,
    },

    /// An externally sourced value was rejected before assignment.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// Errors when serializing or deserializing persisted blobs.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StateError {
    pub fn validation(slice: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            slice,
            reason: reason.into(),
        }
    }

    pub fn migration(slice: &'static str, from: u32, reason: impl Into<String>) -> Self {
        Self::Migration {
            slice,
            from,
            reason: reason.into(),
        }
    }

    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

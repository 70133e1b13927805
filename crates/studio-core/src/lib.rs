pub mod error;
pub mod id;
pub mod migrate;
pub mod model;
pub mod sizing;
pub mod validate;

pub use error::{StateError, StateResult};
pub use id::{CanvasId, MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER, prefixed_id};
pub use migrate::{MigrationStep, Migrator, VERSION_KEY};
pub use model::*;
pub use sizing::{AspectRatioConfig, AspectRatioId, Dimensions, SizeEditor};
pub use validate::{Validate, ValidationIssue, ensure_valid};

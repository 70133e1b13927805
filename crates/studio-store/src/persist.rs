//! Persistence host: versioned per-slice blobs in, typed slices out.
//!
//! Every persisted slice is stored as its own JSON object tagged with
//! `_version`. Rehydration migrates and validates each slice independently;
//! a slice that fails falls back to its initial state without taking the
//! others down with it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use studio_core::{Migrator, StateResult, Validate};

pub trait PersistedSlice: Sized + Serialize + DeserializeOwned + Validate {
    /// Storage key; also the name errors report.
    const NAME: &'static str;
    const MIGRATOR: Migrator;

    fn initial() -> Self;

    fn version() -> u32 {
        Self::MIGRATOR.current_version()
    }

    /// Upgrade a stored blob to the current shape and validate it.
    fn migrate(raw: Value) -> StateResult<Self> {
        Self::MIGRATOR.decode(raw)
    }

    fn to_persisted(&self) -> StateResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Restore from storage. Absent or unusable blobs give the initial state.
    fn rehydrate(raw: Option<Value>) -> Self {
        let Some(raw) = raw else {
            log::debug!("no stored {}, starting fresh", Self::NAME);
            return Self::initial();
        };
        match Self::migrate(raw) {
            Ok(slice) => slice,
            Err(err) => {
                log::warn!("discarding stored {}: {err}", Self::NAME);
                Self::initial()
            }
        }
    }
}

/// What a host writes to and reads from storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedState {
    pub params: Option<Value>,
    pub canvas_settings: Option<Value>,
    pub canvas_staging_area: Option<Value>,
    pub canvas: Option<Value>,
}

//! Store configuration.

use crate::action::Tab;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`crate::Store`].
///
/// Deserialises from a partial JSON object; absent fields keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Undo snapshots kept per canvas. Default: **64**.
    pub history_limit: usize,

    /// Same-type canvas edits closer together than this collapse into one
    /// undo step. Default: **1000** ms.
    pub undo_throttle_ms: u64,

    /// Entries kept in each instance's positive prompt history. Default: **100**.
    pub max_prompt_history: usize,

    /// Tab active when a store is created. Default: **generate**.
    pub initial_tab: Tab,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_limit: 64,
            undo_throttle_ms: 1000,
            max_prompt_history: 100,
            initial_tab: Tab::Generate,
        }
    }
}

impl StoreConfig {
    pub fn undo_throttle(&self) -> Duration {
        Duration::from_millis(self.undo_throttle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{ "historyLimit": 8 }"#).unwrap();
        assert_eq!(config.history_limit, 8);
        assert_eq!(config.undo_throttle(), Duration::from_secs(1));
        assert_eq!(config.initial_tab, Tab::Generate);
    }
}

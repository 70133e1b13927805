//! Stepwise migration of persisted slice blobs.
//!
//! A blob is untyped JSON tagged with `_version`. Each slice declares a
//! [`Migrator`]: the version an untagged blob is assumed to be, and one step
//! per version bump. Steps are structural only; they never look at the live
//! store. After the last step the value is decoded into the typed slice and
//! validated.

use crate::error::{StateError, StateResult};
use crate::validate::{Validate, ensure_valid};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Key carrying the schema version in every persisted blob.
pub const VERSION_KEY: &str = "_version";

/// Upgrade a blob from version `n` to `n + 1`. The migrator stamps the new
/// version afterwards, so steps don't have to.
pub type MigrationStep = fn(Value) -> StateResult<Value>;

#[derive(Clone, Copy)]
pub struct Migrator {
    pub slice: &'static str,
    /// Version assumed when `_version` is absent.
    pub untagged_version: u32,
    /// `steps[i]` upgrades `untagged_version + i` to `untagged_version + i + 1`.
    pub steps: &'static [MigrationStep],
}

impl Migrator {
    /// The version every successful migration ends at.
    pub fn current_version(&self) -> u32 {
        self.untagged_version + self.steps.len() as u32
    }

    /// Read the version tag, defaulting to the untagged version.
    pub fn version_of(&self, raw: &Value) -> StateResult<u32> {
        let obj = raw
            .as_object()
            .ok_or_else(|| StateError::migration(self.slice, self.untagged_version, "blob is not an object"))?;
        match obj.get(VERSION_KEY) {
            None => Ok(self.untagged_version),
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    StateError::migration(self.slice, self.untagged_version, format!("bad `_version`: {v}"))
                }),
        }
    }

    /// Run the steps needed to bring `raw` to `target`. Values already at or
    /// past `target` (but not past the newest version) come back unchanged.
    pub fn migrate_to(&self, raw: Value, target: u32) -> StateResult<Value> {
        let found = self.version_of(&raw)?;
        let current = self.current_version();
        if found > current {
            return Err(StateError::UnsupportedVersion {
                slice: self.slice,
                found,
                supported: current,
            });
        }
        if found < self.untagged_version {
            return Err(StateError::migration(
                self.slice,
                found,
                format!("versions below {} are not supported", self.untagged_version),
            ));
        }

        let target = target.min(current);
        let mut value = raw;
        for version in found..target {
            let step = self.steps[(version - self.untagged_version) as usize];
            value = step(value)?;
            let obj = expect_object(self.slice, version, &mut value)?;
            obj.insert(VERSION_KEY.to_string(), Value::from(version + 1));
            log::info!("migrated `{}` v{} -> v{}", self.slice, version, version + 1);
        }
        Ok(value)
    }

    /// Migrate all the way to the current version.
    pub fn migrate(&self, raw: Value) -> StateResult<Value> {
        self.migrate_to(raw, self.current_version())
    }

    /// Migrate, decode into `T`, and validate.
    ///
    /// # Errors
    /// `Migration` / `UnsupportedVersion` from the steps, `Validation` when the
    /// migrated value doesn't fit the current schema.
    pub fn decode<T: DeserializeOwned + Validate>(&self, raw: Value) -> StateResult<T> {
        let value = self.migrate(raw)?;
        let typed: T = serde_json::from_value(value)
            .map_err(|e| StateError::validation(self.slice, e.to_string()))?;
        ensure_valid(self.slice, &typed)?;
        Ok(typed)
    }
}

// ─── Step helpers ─────────────────────────────────────────────────────────

/// Borrow the blob as an object or fail the step.
pub fn expect_object<'a>(
    slice: &'static str,
    from: u32,
    value: &'a mut Value,
) -> StateResult<&'a mut Map<String, Value>> {
    value
        .as_object_mut()
        .ok_or_else(|| StateError::migration(slice, from, "expected an object"))
}

/// Insert `key: default` unless the key is already present.
pub fn default_field(obj: &mut Map<String, Value>, key: &str, default: Value) {
    obj.entry(key.to_string()).or_insert(default);
}

/// Move `key` from `from` into `to`, if present.
pub fn move_field(from: &mut Map<String, Value>, to: &mut Map<String, Value>, key: &str) {
    if let Some(v) = from.remove(key) {
        to.insert(key.to_string(), v);
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Global string interner for canvas ids. Instance lookups compare 4 bytes.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Id of the single pre-multi-canvas instance lifted out of a legacy blob.
/// Renamed to a real id the first time a canvas id becomes available.
pub const MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER: &str = "__multi_canvas_migration_placeholder__";

/// Identifier of one canvas instance. Every slice that keeps per-canvas
/// state keys it by this id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasId(Spur);

impl CanvasId {
    /// Intern a string as a CanvasId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        CanvasId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// The migration placeholder id.
    pub fn placeholder() -> Self {
        Self::intern(MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER)
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }

    /// Generate a fresh id (`canvas_<salt>_<n>`).
    pub fn generate() -> Self {
        Self::intern(&prefixed_id("canvas"))
    }
}

/// Per-process salt so ids generated after a reload never collide with
/// ids that came back from persisted state.
static SALT: LazyLock<u64> = LazyLock::new(|| {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
});

/// Generate a unique id with a prefix (e.g. `session_18c3f0a2_3`).
pub fn prefixed_id(prefix: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{:x}_{n}", *SALT & 0xffff_ffff)
}

// Ordered by string so persisted maps come out the same in every process.
impl Ord for CanvasId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for CanvasId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CanvasId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CanvasId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(CanvasId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = CanvasId::intern("canvas_main");
        let b = CanvasId::intern("canvas_main");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "canvas_main");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = CanvasId::generate();
        let b = CanvasId::generate();
        assert_ne!(a, b);
        assert!(!a.is_placeholder());
    }

    #[test]
    fn placeholder_serializes_as_plain_string() {
        let json = serde_json::to_string(&CanvasId::placeholder()).unwrap();
        assert_eq!(json, format!("\"{MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER}\""));
        let back: CanvasId = serde_json::from_str(&json).unwrap();
        assert!(back.is_placeholder());
    }
}

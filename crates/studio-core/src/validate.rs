//! Schema checks for typed slice state.
//!
//! Serde gives us the field shapes; `Validate` adds the constraints serde
//! can't express (version literals, positive widths, unique ids, keys that
//! match the embedded id). Only run at the persistence boundary.

use crate::error::{StateError, StateResult};

// ─── Issue types ──────────────────────────────────────────────────────────

/// One failed constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON-pointer-ish location, e.g. `canvases[2].brushWidth`.
    pub path: String,
    pub message: String,
    /// Short rule identifier (e.g. "version", "positive", "key-mismatch").
    pub rule: &'static str,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            rule,
        }
    }
}

/// Implemented by every persisted slice and the records inside it.
pub trait Validate {
    /// Push an issue for each violated constraint. `path` is the location of
    /// `self` within the slice ("" at the root).
    fn collect_issues(&self, path: &str, issues: &mut Vec<ValidationIssue>);

    /// Run all checks and return the findings.
    #[must_use]
    fn issues(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.collect_issues("", &mut issues);
        issues
    }
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Fail with `StateError::Validation` if `value` has any issue.
pub fn ensure_valid<T: Validate>(slice: &'static str, value: &T) -> StateResult<()> {
    let issues = value.issues();
    if issues.is_empty() {
        return Ok(());
    }
    let reason = issues
        .iter()
        .map(|i| format!("{}: {} [{}]", display_path(&i.path), i.message, i.rule))
        .collect::<Vec<_>>()
        .join("; ");
    Err(StateError::validation(slice, reason))
}

/// Join a parent path and a field name.
pub fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else if field.starts_with('[') {
        format!("{parent}{field}")
    } else {
        format!("{parent}.{field}")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

// ─── Rules ────────────────────────────────────────────────────────────────

/// The `_version` field must equal the schema's literal.
pub fn check_version(found: u32, expected: u32, issues: &mut Vec<ValidationIssue>) {
    if found != expected {
        issues.push(ValidationIssue::new(
            "_version",
            "version",
            format!("expected {expected}, found {found}"),
        ));
    }
}

pub fn check_positive(path: &str, field: &str, value: f64, issues: &mut Vec<ValidationIssue>) {
    if !(value > 0.0) {
        issues.push(ValidationIssue::new(
            join_path(path, field),
            "positive",
            format!("must be > 0, found {value}"),
        ));
    }
}

pub fn check_range(
    path: &str,
    field: &str,
    value: f64,
    min: f64,
    max: f64,
    issues: &mut Vec<ValidationIssue>,
) {
    if !(min..=max).contains(&value) {
        issues.push(ValidationIssue::new(
            join_path(path, field),
            "range",
            format!("must be within {min}..={max}, found {value}"),
        ));
    }
}

/// A keyed record must carry the same id as the key it is stored under.
pub fn check_key_matches(path: &str, key: &str, embedded: &str, issues: &mut Vec<ValidationIssue>) {
    if key != embedded {
        issues.push(ValidationIssue::new(
            path,
            "key-mismatch",
            format!("stored under `{key}` but carries id `{embedded}`"),
        ));
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

//! Canvas staging sessions: which generation results a canvas is showing
//! before they are accepted or discarded.

use crate::partition::{self, InstanceMap, InstanceTable, Keyed};
use crate::persist::PersistedSlice;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use smallvec::SmallVec;
use studio_core::migrate::expect_object;
use studio_core::validate::{ValidationIssue, check_key_matches, check_version, join_path};
use studio_core::{CanvasId, MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER, Migrator, StateResult, Validate, prefixed_id};

pub const STAGING_VERSION: u32 = 2;

// ─── State ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub canvas_id: CanvasId,
    pub canvas_session_id: String,
    /// Queue items the user threw away; kept unique.
    pub canvas_discarded_queue_items: SmallVec<[u64; 8]>,
}

impl Session {
    pub fn new(canvas_id: CanvasId) -> Self {
        Self {
            canvas_id,
            canvas_session_id: prefixed_id("canvas"),
            canvas_discarded_queue_items: SmallVec::new(),
        }
    }
}

impl Keyed for Session {
    fn key(&self) -> CanvasId {
        self.canvas_id
    }

    fn set_key(&mut self, id: CanvasId) {
        self.canvas_id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasStagingAreaState {
    #[serde(rename = "_version")]
    pub version: u32,
    pub sessions: InstanceMap<Session>,
}

// ─── Queue input ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Canceled,
}

/// A queue entry as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub item_id: u64,
    pub status: QueueItemStatus,
    /// Session the item renders into.
    pub destination: String,
}

/// Items of `session` still worth showing: not canceled, not failed, not
/// discarded.
pub fn visible_queue_items<'a>(session: &Session, items: &'a [QueueItem]) -> Vec<&'a QueueItem> {
    items
        .iter()
        .filter(|item| item.destination == session.canvas_session_id)
        .filter(|item| !matches!(item.status, QueueItemStatus::Canceled | QueueItemStatus::Failed))
        .filter(|item| !session.canvas_discarded_queue_items.contains(&item.item_id))
        .collect()
}

pub fn is_staging(session: &Session, items: &[QueueItem]) -> bool {
    !visible_queue_items(session, items).is_empty()
}

// ─── Actions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum StagingAction {
    QueueItemDiscarded(u64),
    /// Start a new session; discards are forgotten.
    SessionReset,
}

impl StagingAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::QueueItemDiscarded(_) => "canvasSession/canvasQueueItemDiscarded",
            Self::SessionReset => "canvasSession/canvasSessionReset",
        }
    }
}

pub fn reduce_session(session: &mut Session, action: &StagingAction) {
    match action {
        StagingAction::QueueItemDiscarded(item_id) => {
            if !session.canvas_discarded_queue_items.contains(item_id) {
                session.canvas_discarded_queue_items.push(*item_id);
            }
        }
        StagingAction::SessionReset => {
            session.canvas_session_id = prefixed_id("canvas");
            session.canvas_discarded_queue_items.clear();
        }
    }
}

impl CanvasStagingAreaState {
    pub fn reduce(&mut self, action: &StagingAction, canvas_id: CanvasId) -> bool {
        partition::apply(&mut self.sessions, canvas_id, |s| reduce_session(s, action))
    }

    pub fn canvas_added(&mut self, canvas_id: CanvasId) {
        self.sessions.insert(Session::new(canvas_id));
    }

    pub fn canvas_deleted(&mut self, canvas_id: CanvasId) {
        self.sessions.remove(canvas_id);
    }

    pub fn canvas_initialized(&mut self, canvas_id: CanvasId) {
        if !self.sessions.contains(canvas_id) {
            self.sessions.insert(Session::new(canvas_id));
        }
    }

    pub fn canvas_multi_canvas_migrated(&mut self, canvas_id: CanvasId) -> bool {
        self.sessions.rekey(CanvasId::placeholder(), canvas_id)
    }
}

// ─── Persistence ──────────────────────────────────────────────────────────

/// v1 held a single session at the root.
fn wrap_single_session(mut raw: Value) -> StateResult<Value> {
    let obj = expect_object(CanvasStagingAreaState::NAME, 1, &mut raw)?;
    let session_id = obj
        .remove("canvasSessionId")
        .unwrap_or_else(|| json!(prefixed_id("canvas")));
    let discarded = obj.remove("canvasDiscardedQueueItems").unwrap_or_else(|| json!([]));

    Ok(json!({
        "sessions": {
            MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER: {
                "canvasId": MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER,
                "canvasSessionId": session_id,
                "canvasDiscardedQueueItems": discarded,
            }
        }
    }))
}

impl PersistedSlice for CanvasStagingAreaState {
    const NAME: &'static str = "canvasSession";
    const MIGRATOR: Migrator = Migrator {
        slice: "canvasSession",
        untagged_version: 1,
        steps: &[wrap_single_session],
    };

    fn initial() -> Self {
        Self {
            version: STAGING_VERSION,
            sessions: InstanceMap::default(),
        }
    }
}

impl Validate for CanvasStagingAreaState {
    fn collect_issues(&self, path: &str, issues: &mut Vec<ValidationIssue>) {
        check_version(self.version, STAGING_VERSION, issues);
        for (key, session) in self.sessions.iter() {
            let p = join_path(&join_path(path, "sessions"), key.as_str());
            check_key_matches(&p, key.as_str(), session.canvas_id.as_str(), issues);
            if session.canvas_session_id.is_empty() {
                issues.push(ValidationIssue::new(
                    join_path(&p, "canvasSessionId"),
                    "non-empty",
                    "session id is empty",
                ));
            }
            let items = &session.canvas_discarded_queue_items;
            if items.iter().enumerate().any(|(i, id)| items[..i].contains(id)) {
                issues.push(ValidationIssue::new(
                    join_path(&p, "canvasDiscardedQueueItems"),
                    "unique",
                    "discarded items repeat",
                ));
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

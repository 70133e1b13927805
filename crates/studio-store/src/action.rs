//! Actions and the context they are routed by.
//!
//! An [`Action`] is one slice-level event plus the UI context it was
//! dispatched from. Context-sensitive actions get their context stamped by
//! [`crate::middleware::inject_context`]; the partitioned reducers route on
//! it.

use crate::canvas::CanvasAction;
use crate::canvas_settings::SettingsAction;
use crate::params::ParamsAction;
use crate::staging::StagingAction;
use crate::ui::UiAction;
use serde::{Deserialize, Serialize};
use studio_core::CanvasId;

/// Top-level UI tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Generate,
    Canvas,
    Upscaling,
    Workflows,
    Models,
    Queue,
    Video,
}

/// Where a context-sensitive action was dispatched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionContext {
    pub tab: Tab,
    /// Set only when `tab` is `Canvas`.
    pub canvas_id: Option<CanvasId>,
}

impl ActionContext {
    pub fn new(tab: Tab, active_canvas: CanvasId) -> Self {
        Self {
            tab,
            canvas_id: (tab == Tab::Canvas).then_some(active_canvas),
        }
    }

    pub fn canvas(canvas_id: CanvasId) -> Self {
        Self {
            tab: Tab::Canvas,
            canvas_id: Some(canvas_id),
        }
    }

    pub fn tab(tab: Tab) -> Self {
        Self { tab, canvas_id: None }
    }
}

// ─── Lifecycle ────────────────────────────────────────────────────────────

/// Canvas lifecycle events every per-canvas slice listens to.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleAction {
    CanvasAdded { canvas_id: CanvasId, is_selected: bool },
    CanvasDeleted { canvas_id: CanvasId },
    CanvasSelected { canvas_id: CanvasId },
    /// Make sure every slice has an instance for the canvas.
    CanvasInitialized { canvas_id: CanvasId },
    /// Rename the migration placeholder instance to a real id.
    CanvasMultiCanvasMigrated { canvas_id: CanvasId },
}

impl LifecycleAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::CanvasAdded { .. } => "canvases/canvasAdded",
            Self::CanvasDeleted { .. } => "canvases/canvasDeleted",
            Self::CanvasSelected { .. } => "canvases/canvasSelected",
            Self::CanvasInitialized { .. } => "canvases/canvasInitialized",
            Self::CanvasMultiCanvasMigrated { .. } => "canvases/canvasMultiCanvasMigrated",
        }
    }
}

// ─── Action ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Params(ParamsAction),
    CanvasSettings(SettingsAction),
    Staging(StagingAction),
    Canvas(CanvasAction),
    Ui(UiAction),
    Lifecycle(LifecycleAction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub context: Option<ActionContext>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, context: None }
    }

    /// An action explicitly targeted at `context`; injection leaves it alone.
    pub fn targeted(kind: impl Into<ActionKind>, context: ActionContext) -> Self {
        Self {
            kind: kind.into(),
            context: Some(context),
        }
    }

    /// `"<slice>/<name>"`, the identity the undo filter throttles on.
    pub fn action_type(&self) -> &'static str {
        match &self.kind {
            ActionKind::Params(a) => a.action_type(),
            ActionKind::CanvasSettings(a) => a.action_type(),
            ActionKind::Staging(a) => a.action_type(),
            ActionKind::Canvas(a) => a.action_type(),
            ActionKind::Ui(a) => a.action_type(),
            ActionKind::Lifecycle(a) => a.action_type(),
        }
    }

    /// Whether the action is routed by the active tab/canvas.
    pub fn requires_context(&self) -> bool {
        match &self.kind {
            ActionKind::Params(_) | ActionKind::Staging(_) | ActionKind::Canvas(_) => true,
            ActionKind::CanvasSettings(a) => a.is_instance_scoped(),
            ActionKind::Ui(_) | ActionKind::Lifecycle(_) => false,
        }
    }
}

macro_rules! impl_from_slice_action {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ActionKind {
                fn from(a: $ty) -> Self {
                    ActionKind::$variant(a)
                }
            }

            impl From<$ty> for Action {
                fn from(a: $ty) -> Self {
                    Action::new(ActionKind::$variant(a))
                }
            }
        )*
    };
}

impl_from_slice_action! {
    ParamsAction => Params,
    SettingsAction => CanvasSettings,
    StagingAction => Staging,
    CanvasAction => Canvas,
    UiAction => Ui,
    LifecycleAction => Lifecycle,
}

impl From<ActionKind> for Action {
    fn from(kind: ActionKind) -> Self {
        Action::new(kind)
    }
}

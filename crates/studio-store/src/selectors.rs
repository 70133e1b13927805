//! Read-side lookups against [`RootState`].
//!
//! Per-canvas instances are created with their canvas, so a missing one is
//! a broken invariant and reported as [`StateError::MissingInstance`].

use crate::action::{ActionContext, Tab};
use crate::canvas::CanvasInstance;
use crate::canvas_settings::InstanceSettings;
use crate::params::InstanceParams;
use crate::partition::InstanceTable;
use crate::staging::{QueueItem, Session, is_staging};
use crate::store::RootState;
use std::sync::LazyLock;
use studio_core::{CanvasId, StateError, StateResult};

/// Shown on tabs that have no params panel of their own.
static DETACHED_PARAMS: LazyLock<InstanceParams> = LazyLock::new(InstanceParams::default);

pub fn select_active_context(state: &RootState) -> ActionContext {
    ActionContext::new(state.ui.active_tab, state.canvas.active_canvas_id)
}

/// Params of whatever `context` addresses.
pub fn select_params<'a>(state: &'a RootState, context: &ActionContext) -> StateResult<&'a InstanceParams> {
    match context.tab {
        Tab::Generate => Ok(&state.params.generate),
        Tab::Upscaling => Ok(&state.params.upscaling),
        Tab::Video => Ok(&state.params.video),
        Tab::Canvas => {
            let canvas_id = context.canvas_id.unwrap_or(state.canvas.active_canvas_id);
            state
                .params
                .canvases
                .get(canvas_id)
                .map(|c| &c.params)
                .ok_or(StateError::MissingInstance {
                    slice: "params",
                    canvas_id,
                })
        }
        Tab::Workflows | Tab::Models | Tab::Queue => Ok(&DETACHED_PARAMS),
    }
}

pub fn select_active_params(state: &RootState) -> StateResult<&InstanceParams> {
    select_params(state, &select_active_context(state))
}

pub fn select_canvas_settings(state: &RootState, canvas_id: CanvasId) -> StateResult<&InstanceSettings> {
    state
        .canvas_settings
        .canvases
        .get(canvas_id)
        .ok_or(StateError::MissingInstance {
            slice: "canvasSettings",
            canvas_id,
        })
}

pub fn select_active_canvas_settings(state: &RootState) -> StateResult<&InstanceSettings> {
    select_canvas_settings(state, state.canvas.active_canvas_id)
}

pub fn select_active_canvas(state: &RootState) -> StateResult<&CanvasInstance> {
    state.canvas.active().ok_or(StateError::MissingInstance {
        slice: "canvas",
        canvas_id: state.canvas.active_canvas_id,
    })
}

pub fn select_staging_session(state: &RootState, canvas_id: CanvasId) -> StateResult<&Session> {
    state
        .staging
        .sessions
        .get(canvas_id)
        .ok_or(StateError::MissingInstance {
            slice: "canvasSession",
            canvas_id,
        })
}

/// Whether `canvas_id` has results waiting in its staging area. Unknown
/// canvases are never staging.
pub fn select_is_staging(state: &RootState, canvas_id: CanvasId, items: &[QueueItem]) -> bool {
    select_staging_session(state, canvas_id)
        .map(|session| is_staging(session, items))
        .unwrap_or(false)
}

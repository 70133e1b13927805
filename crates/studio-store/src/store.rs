//! The root store: owns every slice, stamps actions with their context,
//! and routes them to the instance they address.

use crate::action::{Action, ActionKind, LifecycleAction, Tab};
use crate::canvas::CanvasesState;
use crate::canvas_settings::CanvasSettingsState;
use crate::config::StoreConfig;
use crate::history::{Clock, SystemClock};
use crate::middleware::inject_context;
use crate::params::{self, ParamsAction, ParamsState};
use crate::partition::InstanceTable;
use crate::persist::{PersistedSlice, PersistedState};
use crate::staging::CanvasStagingAreaState;
use crate::ui::{UiState, reduce_ui};
use std::sync::Arc;
use studio_core::model::ModelSlot;
use studio_core::{CanvasId, StateResult};

// ─── Root state ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RootState {
    pub params: ParamsState,
    pub canvas_settings: CanvasSettingsState,
    pub staging: CanvasStagingAreaState,
    pub canvas: CanvasesState,
    pub ui: UiState,
}

impl RootState {
    /// Fresh state with one canvas that every per-canvas slice knows about.
    pub fn initial(config: &StoreConfig) -> Self {
        let mut state = Self {
            params: ParamsState::initial(),
            canvas_settings: CanvasSettingsState::initial(),
            staging: CanvasStagingAreaState::initial(),
            canvas: CanvasesState::initial(),
            ui: UiState::new(config.initial_tab),
        };
        state.canvas.configure_history(config.history_limit, config.undo_throttle());
        for id in state.canvas.canvases.ids() {
            state.params.canvas_initialized(id);
            state.canvas_settings.canvas_initialized(id);
            state.staging.canvas_initialized(id);
        }
        state
    }
}

// ─── Store ────────────────────────────────────────────────────────────────

pub struct Store {
    state: RootState,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
}

impl Store {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::default()))
    }

    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        let state = RootState::initial(&config);
        Self { state, config, clock }
    }

    /// Rebuild a store from persisted blobs. Each slice that can't be
    /// migrated falls back to its initial state; the rest is then brought
    /// back in line with the canvas list.
    pub fn rehydrate(config: StoreConfig, persisted: PersistedState) -> Self {
        Self::rehydrate_with_clock(config, persisted, Arc::new(SystemClock::default()))
    }

    pub fn rehydrate_with_clock(config: StoreConfig, persisted: PersistedState, clock: Arc<dyn Clock>) -> Self {
        let mut canvas = CanvasesState::rehydrate(persisted.canvas);
        canvas.configure_history(config.history_limit, config.undo_throttle());
        let state = RootState {
            params: ParamsState::rehydrate(persisted.params),
            canvas_settings: CanvasSettingsState::rehydrate(persisted.canvas_settings),
            staging: CanvasStagingAreaState::rehydrate(persisted.canvas_staging_area),
            canvas,
            ui: UiState::new(config.initial_tab),
        };
        let mut store = Self { state, config, clock };
        store.reconcile();
        store
    }

    pub fn state(&self) -> &RootState {
        &self.state
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Serialize every persisted slice.
    pub fn persist(&self) -> StateResult<PersistedState> {
        Ok(PersistedState {
            params: Some(self.state.params.to_persisted()?),
            canvas_settings: Some(self.state.canvas_settings.to_persisted()?),
            canvas_staging_area: Some(self.state.staging.to_persisted()?),
            canvas: Some(self.state.canvas.to_persisted()?),
        })
    }

    /// Stamp `action` with the current context if it needs one, then reduce
    /// it. Returns whether any slice handled it.
    pub fn dispatch(&mut self, action: impl Into<Action>) -> bool {
        let mut action = action.into();
        inject_context(&self.state, &mut action);
        log::trace!("dispatch {}", action.action_type());

        let context = action.context;
        let canvas_id = context.and_then(|c| c.canvas_id);
        match &action.kind {
            ActionKind::Params(a) => {
                let Some(context) = context else {
                    log::debug!("{} arrived without a context", a.action_type());
                    return false;
                };
                let config = &self.config;
                let handled = self
                    .state
                    .params
                    .with_instance(&context, |p| params::reduce_instance(p, a, config));
                if handled && context.tab == Tab::Canvas {
                    if let (ParamsAction::ModelChanged(model), Some(id)) = (a, canvas_id) {
                        self.canvas_model_changed(id, a.action_type(), model.as_ref());
                    }
                }
                handled
            }
            ActionKind::CanvasSettings(a) => self.state.canvas_settings.reduce(a, canvas_id),
            ActionKind::Staging(a) => match canvas_id {
                Some(id) => self.state.staging.reduce(a, id),
                None => {
                    log::debug!("{} needs a canvas, dropping", a.action_type());
                    false
                }
            },
            ActionKind::Canvas(a) => match canvas_id {
                Some(id) => {
                    let now = self.clock.now();
                    self.state.canvas.reduce(a, id, now)
                }
                None => {
                    log::debug!("{} needs a canvas, dropping", a.action_type());
                    false
                }
            },
            ActionKind::Ui(a) => {
                reduce_ui(&mut self.state.ui, a);
                true
            }
            ActionKind::Lifecycle(a) => self.lifecycle(a),
        }
    }

    fn canvas_model_changed(
        &mut self,
        canvas_id: CanvasId,
        action_type: &'static str,
        model: Option<&studio_core::ModelIdentifier>,
    ) {
        let Some(model) = model.filter(|m| m.check(ModelSlot::Main).is_ok()) else {
            return;
        };
        let now = self.clock.now();
        self.state
            .canvas
            .apply_external(canvas_id, action_type, now, |s| s.bbox.model_changed(Some(model)));
    }

    fn lifecycle(&mut self, action: &LifecycleAction) -> bool {
        let state = &mut self.state;
        match *action {
            LifecycleAction::CanvasAdded { canvas_id, is_selected } => {
                if state.canvas.canvases.contains(canvas_id) {
                    log::debug!("canvas {canvas_id} already exists");
                    return false;
                }
                state.canvas.canvas_added(
                    canvas_id,
                    is_selected,
                    self.config.history_limit,
                    self.config.undo_throttle(),
                );
                state.params.canvas_added(canvas_id);
                state.canvas_settings.canvas_added(canvas_id);
                state.staging.canvas_added(canvas_id);
                log::info!("added canvas {canvas_id}");
                true
            }
            LifecycleAction::CanvasDeleted { canvas_id } => {
                if !state.canvas.canvas_deleted(canvas_id) {
                    log::debug!("refusing to delete canvas {canvas_id}");
                    return false;
                }
                state.params.canvas_deleted(canvas_id);
                state.canvas_settings.canvas_deleted(canvas_id);
                state.staging.canvas_deleted(canvas_id);
                log::info!("deleted canvas {canvas_id}");
                true
            }
            LifecycleAction::CanvasSelected { canvas_id } => state.canvas.canvas_selected(canvas_id),
            LifecycleAction::CanvasInitialized { canvas_id } => {
                if !state.canvas.canvases.contains(canvas_id) {
                    log::debug!("not initializing unknown canvas {canvas_id}");
                    return false;
                }
                state.params.canvas_initialized(canvas_id);
                state.canvas_settings.canvas_initialized(canvas_id);
                state.staging.canvas_initialized(canvas_id);
                true
            }
            LifecycleAction::CanvasMultiCanvasMigrated { canvas_id } => {
                let canvas = state.canvas.canvas_multi_canvas_migrated(canvas_id);
                let params = state.params.canvas_multi_canvas_migrated(canvas_id);
                let settings = state.canvas_settings.canvas_multi_canvas_migrated(canvas_id);
                let staging = state.staging.canvas_multi_canvas_migrated(canvas_id);
                let migrated = canvas || params || settings || staging;
                if migrated {
                    log::info!("migrated single-canvas state to canvas {canvas_id}");
                }
                migrated
            }
        }
    }

    /// Bring the per-canvas slices in line with the canvas list after a
    /// rehydrate: rename leftover placeholders, create missing instances,
    /// drop instances of canvases that no longer exist.
    fn reconcile(&mut self) {
        let placeholder = CanvasId::placeholder();
        let migrated_id = if self.state.canvas.canvases.contains(placeholder) {
            Some(CanvasId::generate())
        } else if self.state.params.canvases.contains(placeholder)
            || self.state.canvas_settings.canvases.contains(placeholder)
            || self.state.staging.sessions.contains(placeholder)
        {
            Some(self.state.canvas.active_canvas_id)
        } else {
            None
        };
        if let Some(canvas_id) = migrated_id {
            self.dispatch(LifecycleAction::CanvasMultiCanvasMigrated { canvas_id });
        }

        let canvases = self.state.canvas.canvases.ids();
        for &canvas_id in &canvases {
            self.dispatch(LifecycleAction::CanvasInitialized { canvas_id });
        }

        let state = &mut self.state;
        for id in state.params.canvases.ids() {
            if !canvases.contains(&id) {
                log::info!("dropping params of unknown canvas {id}");
                state.params.canvas_deleted(id);
            }
        }
        for id in state.canvas_settings.canvases.ids() {
            if !canvases.contains(&id) {
                log::info!("dropping settings of unknown canvas {id}");
                state.canvas_settings.canvas_deleted(id);
            }
        }
        for id in state.staging.sessions.ids() {
            if !canvases.contains(&id) {
                log::info!("dropping staging session of unknown canvas {id}");
                state.staging.canvas_deleted(id);
            }
        }
    }
}

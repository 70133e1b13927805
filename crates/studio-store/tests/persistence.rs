//! Integration tests: rehydrating persisted slices (studio-store).
//!
//! Legacy single-canvas blobs are migrated, validated and reconciled so
//! that every per-canvas slice ends up keyed by the same real canvas id.

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use studio_core::model::{BaseModel, Scheduler};
use studio_core::{CanvasId, StateError};
use studio_store::canvas_settings::ActiveColor;
use studio_store::{
    CanvasAction, CanvasSettingsState, CanvasStagingAreaState, CanvasesState, InstanceTable, LifecycleAction,
    ParamsAction, ParamsState, PersistedSlice, PersistedState, SettingsAction, StagingAction, Store, StoreConfig,
    Tab, UiAction,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fixture(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

fn legacy() -> PersistedState {
    PersistedState {
        params: Some(fixture(include_str!("fixtures/params_v0.json"))),
        canvas_settings: Some(fixture(include_str!("fixtures/canvas_settings_v0.json"))),
        canvas_staging_area: Some(fixture(include_str!("fixtures/staging_v1.json"))),
        canvas: Some(fixture(include_str!("fixtures/canvas_v0.json"))),
    }
}

// ─── Legacy migration ───────────────────────────────────────────────────

#[test]
fn legacy_blobs_share_one_canvas_id() {
    init_logging();
    let store = Store::rehydrate(StoreConfig::default(), legacy());
    let state = store.state();
    let id = state.canvas.active_canvas_id;

    assert!(!id.is_placeholder());
    assert_eq!(state.canvas.canvases.ids(), vec![id]);
    assert_eq!(state.params.canvases.ids(), vec![id]);
    assert_eq!(state.canvas_settings.canvases.ids(), vec![id]);
    assert_eq!(state.staging.sessions.ids(), vec![id]);

    let params = &state.params.canvases.get(id).unwrap().params;
    assert_eq!(params.steps, 42);
    assert_eq!(params.scheduler, Scheduler::Euler);
    assert_eq!((params.dimensions.width, params.dimensions.height), (1024, 768));
    assert!(params.positive_prompt_history.is_empty());
    assert_eq!(state.params.generate.steps, 42);
    assert_eq!(state.params.video.positive_prompt, "a lighthouse at dusk, volumetric fog");

    let settings = state.canvas_settings.canvases.get(id).unwrap();
    assert_eq!(settings.brush_width, 80);
    assert_eq!(settings.active_color, ActiveColor::Fg);
    assert!(!state.canvas_settings.shared.show_hud);

    let session = state.staging.sessions.get(id).unwrap();
    assert_eq!(session.canvas_session_id, "canvas_legacy_session");
    assert_eq!(session.canvas_discarded_queue_items.as_slice(), &[11, 12]);

    let canvas = state.canvas.active().unwrap();
    assert_eq!(canvas.state().bbox.model_base, BaseModel::Sdxl);
    assert_eq!(canvas.state().entities.len(), 1);
    assert_eq!(canvas.state().entities[0].objects.len(), 2);
    assert!(!canvas.history.can_undo());
}

#[test]
fn placeholder_is_renamed_once() {
    let mut store = Store::rehydrate(StoreConfig::default(), legacy());
    let id = store.state().canvas.active_canvas_id;
    let other = CanvasId::intern("canvas_second_migration");

    assert!(!store.dispatch(LifecycleAction::CanvasMultiCanvasMigrated { canvas_id: other }));
    assert_eq!(store.state().params.canvases.ids(), vec![id]);
    assert_eq!(store.state().canvas.canvases.ids(), vec![id]);
}

#[test]
fn stray_placeholders_adopt_the_active_canvas() {
    init_logging();
    let persisted = PersistedState {
        canvas: Some(fixture(include_str!("fixtures/canvas_v1.json"))),
        ..legacy()
    };
    let store = Store::rehydrate(StoreConfig::default(), persisted);
    let home = CanvasId::intern("canvas_home");

    assert_eq!(store.state().canvas.active_canvas_id, home);
    assert_eq!(store.state().params.canvases.get(home).unwrap().params.steps, 42);
    assert_eq!(store.state().canvas_settings.canvases.get(home).unwrap().brush_width, 80);
    assert!(!store.state().staging.sessions.contains(CanvasId::placeholder()));
}

#[test]
fn migrating_in_two_hops_matches_one() {
    let raw = fixture(include_str!("fixtures/params_v0.json"));
    let migrator = ParamsState::MIGRATOR;

    let v1 = migrator.migrate_to(raw.clone(), 1).unwrap();
    assert_eq!(v1["_version"], 1);
    assert_eq!(v1["dimensions"]["width"], 1024);
    assert!(v1["dimensions"].get("rect").is_none());

    assert_eq!(migrator.migrate(v1).unwrap(), migrator.migrate(raw).unwrap());
}

#[test]
fn current_blobs_are_untouched() {
    let blob = fixture(include_str!("fixtures/canvas_v1.json"));
    assert_eq!(CanvasesState::MIGRATOR.migrate(blob.clone()).unwrap(), blob);
}

// ─── Failure handling ───────────────────────────────────────────────────

#[test]
fn newer_versions_are_rejected() {
    let err = ParamsState::migrate(json!({ "_version": 4 })).unwrap_err();
    assert!(matches!(
        err,
        StateError::UnsupportedVersion {
            slice: "params",
            found: 4,
            supported: 3
        }
    ));
}

#[test]
fn invalid_values_fail_validation() {
    let mut blob = fixture(include_str!("fixtures/params_v0.json"));
    blob["steps"] = json!(0);
    let err = ParamsState::migrate(blob).unwrap_err();
    assert!(matches!(err, StateError::Validation { slice: "params", .. }));
}

#[test]
fn corrupt_slice_falls_back_alone() {
    init_logging();
    let persisted = PersistedState {
        params: Some(fixture(include_str!("fixtures/params_corrupt.json"))),
        ..legacy()
    };
    let store = Store::rehydrate(StoreConfig::default(), persisted);
    let state = store.state();
    let id = state.canvas.active_canvas_id;

    assert_eq!(state.params.generate, ParamsState::initial().generate);
    assert_eq!(state.params.canvases.get(id).unwrap().params.steps, 30);
    assert_eq!(state.canvas_settings.canvases.get(id).unwrap().brush_width, 80);
    assert_eq!(
        state.staging.sessions.get(id).unwrap().canvas_session_id,
        "canvas_legacy_session"
    );
}

#[test]
fn nothing_stored_starts_fresh() {
    let store = Store::rehydrate(StoreConfig::default(), PersistedState::default());
    let id = store.state().canvas.active_canvas_id;
    assert!(store.state().params.canvases.contains(id));
    assert!(store.state().canvas_settings.canvases.contains(id));
    assert!(store.state().staging.sessions.contains(id));
}

// ─── Round trip ─────────────────────────────────────────────────────────

#[test]
fn persisted_store_rehydrates_to_the_same_state() {
    init_logging();
    let mut store = Store::new(StoreConfig::default());
    store.dispatch(ParamsAction::SetSteps(18));
    store.dispatch(ParamsAction::PositivePromptChanged("harbour".into()));
    store.dispatch(UiAction::SetActiveTab(Tab::Canvas));
    store.dispatch(ParamsAction::SetCfgScale(3.5));
    store.dispatch(SettingsAction::BrushWidthChanged(24.0));
    store.dispatch(StagingAction::QueueItemDiscarded(7));
    store.dispatch(CanvasAction::raster_layer_added(Some("Paint".into())));

    let persisted = store.persist().unwrap();
    assert_eq!(persisted.canvas.as_ref().unwrap()["_version"], 1);
    let text = serde_json::to_string(&persisted).unwrap();
    let back: PersistedState = serde_json::from_str(&text).unwrap();
    let restored = Store::rehydrate(StoreConfig::default(), back);

    assert_eq!(restored.state().params, store.state().params);
    assert_eq!(restored.state().canvas_settings, store.state().canvas_settings);
    assert_eq!(restored.state().staging, store.state().staging);
    let (a, b) = (store.state().canvas.active().unwrap(), restored.state().canvas.active().unwrap());
    assert_eq!(a.id, b.id);
    assert_eq!(a.state(), b.state());
    assert!(!b.history.can_undo());
}

#[test]
fn each_slice_round_trips_on_its_own() {
    let store = Store::new(StoreConfig::default());
    let state = store.state();
    let settings = CanvasSettingsState::migrate(state.canvas_settings.to_persisted().unwrap()).unwrap();
    assert_eq!(settings, state.canvas_settings);
    let staging = CanvasStagingAreaState::migrate(state.staging.to_persisted().unwrap()).unwrap();
    assert_eq!(staging, state.staging);
}

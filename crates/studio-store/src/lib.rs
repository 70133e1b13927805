pub mod action;
pub mod canvas;
pub mod canvas_settings;
pub mod config;
pub mod history;
pub mod listeners;
pub mod middleware;
pub mod params;
pub mod partition;
pub mod persist;
pub mod selectors;
pub mod staging;
pub mod store;
pub mod ui;

pub use action::{Action, ActionContext, ActionKind, LifecycleAction, Tab};
pub use canvas::{CanvasAction, CanvasInstance, CanvasState, CanvasesState};
pub use canvas_settings::{CanvasSettingsState, SettingsAction};
pub use config::StoreConfig;
pub use history::{Clock, History, ManualClock, SystemClock, ThrottleFilter};
pub use listeners::{Applied, DefaultSettingsRequest, ModelDefaultSettings, apply_default_settings};
pub use params::{InstanceParams, ParamsAction, ParamsState};
pub use partition::{InstanceList, InstanceMap, InstanceTable, Keyed};
pub use persist::{PersistedSlice, PersistedState};
pub use staging::{CanvasStagingAreaState, QueueItem, QueueItemStatus, StagingAction};
pub use store::{RootState, Store};
pub use ui::{UiAction, UiState};

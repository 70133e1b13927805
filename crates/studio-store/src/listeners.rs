//! Follow-up work driven by async results.
//!
//! A listener captures the [`ActionContext`] when its request starts and
//! checks it again when the result arrives. If the user switched tab,
//! canvas or model in between, the result is dropped.

use crate::action::{Action, ActionContext, Tab};
use crate::canvas::CanvasAction;
use crate::params::ParamsAction;
use crate::selectors::{select_active_context, select_is_staging, select_params};
use crate::staging::QueueItem;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use studio_core::model::ModelIdentifier;

/// Below this a default dimension is ignored.
const MIN_DEFAULT_DIMENSION: u32 = 64;

/// A pending "apply the model's default settings" request.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultSettingsRequest {
    pub context: ActionContext,
    /// Key of the model whose defaults were fetched.
    pub model_key: String,
}

impl DefaultSettingsRequest {
    /// Capture a request against whatever is active now. `None` when no
    /// model is selected.
    pub fn capture(store: &Store) -> Option<Self> {
        let context = select_active_context(store.state());
        let model = select_params(store.state(), &context).ok()?.model.as_ref()?;
        Some(Self {
            context,
            model_key: model.key.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaeDefault {
    /// Use the VAE bundled with the main model.
    Default,
    Model(ModelIdentifier),
}

/// Default settings a model config ships with. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDefaultSettings {
    pub vae: Option<VaeDefault>,
    pub vae_precision: Option<String>,
    pub cfg_scale: Option<f64>,
    pub cfg_rescale_multiplier: Option<f64>,
    pub steps: Option<u32>,
    pub scheduler: Option<String>,
    pub guidance: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// Context or model changed since the request; nothing was written.
    Stale,
}

/// Write `defaults` into the instance the request was made from.
///
/// On the canvas tab the size goes to the bbox, unless the canvas is
/// staging results. On other params tabs it goes to the params size.
pub fn apply_default_settings(
    store: &mut Store,
    request: &DefaultSettingsRequest,
    defaults: &ModelDefaultSettings,
    queue_items: &[QueueItem],
) -> Applied {
    let current = select_active_context(store.state());
    let current_model = select_params(store.state(), &current)
        .ok()
        .and_then(|p| p.model.as_ref())
        .map(|m| m.key.as_str());
    if current != request.context || current_model != Some(request.model_key.as_str()) {
        log::debug!("dropping stale default settings for {}", request.model_key);
        return Applied::Stale;
    }

    let context = request.context;
    let mut dispatch = |action: ParamsAction| {
        store.dispatch(Action::targeted(action, context));
    };

    match &defaults.vae {
        Some(VaeDefault::Default) => dispatch(ParamsAction::VaeSelected(None)),
        Some(VaeDefault::Model(vae)) => dispatch(ParamsAction::VaeSelected(Some(vae.clone()))),
        None => {}
    }
    if let Some(precision) = &defaults.vae_precision {
        dispatch(ParamsAction::VaePrecisionChanged(precision.clone()));
    }
    if let Some(guidance) = defaults.guidance.filter(|g| *g > 0.0) {
        dispatch(ParamsAction::SetGuidance(guidance));
    }
    if let Some(cfg) = defaults.cfg_scale.filter(|c| *c >= 1.0) {
        dispatch(ParamsAction::SetCfgScale(cfg));
    }
    // An unset rescale multiplier means zero, not "leave as is".
    let rescale = defaults
        .cfg_rescale_multiplier
        .filter(|m| (0.0..1.0).contains(m))
        .unwrap_or(0.0);
    dispatch(ParamsAction::SetCfgRescaleMultiplier(rescale));
    if let Some(steps) = defaults.steps.filter(|s| *s > 0) {
        dispatch(ParamsAction::SetSteps(steps));
    }
    if let Some(scheduler) = &defaults.scheduler {
        dispatch(ParamsAction::SetScheduler(scheduler.clone()));
    }

    let width = defaults.width.filter(|w| *w >= MIN_DEFAULT_DIMENSION);
    let height = defaults.height.filter(|h| *h >= MIN_DEFAULT_DIMENSION);
    match context.tab {
        Tab::Canvas => {
            let Some(canvas_id) = context.canvas_id else {
                return Applied::Applied;
            };
            if select_is_staging(store.state(), canvas_id, queue_items) {
                log::debug!("canvas {canvas_id} is staging, keeping its bbox");
                return Applied::Applied;
            }
            let mut bbox = |action: CanvasAction| {
                store.dispatch(Action::targeted(action, context));
            };
            if let Some(width) = width {
                bbox(CanvasAction::BboxWidthChanged {
                    width,
                    update_aspect_ratio: true,
                    clamp: true,
                });
            }
            if let Some(height) = height {
                bbox(CanvasAction::BboxHeightChanged {
                    height,
                    update_aspect_ratio: true,
                    clamp: true,
                });
            }
        }
        _ => {
            if let Some(width) = width {
                dispatch(ParamsAction::WidthChanged {
                    width,
                    update_aspect_ratio: true,
                    clamp: true,
                });
            }
            if let Some(height) = height {
                dispatch(ParamsAction::HeightChanged {
                    height,
                    update_aspect_ratio: true,
                    clamp: true,
                });
            }
        }
    }
    log::info!("applied default settings of {}", request.model_key);
    Applied::Applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::staging::QueueItemStatus;
    use crate::ui::UiAction;
    use studio_core::model::{BaseModel, ModelType, Precision, Scheduler};

    fn sdxl() -> ModelIdentifier {
        ModelIdentifier::new("sdxl-base", "SDXL", BaseModel::Sdxl, ModelType::Main)
    }

    fn defaults() -> ModelDefaultSettings {
        ModelDefaultSettings {
            vae_precision: Some("fp16".into()),
            cfg_scale: Some(5.0),
            steps: Some(25),
            scheduler: Some("euler_a".into()),
            width: Some(1024),
            height: Some(768),
            ..Default::default()
        }
    }

    #[test]
    fn applies_to_the_requesting_tab() {
        let mut store = Store::new(StoreConfig::default());
        store.dispatch(ParamsAction::ModelChanged(Some(sdxl())));
        store.dispatch(ParamsAction::SetCfgRescaleMultiplier(0.5));
        let request = DefaultSettingsRequest::capture(&store).unwrap();

        assert_eq!(apply_default_settings(&mut store, &request, &defaults(), &[]), Applied::Applied);
        let params = &store.state().params.generate;
        assert_eq!(params.steps, 25);
        assert_eq!(params.cfg_scale, 5.0);
        assert_eq!(params.cfg_rescale_multiplier, 0.0);
        assert_eq!(params.scheduler, Scheduler::EulerA);
        assert_eq!(params.vae_precision, Precision::Fp16);
        assert_eq!((params.dimensions.width, params.dimensions.height), (1024, 768));
    }

    #[test]
    fn tab_switch_makes_the_result_stale() {
        let mut store = Store::new(StoreConfig::default());
        store.dispatch(ParamsAction::ModelChanged(Some(sdxl())));
        let request = DefaultSettingsRequest::capture(&store).unwrap();
        store.dispatch(UiAction::SetActiveTab(Tab::Upscaling));

        let before = store.state().params.clone();
        assert_eq!(apply_default_settings(&mut store, &request, &defaults(), &[]), Applied::Stale);
        assert_eq!(store.state().params, before);
    }

    #[test]
    fn staging_canvas_keeps_its_bbox() {
        let mut store = Store::new(StoreConfig::default());
        store.dispatch(UiAction::SetActiveTab(Tab::Canvas));
        store.dispatch(ParamsAction::ModelChanged(Some(sdxl())));
        let request = DefaultSettingsRequest::capture(&store).unwrap();

        let canvas_id = store.state().canvas.active_canvas_id;
        let session = store.state().staging.sessions.iter().next().unwrap().1.clone();
        assert_eq!(session.canvas_id, canvas_id);
        let items = [QueueItem {
            item_id: 1,
            status: QueueItemStatus::Completed,
            destination: session.canvas_session_id,
        }];
        let bbox_before = store.state().canvas.active().unwrap().state().bbox.rect;

        assert_eq!(apply_default_settings(&mut store, &request, &defaults(), &items), Applied::Applied);
        assert_eq!(store.state().canvas.active().unwrap().state().bbox.rect, bbox_before);
    }
}

//! Generation parameters, one instance per params tab and per canvas.
//!
//! Every `ParamsAction` is instance-scoped: the context stamped at dispatch
//! picks the instance (`generate`, `upscaling`, `video`, or the canvas), and
//! one reducer, [`reduce_instance`], runs against it.

use crate::action::{ActionContext, Tab};
use crate::config::StoreConfig;
use crate::partition::{self, InstanceMap, InstanceTable, Keyed};
use crate::persist::PersistedSlice;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use studio_core::migrate::{default_field, expect_object};
use studio_core::model::{
    BaseModel, CoherenceMode, InfillMethod, ModelIdentifier, ModelSlot, Precision, RgbaColor,
    Scheduler, check_optional_model,
};
use studio_core::sizing::{AspectRatioConfig, AspectRatioId, SizeEditor};
use studio_core::validate::{
    ValidationIssue, check_key_matches, check_positive, check_range, check_version, join_path,
};
use studio_core::{CanvasId, MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER, Migrator, StateResult, Validate};

pub const PARAMS_VERSION: u32 = 3;

// ─── State ────────────────────────────────────────────────────────────────

/// Output size plus the aspect ratio that constrains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeState {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: AspectRatioConfig,
}

impl Default for SizeState {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            aspect_ratio: AspectRatioConfig::default(),
        }
    }
}

impl SizeState {
    pub fn editor(&mut self, base: Option<BaseModel>) -> SizeEditor<'_> {
        SizeEditor {
            width: &mut self.width,
            height: &mut self.height,
            aspect_ratio: &mut self.aspect_ratio,
            base,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstanceParams {
    pub iterations: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub upscale_cfg_scale: f64,
    pub guidance: f64,
    pub cfg_rescale_multiplier: f64,
    pub scheduler: Scheduler,
    pub upscale_scheduler: Scheduler,
    pub seed: u64,
    pub should_randomize_seed: bool,
    pub img2img_strength: f64,
    pub optimized_denoising_enabled: bool,
    pub seamless_x_axis: bool,
    pub seamless_y_axis: bool,

    pub model: Option<ModelIdentifier>,
    pub vae: Option<ModelIdentifier>,
    #[serde(rename = "fluxVAE")]
    pub flux_vae: Option<ModelIdentifier>,
    pub t5_encoder_model: Option<ModelIdentifier>,
    pub clip_embed_model: Option<ModelIdentifier>,
    pub clip_l_embed_model: Option<ModelIdentifier>,
    pub clip_g_embed_model: Option<ModelIdentifier>,
    pub control_lora: Option<ModelIdentifier>,
    pub vae_precision: Precision,
    pub clip_skip: u32,
    pub should_use_cpu_noise: bool,

    pub positive_prompt: String,
    pub positive_prompt_history: Vec<String>,
    pub negative_prompt: Option<String>,

    pub refiner_model: Option<ModelIdentifier>,
    pub refiner_steps: u32,
    #[serde(rename = "refinerCFGScale")]
    pub refiner_cfg_scale: f64,
    pub refiner_scheduler: Scheduler,
    pub refiner_positive_aesthetic_score: f64,
    pub refiner_negative_aesthetic_score: f64,
    pub refiner_start: f64,

    pub infill_method: InfillMethod,
    pub infill_tile_size: u32,
    pub infill_patchmatch_downscale_size: u32,
    pub infill_color_value: RgbaColor,
    pub mask_blur: u32,
    pub canvas_coherence_mode: CoherenceMode,
    pub canvas_coherence_edge_size: u32,
    pub canvas_coherence_min_denoise: f64,

    pub dimensions: SizeState,
}

impl Default for InstanceParams {
    fn default() -> Self {
        Self {
            iterations: 1,
            steps: 30,
            cfg_scale: 7.5,
            upscale_cfg_scale: 2.0,
            guidance: 4.0,
            cfg_rescale_multiplier: 0.0,
            scheduler: Scheduler::Dpmpp3mK,
            upscale_scheduler: Scheduler::Kdpm2,
            seed: 0,
            should_randomize_seed: true,
            img2img_strength: 0.75,
            optimized_denoising_enabled: true,
            seamless_x_axis: false,
            seamless_y_axis: false,
            model: None,
            vae: None,
            flux_vae: None,
            t5_encoder_model: None,
            clip_embed_model: None,
            clip_l_embed_model: None,
            clip_g_embed_model: None,
            control_lora: None,
            vae_precision: Precision::Fp32,
            clip_skip: 0,
            should_use_cpu_noise: true,
            positive_prompt: String::new(),
            positive_prompt_history: Vec::new(),
            negative_prompt: None,
            refiner_model: None,
            refiner_steps: 20,
            refiner_cfg_scale: 7.5,
            refiner_scheduler: Scheduler::Euler,
            refiner_positive_aesthetic_score: 6.0,
            refiner_negative_aesthetic_score: 2.5,
            refiner_start: 0.8,
            infill_method: InfillMethod::Lama,
            infill_tile_size: 32,
            infill_patchmatch_downscale_size: 1,
            infill_color_value: RgbaColor::BLACK,
            mask_blur: 16,
            canvas_coherence_mode: CoherenceMode::GaussianBlur,
            canvas_coherence_edge_size: 16,
            canvas_coherence_min_denoise: 0.0,
            dimensions: SizeState::default(),
        }
    }
}

impl InstanceParams {
    pub fn base(&self) -> Option<BaseModel> {
        self.model.as_ref().map(|m| m.base)
    }

    /// Fresh defaults that keep the model selections and the size.
    fn reset_keeping_models(&self) -> Self {
        Self {
            dimensions: self.dimensions.clone(),
            model: self.model.clone(),
            vae: self.vae.clone(),
            flux_vae: self.flux_vae.clone(),
            vae_precision: self.vae_precision,
            t5_encoder_model: self.t5_encoder_model.clone(),
            clip_embed_model: self.clip_embed_model.clone(),
            refiner_model: self.refiner_model.clone(),
            ..Self::default()
        }
    }
}

/// Params owned by one canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasInstanceParams {
    pub canvas_id: CanvasId,
    #[serde(flatten)]
    pub params: InstanceParams,
}

impl CanvasInstanceParams {
    pub fn new(canvas_id: CanvasId) -> Self {
        Self {
            canvas_id,
            params: InstanceParams::default(),
        }
    }
}

impl Keyed for CanvasInstanceParams {
    fn key(&self) -> CanvasId {
        self.canvas_id
    }

    fn set_key(&mut self, id: CanvasId) {
        self.canvas_id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsState {
    #[serde(rename = "_version")]
    pub version: u32,
    pub generate: Arc<InstanceParams>,
    pub upscaling: Arc<InstanceParams>,
    pub video: Arc<InstanceParams>,
    pub canvases: InstanceMap<CanvasInstanceParams>,
}

impl ParamsState {
    /// The instance an action dispatched from `context` edits. Tabs without
    /// a params panel have none.
    pub fn instance(&self, context: &ActionContext) -> Option<&InstanceParams> {
        match context.tab {
            Tab::Generate => Some(&self.generate),
            Tab::Upscaling => Some(&self.upscaling),
            Tab::Video => Some(&self.video),
            Tab::Canvas => context
                .canvas_id
                .and_then(|id| self.canvases.get(id))
                .map(|c| &c.params),
            Tab::Workflows | Tab::Models | Tab::Queue => None,
        }
    }

    /// Run `f` against the instance `context` addresses. Returns `false`
    /// when there is no such instance.
    pub fn with_instance(&mut self, context: &ActionContext, f: impl FnOnce(&mut InstanceParams)) -> bool {
        match context.tab {
            Tab::Generate => f(Arc::make_mut(&mut self.generate)),
            Tab::Upscaling => f(Arc::make_mut(&mut self.upscaling)),
            Tab::Video => f(Arc::make_mut(&mut self.video)),
            Tab::Canvas => {
                let Some(id) = context.canvas_id else {
                    log::debug!("canvas params action without a canvas id");
                    return false;
                };
                return partition::apply(&mut self.canvases, id, |c| f(&mut c.params));
            }
            Tab::Workflows | Tab::Models | Tab::Queue => {
                log::debug!("{:?} tab has no params instance", context.tab);
                return false;
            }
        }
        true
    }
}

// ─── Actions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ParamsAction {
    SetIterations(u32),
    SetSteps(u32),
    SetCfgScale(f64),
    SetUpscaleCfgScale(f64),
    SetGuidance(f64),
    SetCfgRescaleMultiplier(f64),
    /// Scheduler name as received; unknown names are ignored.
    SetScheduler(String),
    SetUpscaleScheduler(String),
    /// Also turns seed randomisation off.
    SetSeed(u64),
    SetShouldRandomizeSeed(bool),
    SetImg2imgStrength(f64),
    SetOptimizedDenoisingEnabled(bool),
    SetSeamlessXAxis(bool),
    SetSeamlessYAxis(bool),
    ShouldUseCpuNoiseChanged(bool),
    SetClipSkip(u32),
    VaePrecisionChanged(String),

    ModelChanged(Option<ModelIdentifier>),
    VaeSelected(Option<ModelIdentifier>),
    FluxVaeSelected(Option<ModelIdentifier>),
    T5EncoderModelSelected(Option<ModelIdentifier>),
    ClipEmbedModelSelected(Option<ModelIdentifier>),
    ClipLEmbedModelSelected(Option<ModelIdentifier>),
    ClipGEmbedModelSelected(Option<ModelIdentifier>),
    ControlLoraModelSelected(Option<ModelIdentifier>),

    PositivePromptChanged(String),
    PositivePromptAddedToHistory(String),
    PromptRemovedFromHistory(String),
    PromptHistoryCleared,
    NegativePromptChanged(Option<String>),

    RefinerModelChanged(Option<ModelIdentifier>),
    SetRefinerSteps(u32),
    SetRefinerCfgScale(f64),
    SetRefinerScheduler(String),
    SetRefinerPositiveAestheticScore(f64),
    SetRefinerNegativeAestheticScore(f64),
    SetRefinerStart(f64),

    SetInfillMethod(InfillMethod),
    SetInfillTileSize(u32),
    SetInfillPatchmatchDownscaleSize(u32),
    SetInfillColorValue(RgbaColor),
    SetMaskBlur(u32),
    SetCanvasCoherenceMode(CoherenceMode),
    SetCanvasCoherenceEdgeSize(u32),
    SetCanvasCoherenceMinDenoise(f64),

    SizeRecalled { width: u32, height: u32 },
    WidthChanged { width: u32, update_aspect_ratio: bool, clamp: bool },
    HeightChanged { height: u32, update_aspect_ratio: bool, clamp: bool },
    AspectRatioLockToggled,
    AspectRatioIdChanged(AspectRatioId),
    DimensionsSwapped,
    SizeOptimized,
    SyncedToOptimalDimension,

    ParamsReset,
}

impl ParamsAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::SetIterations(_) => "params/setIterations",
            Self::SetSteps(_) => "params/setSteps",
            Self::SetCfgScale(_) => "params/setCfgScale",
            Self::SetUpscaleCfgScale(_) => "params/setUpscaleCfgScale",
            Self::SetGuidance(_) => "params/setGuidance",
            Self::SetCfgRescaleMultiplier(_) => "params/setCfgRescaleMultiplier",
            Self::SetScheduler(_) => "params/setScheduler",
            Self::SetUpscaleScheduler(_) => "params/setUpscaleScheduler",
            Self::SetSeed(_) => "params/setSeed",
            Self::SetShouldRandomizeSeed(_) => "params/setShouldRandomizeSeed",
            Self::SetImg2imgStrength(_) => "params/setImg2imgStrength",
            Self::SetOptimizedDenoisingEnabled(_) => "params/setOptimizedDenoisingEnabled",
            Self::SetSeamlessXAxis(_) => "params/setSeamlessXAxis",
            Self::SetSeamlessYAxis(_) => "params/setSeamlessYAxis",
            Self::ShouldUseCpuNoiseChanged(_) => "params/shouldUseCpuNoiseChanged",
            Self::SetClipSkip(_) => "params/setClipSkip",
            Self::VaePrecisionChanged(_) => "params/vaePrecisionChanged",
            Self::ModelChanged(_) => "params/modelChanged",
            Self::VaeSelected(_) => "params/vaeSelected",
            Self::FluxVaeSelected(_) => "params/fluxVAESelected",
            Self::T5EncoderModelSelected(_) => "params/t5EncoderModelSelected",
            Self::ClipEmbedModelSelected(_) => "params/clipEmbedModelSelected",
            Self::ClipLEmbedModelSelected(_) => "params/clipLEmbedModelSelected",
            Self::ClipGEmbedModelSelected(_) => "params/clipGEmbedModelSelected",
            Self::ControlLoraModelSelected(_) => "params/controlLoRAModelSelected",
            Self::PositivePromptChanged(_) => "params/positivePromptChanged",
            Self::PositivePromptAddedToHistory(_) => "params/positivePromptAddedToHistory",
            Self::PromptRemovedFromHistory(_) => "params/promptRemovedFromHistory",
            Self::PromptHistoryCleared => "params/promptHistoryCleared",
            Self::NegativePromptChanged(_) => "params/negativePromptChanged",
            Self::RefinerModelChanged(_) => "params/refinerModelChanged",
            Self::SetRefinerSteps(_) => "params/setRefinerSteps",
            Self::SetRefinerCfgScale(_) => "params/setRefinerCFGScale",
            Self::SetRefinerScheduler(_) => "params/setRefinerScheduler",
            Self::SetRefinerPositiveAestheticScore(_) => "params/setRefinerPositiveAestheticScore",
            Self::SetRefinerNegativeAestheticScore(_) => "params/setRefinerNegativeAestheticScore",
            Self::SetRefinerStart(_) => "params/setRefinerStart",
            Self::SetInfillMethod(_) => "params/setInfillMethod",
            Self::SetInfillTileSize(_) => "params/setInfillTileSize",
            Self::SetInfillPatchmatchDownscaleSize(_) => "params/setInfillPatchmatchDownscaleSize",
            Self::SetInfillColorValue(_) => "params/setInfillColorValue",
            Self::SetMaskBlur(_) => "params/setMaskBlur",
            Self::SetCanvasCoherenceMode(_) => "params/setCanvasCoherenceMode",
            Self::SetCanvasCoherenceEdgeSize(_) => "params/setCanvasCoherenceEdgeSize",
            Self::SetCanvasCoherenceMinDenoise(_) => "params/setCanvasCoherenceMinDenoise",
            Self::SizeRecalled { .. } => "params/sizeRecalled",
            Self::WidthChanged { .. } => "params/widthChanged",
            Self::HeightChanged { .. } => "params/heightChanged",
            Self::AspectRatioLockToggled => "params/aspectRatioLockToggled",
            Self::AspectRatioIdChanged(_) => "params/aspectRatioIdChanged",
            Self::DimensionsSwapped => "params/dimensionsSwapped",
            Self::SizeOptimized => "params/sizeOptimized",
            Self::SyncedToOptimalDimension => "params/syncedToOptimalDimension",
            Self::ParamsReset => "params/paramsReset",
        }
    }
}

// ─── Reducer ──────────────────────────────────────────────────────────────

/// Assign `value` to `field` if it fits `slot`; otherwise keep the old value.
fn select_model(field: &mut Option<ModelIdentifier>, value: &Option<ModelIdentifier>, slot: ModelSlot) {
    match check_optional_model(value.as_ref(), slot) {
        Ok(()) => *field = value.clone(),
        Err(err) => log::debug!("ignoring model selection: {err}"),
    }
}

fn parse_scheduler(field: &mut Scheduler, name: &str) {
    match name.parse() {
        Ok(s) => *field = s,
        Err(err) => log::debug!("ignoring scheduler: {err}"),
    }
}

fn apply_clip_skip(params: &mut InstanceParams, clip_skip: u32) {
    let Some(base) = params.base() else {
        return;
    };
    params.clip_skip = clip_skip.min(base.max_clip_skip());
}

/// The one reducer every params instance shares.
pub fn reduce_instance(params: &mut InstanceParams, action: &ParamsAction, config: &StoreConfig) {
    use ParamsAction as A;

    let base = params.base();
    match action {
        A::SetIterations(v) => params.iterations = *v,
        A::SetSteps(v) => params.steps = *v,
        A::SetCfgScale(v) => params.cfg_scale = *v,
        A::SetUpscaleCfgScale(v) => params.upscale_cfg_scale = *v,
        A::SetGuidance(v) => params.guidance = *v,
        A::SetCfgRescaleMultiplier(v) => params.cfg_rescale_multiplier = *v,
        A::SetScheduler(name) => parse_scheduler(&mut params.scheduler, name),
        A::SetUpscaleScheduler(name) => parse_scheduler(&mut params.upscale_scheduler, name),
        A::SetSeed(v) => {
            params.seed = *v;
            params.should_randomize_seed = false;
        }
        A::SetShouldRandomizeSeed(v) => params.should_randomize_seed = *v,
        A::SetImg2imgStrength(v) => params.img2img_strength = *v,
        A::SetOptimizedDenoisingEnabled(v) => params.optimized_denoising_enabled = *v,
        A::SetSeamlessXAxis(v) => params.seamless_x_axis = *v,
        A::SetSeamlessYAxis(v) => params.seamless_y_axis = *v,
        A::ShouldUseCpuNoiseChanged(v) => params.should_use_cpu_noise = *v,
        A::SetClipSkip(v) => apply_clip_skip(params, *v),
        A::VaePrecisionChanged(name) => match name.parse() {
            Ok(p) => params.vae_precision = p,
            Err(err) => log::debug!("ignoring precision: {err}"),
        },

        A::ModelChanged(model) => {
            if let Err(err) = check_optional_model(model.as_ref(), ModelSlot::Main) {
                log::debug!("ignoring model change: {err}");
                return;
            }
            params.model = model.clone();
            let Some(next) = model.as_ref().map(|m| m.base) else {
                return;
            };
            if base == Some(next) {
                return;
            }
            params.dimensions.editor(base).model_base_changed(base, next);
            apply_clip_skip(params, params.clip_skip);
        }
        A::VaeSelected(m) => select_model(&mut params.vae, m, ModelSlot::Vae),
        A::FluxVaeSelected(m) => select_model(&mut params.flux_vae, m, ModelSlot::FluxVae),
        A::T5EncoderModelSelected(m) => select_model(&mut params.t5_encoder_model, m, ModelSlot::T5Encoder),
        A::ClipEmbedModelSelected(m) => select_model(&mut params.clip_embed_model, m, ModelSlot::ClipEmbed),
        A::ClipLEmbedModelSelected(m) => select_model(&mut params.clip_l_embed_model, m, ModelSlot::ClipLEmbed),
        A::ClipGEmbedModelSelected(m) => select_model(&mut params.clip_g_embed_model, m, ModelSlot::ClipGEmbed),
        A::ControlLoraModelSelected(m) => select_model(&mut params.control_lora, m, ModelSlot::ControlLora),

        A::PositivePromptChanged(p) => params.positive_prompt = p.clone(),
        A::PositivePromptAddedToHistory(p) => {
            let prompt = p.trim();
            if prompt.is_empty() {
                return;
            }
            let history = &mut params.positive_prompt_history;
            history.retain(|h| h != prompt);
            history.insert(0, prompt.to_string());
            history.truncate(config.max_prompt_history);
        }
        A::PromptRemovedFromHistory(p) => params.positive_prompt_history.retain(|h| h != p),
        A::PromptHistoryCleared => params.positive_prompt_history.clear(),
        A::NegativePromptChanged(p) => params.negative_prompt = p.clone(),

        A::RefinerModelChanged(m) => select_model(&mut params.refiner_model, m, ModelSlot::Refiner),
        A::SetRefinerSteps(v) => params.refiner_steps = *v,
        A::SetRefinerCfgScale(v) => params.refiner_cfg_scale = *v,
        A::SetRefinerScheduler(name) => parse_scheduler(&mut params.refiner_scheduler, name),
        A::SetRefinerPositiveAestheticScore(v) => params.refiner_positive_aesthetic_score = *v,
        A::SetRefinerNegativeAestheticScore(v) => params.refiner_negative_aesthetic_score = *v,
        A::SetRefinerStart(v) => params.refiner_start = *v,

        A::SetInfillMethod(v) => params.infill_method = *v,
        A::SetInfillTileSize(v) => params.infill_tile_size = *v,
        A::SetInfillPatchmatchDownscaleSize(v) => params.infill_patchmatch_downscale_size = *v,
        A::SetInfillColorValue(v) => params.infill_color_value = *v,
        A::SetMaskBlur(v) => params.mask_blur = *v,
        A::SetCanvasCoherenceMode(v) => params.canvas_coherence_mode = *v,
        A::SetCanvasCoherenceEdgeSize(v) => params.canvas_coherence_edge_size = *v,
        A::SetCanvasCoherenceMinDenoise(v) => params.canvas_coherence_min_denoise = *v,

        A::SizeRecalled { width, height } => params.dimensions.editor(base).size_recalled(*width, *height),
        A::WidthChanged {
            width,
            update_aspect_ratio,
            clamp,
        } => params.dimensions.editor(base).width_changed(*width, *update_aspect_ratio, *clamp),
        A::HeightChanged {
            height,
            update_aspect_ratio,
            clamp,
        } => params.dimensions.editor(base).height_changed(*height, *update_aspect_ratio, *clamp),
        A::AspectRatioLockToggled => params.dimensions.editor(base).lock_toggled(),
        A::AspectRatioIdChanged(id) => params.dimensions.editor(base).id_changed(*id),
        A::DimensionsSwapped => params.dimensions.editor(base).swapped(),
        A::SizeOptimized => params.dimensions.editor(base).size_optimized(),
        A::SyncedToOptimalDimension => {
            params.dimensions.editor(base).synced_to_optimal();
        }

        A::ParamsReset => *params = params.reset_keeping_models(),
    }
}

// ─── Lifecycle ────────────────────────────────────────────────────────────

impl ParamsState {
    pub fn canvas_added(&mut self, canvas_id: CanvasId) {
        self.canvases.insert(CanvasInstanceParams::new(canvas_id));
    }

    pub fn canvas_deleted(&mut self, canvas_id: CanvasId) {
        self.canvases.remove(canvas_id);
    }

    pub fn canvas_initialized(&mut self, canvas_id: CanvasId) {
        if !self.canvases.contains(canvas_id) {
            self.canvases.insert(CanvasInstanceParams::new(canvas_id));
        }
    }

    pub fn canvas_multi_canvas_migrated(&mut self, canvas_id: CanvasId) -> bool {
        self.canvases.rekey(CanvasId::placeholder(), canvas_id)
    }
}

// ─── Persistence ──────────────────────────────────────────────────────────

/// v0 stored the size as `dimensions.rect`.
fn lift_dimensions_rect(mut raw: Value) -> StateResult<Value> {
    let obj = expect_object(ParamsState::NAME, 0, &mut raw)?;
    if let Some(dims) = obj.get_mut("dimensions").and_then(Value::as_object_mut) {
        if let Some(rect) = dims.get("rect").and_then(Value::as_object).cloned() {
            for key in ["width", "height"] {
                if let Some(v) = rect.get(key) {
                    dims.insert(key.to_string(), v.clone());
                }
            }
            dims.remove("rect");
        }
    }
    Ok(raw)
}

fn add_prompt_history(mut raw: Value) -> StateResult<Value> {
    let obj = expect_object(ParamsState::NAME, 1, &mut raw)?;
    default_field(obj, "positivePromptHistory", json!([]));
    Ok(raw)
}

/// v2 was one shared set of params; fan it out to every tab and park the
/// canvas copy under the placeholder id.
fn split_into_instances(mut raw: Value) -> StateResult<Value> {
    let obj = expect_object(ParamsState::NAME, 2, &mut raw)?;
    let mut shared: Map<String, Value> = std::mem::take(obj);
    shared.remove(studio_core::VERSION_KEY);

    let mut canvas = shared.clone();
    canvas.insert("canvasId".into(), json!(MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER));

    Ok(json!({
        "generate": shared.clone(),
        "upscaling": shared.clone(),
        "video": shared,
        "canvases": { MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER: canvas },
    }))
}

impl PersistedSlice for ParamsState {
    const NAME: &'static str = "params";
    const MIGRATOR: Migrator = Migrator {
        slice: "params",
        untagged_version: 0,
        steps: &[lift_dimensions_rect, add_prompt_history, split_into_instances],
    };

    fn initial() -> Self {
        Self {
            version: PARAMS_VERSION,
            generate: Arc::default(),
            upscaling: Arc::default(),
            video: Arc::default(),
            canvases: InstanceMap::default(),
        }
    }
}

impl Validate for InstanceParams {
    fn collect_issues(&self, path: &str, issues: &mut Vec<ValidationIssue>) {
        check_positive(path, "iterations", f64::from(self.iterations), issues);
        check_positive(path, "steps", f64::from(self.steps), issues);
        check_positive(path, "cfgScale", self.cfg_scale, issues);
        check_range(path, "img2imgStrength", self.img2img_strength, 0.0, 1.0, issues);
        check_range(path, "refinerStart", self.refiner_start, 0.0, 1.0, issues);
        let dims = join_path(path, "dimensions");
        check_positive(&dims, "width", f64::from(self.dimensions.width), issues);
        check_positive(&dims, "height", f64::from(self.dimensions.height), issues);
        check_positive(
            &join_path(&dims, "aspectRatio"),
            "value",
            self.dimensions.aspect_ratio.value,
            issues,
        );
    }
}

impl Validate for ParamsState {
    fn collect_issues(&self, path: &str, issues: &mut Vec<ValidationIssue>) {
        check_version(self.version, PARAMS_VERSION, issues);
        self.generate.collect_issues(&join_path(path, "generate"), issues);
        self.upscaling.collect_issues(&join_path(path, "upscaling"), issues);
        self.video.collect_issues(&join_path(path, "video"), issues);
        for (key, canvas) in self.canvases.iter() {
            let p = join_path(&join_path(path, "canvases"), key.as_str());
            check_key_matches(&p, key.as_str(), canvas.canvas_id.as_str(), issues);
            canvas.params.collect_issues(&p, issues);
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use studio_core::model::ModelType;

    fn reduce(params: &mut InstanceParams, action: ParamsAction) {
        reduce_instance(params, &action, &StoreConfig::default());
    }

    #[test]
    fn unlocked_width_change_from_initial_state() {
        let mut p = InstanceParams::default();
        assert_eq!((p.dimensions.width, p.dimensions.height), (512, 512));
        reduce(
            &mut p,
            ParamsAction::WidthChanged {
                width: 768,
                update_aspect_ratio: true,
                clamp: false,
            },
        );
        assert_eq!((p.dimensions.width, p.dimensions.height), (768, 512));
        assert_eq!(p.dimensions.aspect_ratio.value, 1.5);
        assert_eq!(p.dimensions.aspect_ratio.id, AspectRatioId::Free);
    }

    #[test]
    fn prompt_history_is_trimmed_deduped_and_capped() {
        let mut p = InstanceParams::default();
        let config = StoreConfig {
            max_prompt_history: 3,
            ..StoreConfig::default()
        };
        for prompt in ["  a cat ", "a dog", "", "a cat", "a fox", "a owl"] {
            reduce_instance(&mut p, &ParamsAction::PositivePromptAddedToHistory(prompt.into()), &config);
        }
        assert_eq!(p.positive_prompt_history, vec!["a owl", "a fox", "a cat"]);

        reduce(&mut p, ParamsAction::PromptRemovedFromHistory("a fox".into()));
        assert_eq!(p.positive_prompt_history, vec!["a owl", "a cat"]);
    }

    #[test]
    fn invalid_external_values_are_skipped() {
        let mut p = InstanceParams::default();
        reduce(&mut p, ParamsAction::SetScheduler("warp".into()));
        assert_eq!(p.scheduler, Scheduler::Dpmpp3mK);
        reduce(&mut p, ParamsAction::SetScheduler("euler_a".into()));
        assert_eq!(p.scheduler, Scheduler::EulerA);

        let vae = ModelIdentifier::new("vae-1", "VAE", BaseModel::Sdxl, ModelType::Main);
        reduce(&mut p, ParamsAction::VaeSelected(Some(vae)));
        assert_eq!(p.vae, None);

        reduce(&mut p, ParamsAction::VaePrecisionChanged("fp8".into()));
        assert_eq!(p.vae_precision, Precision::Fp32);
    }

    #[test]
    fn model_change_to_api_base_locks_square() {
        let mut p = InstanceParams::default();
        p.clip_skip = 10;
        let sd1 = ModelIdentifier::new("sd1", "SD 1.5", BaseModel::Sd1, ModelType::Main);
        reduce(&mut p, ParamsAction::ModelChanged(Some(sd1)));
        assert_eq!(p.clip_skip, 10);

        let imagen = ModelIdentifier::new("img4", "Imagen 4", BaseModel::Imagen4, ModelType::Main);
        reduce(&mut p, ParamsAction::ModelChanged(Some(imagen)));
        assert_eq!((p.dimensions.width, p.dimensions.height), (1024, 1024));
        assert!(p.dimensions.aspect_ratio.is_locked);
        assert_eq!(p.clip_skip, 0);
    }

    #[test]
    fn set_seed_stops_randomising() {
        let mut p = InstanceParams::default();
        reduce(&mut p, ParamsAction::SetSeed(42));
        assert_eq!(p.seed, 42);
        assert!(!p.should_randomize_seed);
    }

    #[test]
    fn reset_keeps_models_and_size() {
        let mut p = InstanceParams::default();
        let sdxl = ModelIdentifier::new("sdxl", "SDXL", BaseModel::Sdxl, ModelType::Main);
        reduce(&mut p, ParamsAction::ModelChanged(Some(sdxl.clone())));
        reduce(&mut p, ParamsAction::SetSteps(50));
        reduce(&mut p, ParamsAction::SizeOptimized);
        reduce(&mut p, ParamsAction::ParamsReset);
        assert_eq!(p.steps, 30);
        assert_eq!(p.model, Some(sdxl));
        assert_eq!((p.dimensions.width, p.dimensions.height), (1024, 1024));
    }

    #[test]
    fn video_tab_writes_video_instance() {
        let mut state = ParamsState::initial();
        state.with_instance(&ActionContext::tab(Tab::Video), |p| p.steps = 12);
        assert_eq!(state.video.steps, 12);
        assert_eq!(state.upscaling.steps, 30);
        assert!(!state.with_instance(&ActionContext::tab(Tab::Queue), |p| p.steps = 1));
    }
}

//! Canvas documents: bounding box and layers, one undoable document per
//! canvas.
//!
//! Each [`CanvasInstance`] wraps its [`CanvasState`] in a [`History`]. Only
//! the present state is persisted; undo steps live for the session.

use crate::history::History;
use crate::partition::{self, InstanceMap, InstanceTable, Keyed};
use crate::persist::PersistedSlice;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};
use std::time::Duration;
use studio_core::migrate::expect_object;
use studio_core::model::{BaseModel, ModelIdentifier, RgbaColor};
use studio_core::sizing::{
    self, AspectRatioConfig, AspectRatioId, Dimensions, SizeEditor, calculate_new_size, grid_size,
    optimal_dimension, snap_to_grid,
};
use studio_core::validate::{ValidationIssue, check_key_matches, check_range, check_version, join_path};
use studio_core::{CanvasId, MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER, Migrator, StateResult, Validate, prefixed_id};

pub const CANVAS_VERSION: u32 = 1;

const DEFAULT_HISTORY_LIMIT: usize = 64;
const DEFAULT_THROTTLE: Duration = Duration::from_millis(1000);

// ─── Geometry ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

// ─── Bounding box ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMethod {
    None,
    Auto,
    Manual,
}

/// The region of the canvas that gets generated into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bbox {
    pub rect: Rect,
    pub aspect_ratio: AspectRatioConfig,
    /// Resolution the model actually renders at.
    pub scaled_size: Dimensions,
    pub scale_method: ScaleMethod,
    pub model_base: BaseModel,
}

impl Default for Bbox {
    fn default() -> Self {
        Self {
            rect: Rect {
                x: 0,
                y: 0,
                width: 512,
                height: 512,
            },
            aspect_ratio: AspectRatioConfig::default(),
            scaled_size: Dimensions::new(512, 512),
            scale_method: ScaleMethod::Auto,
            model_base: BaseModel::Sd1,
        }
    }
}

impl Bbox {
    pub fn editor(&mut self) -> SizeEditor<'_> {
        SizeEditor {
            width: &mut self.rect.width,
            height: &mut self.rect.height,
            aspect_ratio: &mut self.aspect_ratio,
            base: Some(self.model_base),
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.rect.width, self.rect.height)
    }

    /// Re-derive `scaled_size` from the rect. Hosted models render at the
    /// rect size and are left alone.
    pub fn sync_scaled_size(&mut self) {
        let base = Some(self.model_base);
        if self.model_base.is_api() {
            return;
        }
        match self.scale_method {
            ScaleMethod::Auto => {
                self.scaled_size = sizing::scaled_bbox_dimensions(self.dimensions(), base);
            }
            ScaleMethod::Manual if self.aspect_ratio.is_locked => {
                self.scaled_size =
                    calculate_new_size(self.aspect_ratio.value, self.scaled_size.area(), base);
            }
            ScaleMethod::Manual | ScaleMethod::None => {}
        }
    }

    fn scaled_width_changed(&mut self, width: u32) {
        let grid = grid_size(Some(self.model_base));
        self.scaled_size.width = snap_to_grid(f64::from(width), grid);
        if self.aspect_ratio.is_locked {
            self.scaled_size.height =
                snap_to_grid(f64::from(self.scaled_size.width) / self.aspect_ratio.value, grid);
        }
    }

    fn scaled_height_changed(&mut self, height: u32) {
        let grid = grid_size(Some(self.model_base));
        self.scaled_size.height = snap_to_grid(f64::from(height), grid);
        if self.aspect_ratio.is_locked {
            self.scaled_size.width =
                snap_to_grid(f64::from(self.scaled_size.height) * self.aspect_ratio.value, grid);
        }
    }

    /// The user dragged the bbox on the canvas. A resize to a new shape
    /// frees the aspect ratio.
    fn changed_from_canvas(&mut self, rect: Rect) {
        let old = self.rect;
        self.rect = rect;
        if rect.width == old.width && rect.height == old.height {
            return;
        }
        let ratio = self.dimensions().ratio();
        if ratio != self.aspect_ratio.value {
            self.aspect_ratio.value = ratio;
            self.aspect_ratio.id = AspectRatioId::Free;
        }
        self.sync_scaled_size();
    }

    /// Follow a main-model change. Hosted models force a 1024² square.
    pub fn model_changed(&mut self, model: Option<&ModelIdentifier>) {
        let Some(base) = model.map(|m| m.base) else {
            return;
        };
        if !base.is_main() || self.model_base == base {
            return;
        }
        let previous = self.model_base;
        self.model_base = base;
        self.editor().model_base_changed(Some(previous), base);
        self.sync_scaled_size();
    }
}

// ─── Layers ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrushLine {
    pub id: String,
    pub stroke_width: f64,
    /// Flat `[x0, y0, x1, y1, ...]`.
    pub points: Vec<f64>,
    pub color: RgbaColor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EraserLine {
    pub id: String,
    pub stroke_width: f64,
    pub points: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectShape {
    pub id: String,
    pub rect: Rect,
    pub color: RgbaColor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasObject {
    BrushLine(BrushLine),
    EraserLine(EraserLine),
    Rect(RectShape),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: String,
    pub name: Option<String>,
    pub is_enabled: bool,
    pub is_locked: bool,
    pub opacity: f64,
    pub position: Point,
    pub objects: Vec<CanvasObject>,
}

impl Layer {
    pub fn new(id: String, name: Option<String>) -> Self {
        Self {
            id,
            name,
            is_enabled: true,
            is_locked: false,
            opacity: 1.0,
            position: Point::default(),
            objects: Vec::new(),
        }
    }
}

// ─── Document ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasState {
    pub bbox: Bbox,
    /// Bottom to top.
    pub entities: Vec<Layer>,
    pub selected_entity_id: Option<String>,
}

impl CanvasState {
    fn entity_mut(&mut self, id: &str) -> Option<&mut Layer> {
        self.entities.iter_mut().find(|l| l.id == id)
    }

    fn entity_index(&self, id: &str) -> Option<usize> {
        self.entities.iter().position(|l| l.id == id)
    }

    /// Fresh document that keeps the model base, sized to its optimal area.
    fn reset(&self) -> Self {
        let mut next = Self::default();
        next.bbox.model_base = self.bbox.model_base;
        let optimal = f64::from(optimal_dimension(Some(next.bbox.model_base)));
        let dims = calculate_new_size(next.bbox.aspect_ratio.value, optimal * optimal, Some(next.bbox.model_base));
        next.bbox.rect.width = dims.width;
        next.bbox.rect.height = dims.height;
        next.bbox.sync_scaled_size();
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrange {
    ForwardOne,
    BackwardOne,
    ToFront,
    ToBack,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasAction {
    BboxChangedFromCanvas(Rect),
    BboxWidthChanged { width: u32, update_aspect_ratio: bool, clamp: bool },
    BboxHeightChanged { height: u32, update_aspect_ratio: bool, clamp: bool },
    BboxAspectRatioLockToggled,
    BboxAspectRatioIdChanged(AspectRatioId),
    BboxDimensionsSwapped,
    BboxSizeOptimized,
    BboxSyncedToOptimalDimension,
    BboxScaledWidthChanged(u32),
    BboxScaledHeightChanged(u32),
    BboxScaleMethodChanged(ScaleMethod),

    RasterLayerAdded { id: String, name: Option<String> },
    EntitySelected(Option<String>),
    EntityNameChanged { id: String, name: Option<String> },
    EntityIsEnabledToggled(String),
    EntityIsLockedToggled(String),
    EntityOpacityChanged { id: String, opacity: f64 },
    EntityMovedTo { id: String, position: Point },
    EntityMovedBy { id: String, dx: f64, dy: f64 },
    EntityBrushLineAdded { id: String, line: BrushLine },
    EntityEraserLineAdded { id: String, line: EraserLine },
    EntityRectAdded { id: String, rect: RectShape },
    EntityArranged { id: String, arrange: Arrange },
    EntityDeleted(String),
    AllEntitiesDeleted,
    CanvasReset,

    CanvasUndo,
    CanvasRedo,
    CanvasClearHistory,
}

impl CanvasAction {
    /// A new raster layer with a generated id.
    pub fn raster_layer_added(name: Option<String>) -> Self {
        Self::RasterLayerAdded {
            id: prefixed_id("raster_layer"),
            name,
        }
    }

    pub fn action_type(&self) -> &'static str {
        match self {
            Self::BboxChangedFromCanvas(_) => "canvas/bboxChangedFromCanvas",
            Self::BboxWidthChanged { .. } => "canvas/bboxWidthChanged",
            Self::BboxHeightChanged { .. } => "canvas/bboxHeightChanged",
            Self::BboxAspectRatioLockToggled => "canvas/bboxAspectRatioLockToggled",
            Self::BboxAspectRatioIdChanged(_) => "canvas/bboxAspectRatioIdChanged",
            Self::BboxDimensionsSwapped => "canvas/bboxDimensionsSwapped",
            Self::BboxSizeOptimized => "canvas/bboxSizeOptimized",
            Self::BboxSyncedToOptimalDimension => "canvas/bboxSyncedToOptimalDimension",
            Self::BboxScaledWidthChanged(_) => "canvas/bboxScaledWidthChanged",
            Self::BboxScaledHeightChanged(_) => "canvas/bboxScaledHeightChanged",
            Self::BboxScaleMethodChanged(_) => "canvas/bboxScaleMethodChanged",
            Self::RasterLayerAdded { .. } => "canvas/rasterLayerAdded",
            Self::EntitySelected(_) => "canvas/entitySelected",
            Self::EntityNameChanged { .. } => "canvas/entityNameChanged",
            Self::EntityIsEnabledToggled(_) => "canvas/entityIsEnabledToggled",
            Self::EntityIsLockedToggled(_) => "canvas/entityIsLockedToggled",
            Self::EntityOpacityChanged { .. } => "canvas/entityOpacityChanged",
            Self::EntityMovedTo { .. } => "canvas/entityMovedTo",
            Self::EntityMovedBy { .. } => "canvas/entityMovedBy",
            Self::EntityBrushLineAdded { .. } => "canvas/entityBrushLineAdded",
            Self::EntityEraserLineAdded { .. } => "canvas/entityEraserLineAdded",
            Self::EntityRectAdded { .. } => "canvas/entityRectAdded",
            Self::EntityArranged { arrange, .. } => match arrange {
                Arrange::ForwardOne => "canvas/entityArrangedForwardOne",
                Arrange::BackwardOne => "canvas/entityArrangedBackwardOne",
                Arrange::ToFront => "canvas/entityArrangedToFront",
                Arrange::ToBack => "canvas/entityArrangedToBack",
            },
            Self::EntityDeleted(_) => "canvas/entityDeleted",
            Self::AllEntitiesDeleted => "canvas/allEntitiesDeleted",
            Self::CanvasReset => "canvas/canvasReset",
            Self::CanvasUndo => "canvas/canvasUndo",
            Self::CanvasRedo => "canvas/canvasRedo",
            Self::CanvasClearHistory => "canvas/canvasClearHistory",
        }
    }
}

// ─── Reducer ──────────────────────────────────────────────────────────────

/// The one reducer every canvas document shares. History actions are
/// handled by [`CanvasesState::reduce`] and ignored here.
pub fn reduce_canvas(state: &mut CanvasState, action: &CanvasAction) {
    use CanvasAction as A;

    match action {
        A::BboxChangedFromCanvas(rect) => state.bbox.changed_from_canvas(*rect),
        A::BboxWidthChanged {
            width,
            update_aspect_ratio,
            clamp,
        } => {
            state.bbox.editor().width_changed(*width, *update_aspect_ratio, *clamp);
            state.bbox.sync_scaled_size();
        }
        A::BboxHeightChanged {
            height,
            update_aspect_ratio,
            clamp,
        } => {
            state.bbox.editor().height_changed(*height, *update_aspect_ratio, *clamp);
            state.bbox.sync_scaled_size();
        }
        A::BboxAspectRatioLockToggled => {
            state.bbox.editor().lock_toggled();
            state.bbox.sync_scaled_size();
        }
        A::BboxAspectRatioIdChanged(id) => {
            state.bbox.editor().id_changed(*id);
            state.bbox.sync_scaled_size();
        }
        A::BboxDimensionsSwapped => {
            state.bbox.editor().swapped();
            state.bbox.sync_scaled_size();
        }
        A::BboxSizeOptimized => {
            state.bbox.editor().size_optimized();
            state.bbox.sync_scaled_size();
        }
        A::BboxSyncedToOptimalDimension => {
            if state.bbox.editor().synced_to_optimal() {
                state.bbox.sync_scaled_size();
            }
        }
        A::BboxScaledWidthChanged(w) => state.bbox.scaled_width_changed(*w),
        A::BboxScaledHeightChanged(h) => state.bbox.scaled_height_changed(*h),
        A::BboxScaleMethodChanged(method) => {
            state.bbox.scale_method = *method;
            state.bbox.sync_scaled_size();
        }

        A::RasterLayerAdded { id, name } => {
            if state.entity_index(id).is_some() {
                log::debug!("layer {id} already exists");
                return;
            }
            state.entities.push(Layer::new(id.clone(), name.clone()));
            state.selected_entity_id = Some(id.clone());
        }
        A::EntitySelected(id) => {
            if id.as_deref().is_none_or(|id| state.entity_index(id).is_some()) {
                state.selected_entity_id = id.clone();
            }
        }
        A::EntityNameChanged { id, name } => {
            if let Some(layer) = state.entity_mut(id) {
                layer.name = name.clone();
            }
        }
        A::EntityIsEnabledToggled(id) => {
            if let Some(layer) = state.entity_mut(id) {
                layer.is_enabled = !layer.is_enabled;
            }
        }
        A::EntityIsLockedToggled(id) => {
            if let Some(layer) = state.entity_mut(id) {
                layer.is_locked = !layer.is_locked;
            }
        }
        A::EntityOpacityChanged { id, opacity } => {
            if let Some(layer) = state.entity_mut(id) {
                layer.opacity = opacity.clamp(0.0, 1.0);
            }
        }
        A::EntityMovedTo { id, position } => {
            if let Some(layer) = state.entity_mut(id) {
                layer.position = *position;
            }
        }
        A::EntityMovedBy { id, dx, dy } => {
            if let Some(layer) = state.entity_mut(id) {
                layer.position.x += dx;
                layer.position.y += dy;
            }
        }
        A::EntityBrushLineAdded { id, line } => {
            if let Some(layer) = state.entity_mut(id) {
                layer.objects.push(CanvasObject::BrushLine(line.clone()));
            }
        }
        A::EntityEraserLineAdded { id, line } => {
            if let Some(layer) = state.entity_mut(id) {
                layer.objects.push(CanvasObject::EraserLine(line.clone()));
            }
        }
        A::EntityRectAdded { id, rect } => {
            if let Some(layer) = state.entity_mut(id) {
                layer.objects.push(CanvasObject::Rect(rect.clone()));
            }
        }
        A::EntityArranged { id, arrange } => {
            let Some(idx) = state.entity_index(id) else {
                return;
            };
            let last = state.entities.len() - 1;
            match arrange {
                Arrange::ForwardOne if idx < last => state.entities.swap(idx, idx + 1),
                Arrange::BackwardOne if idx > 0 => state.entities.swap(idx, idx - 1),
                Arrange::ToFront => {
                    let layer = state.entities.remove(idx);
                    state.entities.push(layer);
                }
                Arrange::ToBack => {
                    let layer = state.entities.remove(idx);
                    state.entities.insert(0, layer);
                }
                _ => {}
            }
        }
        A::EntityDeleted(id) => {
            let Some(idx) = state.entity_index(id) else {
                return;
            };
            state.entities.remove(idx);
            if state.selected_entity_id.as_deref() == Some(id.as_str()) {
                state.selected_entity_id = state
                    .entities
                    .get(idx)
                    .or_else(|| idx.checked_sub(1).and_then(|i| state.entities.get(i)))
                    .map(|l| l.id.clone());
            }
        }
        A::AllEntitiesDeleted => {
            state.entities.clear();
            state.selected_entity_id = None;
        }
        A::CanvasReset => *state = state.reset(),

        A::CanvasUndo | A::CanvasRedo | A::CanvasClearHistory => {}
    }
}

// ─── Instances ────────────────────────────────────────────────────────────

/// One canvas: its name and its undoable document.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasInstance {
    pub id: CanvasId,
    pub name: String,
    pub history: History<CanvasState>,
}

impl CanvasInstance {
    pub fn new(id: CanvasId, name: String, state: CanvasState) -> Self {
        Self {
            id,
            name,
            history: History::new(state, DEFAULT_HISTORY_LIMIT, DEFAULT_THROTTLE),
        }
    }

    pub fn state(&self) -> &CanvasState {
        self.history.present()
    }
}

impl Keyed for CanvasInstance {
    fn key(&self) -> CanvasId {
        self.id
    }

    fn set_key(&mut self, id: CanvasId) {
        self.id = id;
    }
}

#[derive(Serialize)]
struct CanvasInstanceRef<'a> {
    id: CanvasId,
    name: &'a str,
    state: &'a CanvasState,
}

#[derive(Deserialize)]
struct CanvasInstanceRecord {
    id: CanvasId,
    name: String,
    state: CanvasState,
}

impl Serialize for CanvasInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CanvasInstanceRef {
            id: self.id,
            name: &self.name,
            state: self.state(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CanvasInstance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = CanvasInstanceRecord::deserialize(deserializer)?;
        Ok(CanvasInstance::new(record.id, record.name, record.state))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasesState {
    #[serde(rename = "_version")]
    pub version: u32,
    pub active_canvas_id: CanvasId,
    pub canvases: InstanceMap<CanvasInstance>,
}

impl CanvasesState {
    pub fn active(&self) -> Option<&CanvasInstance> {
        self.canvases.get(self.active_canvas_id)
    }

    /// Apply a canvas action to one document. Returns whether its state
    /// changed.
    pub fn reduce(&mut self, action: &CanvasAction, canvas_id: CanvasId, now: Duration) -> bool {
        let mut changed = false;
        partition::apply(&mut self.canvases, canvas_id, |c| {
            changed = match action {
                CanvasAction::CanvasUndo => c.history.undo(),
                CanvasAction::CanvasRedo => c.history.redo(),
                CanvasAction::CanvasClearHistory => {
                    c.history.clear();
                    false
                }
                _ => c
                    .history
                    .apply(action.action_type(), now, |s| reduce_canvas(s, action)),
            };
        });
        changed
    }

    /// Apply a change coming from another slice (model changes). Goes
    /// through history so the filter can decline to record it.
    pub fn apply_external(
        &mut self,
        canvas_id: CanvasId,
        action_type: &'static str,
        now: Duration,
        reduce: impl FnOnce(&mut CanvasState),
    ) -> bool {
        let mut changed = false;
        partition::apply(&mut self.canvases, canvas_id, |c| {
            changed = c.history.apply(action_type, now, reduce);
        });
        changed
    }

    pub fn configure_history(&mut self, limit: usize, window: Duration) {
        for id in self.canvases.ids() {
            if let Some(c) = self.canvases.get_mut(id) {
                c.history.configure(limit, window);
            }
        }
    }

    pub fn canvas_added(&mut self, canvas_id: CanvasId, is_selected: bool, limit: usize, window: Duration) {
        if self.canvases.contains(canvas_id) {
            log::debug!("canvas {canvas_id} already exists");
            return;
        }
        let name = format!("Canvas {}", self.canvases.len() + 1);
        let mut instance = CanvasInstance::new(canvas_id, name, CanvasState::default());
        instance.history.configure(limit, window);
        self.canvases.insert(instance);
        if is_selected {
            self.active_canvas_id = canvas_id;
        }
    }

    /// Remove a canvas. The last canvas can't be deleted. Returns whether
    /// it was removed.
    pub fn canvas_deleted(&mut self, canvas_id: CanvasId) -> bool {
        if !self.canvases.contains(canvas_id) || self.canvases.len() <= 1 {
            return false;
        }
        self.canvases.remove(canvas_id);
        if self.active_canvas_id == canvas_id {
            if let Some(next) = self.canvases.ids().first() {
                self.active_canvas_id = *next;
            }
        }
        true
    }

    pub fn canvas_selected(&mut self, canvas_id: CanvasId) -> bool {
        if !self.canvases.contains(canvas_id) {
            return false;
        }
        self.active_canvas_id = canvas_id;
        true
    }

    pub fn canvas_multi_canvas_migrated(&mut self, canvas_id: CanvasId) -> bool {
        let placeholder = CanvasId::placeholder();
        if !self.canvases.rekey(placeholder, canvas_id) {
            return false;
        }
        if self.active_canvas_id == placeholder {
            self.active_canvas_id = canvas_id;
        }
        true
    }
}

// ─── Persistence ──────────────────────────────────────────────────────────

/// The untagged blob was a single canvas document.
fn wrap_single_canvas(mut raw: Value) -> StateResult<Value> {
    let obj = expect_object(CanvasesState::NAME, 0, &mut raw)?;
    let state = Value::Object(std::mem::take(obj));
    Ok(json!({
        "activeCanvasId": MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER,
        "canvases": {
            MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER: {
                "id": MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER,
                "name": "Canvas 1",
                "state": state,
            }
        }
    }))
}

impl PersistedSlice for CanvasesState {
    const NAME: &'static str = "canvas";
    const MIGRATOR: Migrator = Migrator {
        slice: "canvas",
        untagged_version: 0,
        steps: &[wrap_single_canvas],
    };

    /// One empty canvas, selected.
    fn initial() -> Self {
        let id = CanvasId::generate();
        let mut canvases = InstanceMap::default();
        canvases.insert(CanvasInstance::new(id, "Canvas 1".into(), CanvasState::default()));
        Self {
            version: CANVAS_VERSION,
            active_canvas_id: id,
            canvases,
        }
    }
}

impl Validate for CanvasesState {
    fn collect_issues(&self, path: &str, issues: &mut Vec<ValidationIssue>) {
        check_version(self.version, CANVAS_VERSION, issues);
        if !self.canvases.contains(self.active_canvas_id) {
            issues.push(ValidationIssue::new(
                join_path(path, "activeCanvasId"),
                "dangling-id",
                format!("no canvas `{}`", self.active_canvas_id),
            ));
        }
        for (key, canvas) in self.canvases.iter() {
            let p = join_path(&join_path(path, "canvases"), key.as_str());
            check_key_matches(&p, key.as_str(), canvas.id.as_str(), issues);
            let state = canvas.state();
            let bbox = join_path(&join_path(&p, "state"), "bbox");
            if state.bbox.rect.width == 0 || state.bbox.rect.height == 0 {
                issues.push(ValidationIssue::new(join_path(&bbox, "rect"), "positive", "empty bbox"));
            }
            for (i, layer) in state.entities.iter().enumerate() {
                let lp = join_path(&join_path(&join_path(&p, "state"), "entities"), &format!("[{i}]"));
                check_range(&lp, "opacity", layer.opacity, 0.0, 1.0, issues);
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use studio_core::model::ModelType;

    fn reduce(state: &mut CanvasState, action: CanvasAction) {
        reduce_canvas(state, &action);
    }

    #[test]
    fn bbox_width_change_keeps_scaled_size_in_sync() {
        let mut s = CanvasState::default();
        s.bbox.model_base = BaseModel::Sdxl;
        reduce(
            &mut s,
            CanvasAction::BboxWidthChanged {
                width: 1024,
                update_aspect_ratio: false,
                clamp: true,
            },
        );
        assert_eq!((s.bbox.rect.width, s.bbox.rect.height), (1024, 512));
        assert!(s.bbox.scaled_size.area() >= 1024.0 * 1024.0);
        assert_eq!(s.bbox.scaled_size.width % 8, 0);
    }

    #[test]
    fn manual_scaling_only_follows_locked_ratio() {
        let mut s = CanvasState::default();
        reduce(&mut s, CanvasAction::BboxScaleMethodChanged(ScaleMethod::Manual));
        reduce(&mut s, CanvasAction::BboxScaledWidthChanged(700));
        assert_eq!(s.bbox.scaled_size, Dimensions::new(704, 512));

        reduce(&mut s, CanvasAction::BboxAspectRatioIdChanged(AspectRatioId::R1x1));
        reduce(&mut s, CanvasAction::BboxScaledHeightChanged(640));
        assert_eq!(s.bbox.scaled_size, Dimensions::new(640, 640));
    }

    #[test]
    fn resize_from_canvas_frees_ratio() {
        let mut s = CanvasState::default();
        reduce(
            &mut s,
            CanvasAction::BboxChangedFromCanvas(Rect {
                x: 10,
                y: 20,
                width: 768,
                height: 512,
            }),
        );
        assert_eq!(s.bbox.aspect_ratio.id, AspectRatioId::Free);
        assert_eq!(s.bbox.aspect_ratio.value, 1.5);

        let before = s.bbox.aspect_ratio;
        reduce(
            &mut s,
            CanvasAction::BboxChangedFromCanvas(Rect {
                x: 0,
                y: 0,
                width: 768,
                height: 512,
            }),
        );
        assert_eq!(s.bbox.aspect_ratio, before);
        assert_eq!(s.bbox.rect.x, 0);
    }

    #[test]
    fn same_ratio_resize_from_canvas_rescales() {
        let mut s = CanvasState::default();
        let sdxl = ModelIdentifier::new("sdxl", "SDXL", BaseModel::Sdxl, ModelType::Main);
        s.bbox.model_changed(Some(&sdxl));
        assert_eq!(s.bbox.scaled_size, Dimensions::new(1024, 1024));

        reduce(
            &mut s,
            CanvasAction::BboxChangedFromCanvas(Rect {
                x: 0,
                y: 0,
                width: 2048,
                height: 2048,
            }),
        );
        assert_eq!(s.bbox.aspect_ratio.value, 1.0);
        assert_eq!(
            s.bbox.scaled_size,
            sizing::scaled_bbox_dimensions(Dimensions::new(2048, 2048), Some(BaseModel::Sdxl))
        );
        assert_eq!(s.bbox.scaled_size, Dimensions::new(2048, 2048));
    }

    #[test]
    fn scaled_size_never_collapses() {
        let mut s = CanvasState::default();
        reduce(&mut s, CanvasAction::BboxScaleMethodChanged(ScaleMethod::Manual));
        reduce(&mut s, CanvasAction::BboxAspectRatioIdChanged(AspectRatioId::R1x1));
        reduce(&mut s, CanvasAction::BboxScaledWidthChanged(3));
        assert_eq!(s.bbox.scaled_size, Dimensions::new(64, 64));

        reduce(&mut s, CanvasAction::BboxAspectRatioIdChanged(AspectRatioId::R16x9));
        reduce(&mut s, CanvasAction::BboxScaledHeightChanged(0));
        let Dimensions { width, height } = s.bbox.scaled_size;
        assert!(width >= 64 && height >= 64, "{width}x{height}");
        assert_eq!((width % 8, height % 8), (0, 0));
    }

    #[test]
    fn family_change_rederives_scaled_size() {
        let mut s = CanvasState::default();
        let flux = ModelIdentifier::new("flux", "FLUX dev", BaseModel::Flux, ModelType::Main);
        s.bbox.rect.width = 520;
        s.bbox.model_changed(Some(&flux));
        assert_eq!(s.bbox.rect.width % 16, 0);
        assert_eq!(
            s.bbox.scaled_size,
            sizing::scaled_bbox_dimensions(s.bbox.dimensions(), Some(BaseModel::Flux))
        );
    }

    #[test]
    fn api_model_skips_scaled_size() {
        let mut s = CanvasState::default();
        let gpt = ModelIdentifier::new("gpt", "GPT Image", BaseModel::ChatGpt4o, ModelType::Main);
        s.bbox.model_changed(Some(&gpt));
        assert_eq!(s.bbox.model_base, BaseModel::ChatGpt4o);
        assert_eq!((s.bbox.rect.width, s.bbox.rect.height), (1024, 1024));
        assert_eq!(s.bbox.scaled_size, Dimensions::new(512, 512));
    }

    #[test]
    fn layers_and_objects() {
        let mut s = CanvasState::default();
        reduce(&mut s, CanvasAction::RasterLayerAdded { id: "l1".into(), name: None });
        reduce(&mut s, CanvasAction::RasterLayerAdded { id: "l2".into(), name: None });
        reduce(
            &mut s,
            CanvasAction::EntityBrushLineAdded {
                id: "l1".into(),
                line: BrushLine {
                    id: "line".into(),
                    stroke_width: 4.0,
                    points: vec![0.0, 0.0, 5.0, 5.0],
                    color: RgbaColor::WHITE,
                },
            },
        );
        assert_eq!(s.entities[0].objects.len(), 1);

        reduce(
            &mut s,
            CanvasAction::EntityArranged {
                id: "l1".into(),
                arrange: Arrange::ToFront,
            },
        );
        assert_eq!(s.entities.last().unwrap().id, "l1");

        reduce(&mut s, CanvasAction::EntitySelected(Some("l1".into())));
        reduce(&mut s, CanvasAction::EntityDeleted("l1".into()));
        assert_eq!(s.selected_entity_id.as_deref(), Some("l2"));
    }

    #[test]
    fn reset_keeps_model_base() {
        let mut s = CanvasState::default();
        s.bbox.model_base = BaseModel::Sdxl;
        reduce(&mut s, CanvasAction::RasterLayerAdded { id: "l".into(), name: None });
        reduce(&mut s, CanvasAction::CanvasReset);
        assert!(s.entities.is_empty());
        assert_eq!(s.bbox.model_base, BaseModel::Sdxl);
        assert_eq!((s.bbox.rect.width, s.bbox.rect.height), (1024, 1024));
    }

    #[test]
    fn last_canvas_cannot_be_deleted() {
        let mut state = CanvasesState::initial();
        let only = state.active_canvas_id;
        assert!(!state.canvas_deleted(only));

        let second = CanvasId::intern("canvas_second");
        state.canvas_added(second, true, 64, DEFAULT_THROTTLE);
        assert_eq!(state.active_canvas_id, second);
        assert!(state.canvas_deleted(second));
        assert_eq!(state.active_canvas_id, only);
    }

    #[test]
    fn instance_serializes_present_only() {
        let state = CanvasesState::initial();
        let json = serde_json::to_value(&state).unwrap();
        let id = state.active_canvas_id;
        assert_eq!(json["activeCanvasId"], id.as_str());
        assert_eq!(json["canvases"][id.as_str()]["state"]["bbox"]["scaleMethod"], "auto");
        let back: CanvasesState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}

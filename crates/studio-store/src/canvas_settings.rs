//! Canvas settings: one shared block plus per-canvas tool settings.
//!
//! Persisted as an array of per-canvas records (`canvases: [{ canvasId, ... }]`),
//! the list layout of the partitioning layer.

use crate::partition::{self, InstanceList, InstanceTable, Keyed};
use crate::persist::PersistedSlice;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use studio_core::migrate::expect_object;
use studio_core::model::{RgbaColor, RgbaPatch};
use studio_core::validate::{ValidationIssue, check_positive, check_version, join_path};
use studio_core::{CanvasId, MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER, Migrator, StateResult, Validate};

pub const CANVAS_SETTINGS_VERSION: u32 = 1;

// ─── State ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoSwitchMode {
    Off,
    SwitchOnStart,
    SwitchOnFinish,
}

/// Settings every canvas shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SharedSettings {
    #[serde(rename = "showHUD")]
    pub show_hud: bool,
    pub clip_to_bbox: bool,
    pub dynamic_grid: bool,
    pub invert_scroll_for_tool_width: bool,
    pub output_only_masked_regions: bool,
    pub auto_process: bool,
    pub snap_to_grid: bool,
    pub show_progress_on_canvas: bool,
    pub bbox_overlay: bool,
    pub preserve_mask: bool,
    pub isolated_staging_preview: bool,
    pub isolated_layer_preview: bool,
    pub pressure_sensitivity: bool,
    pub rule_of_thirds: bool,
    pub save_all_images_to_gallery: bool,
    pub staging_area_auto_switch: AutoSwitchMode,
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self {
            show_hud: true,
            clip_to_bbox: false,
            dynamic_grid: false,
            invert_scroll_for_tool_width: false,
            output_only_masked_regions: true,
            auto_process: true,
            snap_to_grid: true,
            show_progress_on_canvas: true,
            bbox_overlay: false,
            preserve_mask: false,
            isolated_staging_preview: true,
            isolated_layer_preview: true,
            pressure_sensitivity: true,
            rule_of_thirds: false,
            save_all_images_to_gallery: false,
            staging_area_auto_switch: AutoSwitchMode::SwitchOnStart,
        }
    }
}

/// Boolean shared settings flipped by a toggle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedToggle {
    ShowHud,
    DynamicGrid,
    OutputOnlyMaskedRegions,
    AutoProcess,
    SnapToGrid,
    ShowProgressOnCanvas,
    BboxOverlay,
    PreserveMask,
    IsolatedStagingPreview,
    IsolatedLayerPreview,
    PressureSensitivity,
    RuleOfThirds,
    SaveAllImagesToGallery,
}

impl SharedSettings {
    fn flag_mut(&mut self, toggle: SharedToggle) -> &mut bool {
        match toggle {
            SharedToggle::ShowHud => &mut self.show_hud,
            SharedToggle::DynamicGrid => &mut self.dynamic_grid,
            SharedToggle::OutputOnlyMaskedRegions => &mut self.output_only_masked_regions,
            SharedToggle::AutoProcess => &mut self.auto_process,
            SharedToggle::SnapToGrid => &mut self.snap_to_grid,
            SharedToggle::ShowProgressOnCanvas => &mut self.show_progress_on_canvas,
            SharedToggle::BboxOverlay => &mut self.bbox_overlay,
            SharedToggle::PreserveMask => &mut self.preserve_mask,
            SharedToggle::IsolatedStagingPreview => &mut self.isolated_staging_preview,
            SharedToggle::IsolatedLayerPreview => &mut self.isolated_layer_preview,
            SharedToggle::PressureSensitivity => &mut self.pressure_sensitivity,
            SharedToggle::RuleOfThirds => &mut self.rule_of_thirds,
            SharedToggle::SaveAllImagesToGallery => &mut self.save_all_images_to_gallery,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveColor {
    #[serde(rename = "bgColor")]
    Bg,
    #[serde(rename = "fgColor")]
    Fg,
}

/// Tool settings of one canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSettings {
    pub canvas_id: CanvasId,
    pub brush_width: u32,
    pub eraser_width: u32,
    pub active_color: ActiveColor,
    pub bg_color: RgbaColor,
    pub fg_color: RgbaColor,
}

impl InstanceSettings {
    pub fn new(canvas_id: CanvasId) -> Self {
        Self {
            canvas_id,
            brush_width: 50,
            eraser_width: 50,
            active_color: ActiveColor::Fg,
            bg_color: RgbaColor::BLACK,
            fg_color: RgbaColor::WHITE,
        }
    }

    pub fn active_color(&self) -> RgbaColor {
        match self.active_color {
            ActiveColor::Bg => self.bg_color,
            ActiveColor::Fg => self.fg_color,
        }
    }
}

impl Keyed for InstanceSettings {
    fn key(&self) -> CanvasId {
        self.canvas_id
    }

    fn set_key(&mut self, id: CanvasId) {
        self.canvas_id = id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasSettingsState {
    #[serde(rename = "_version")]
    pub version: u32,
    pub shared: SharedSettings,
    pub canvases: InstanceList<InstanceSettings>,
}

// ─── Actions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsAction {
    Toggled(SharedToggle),
    ClipToBboxChanged(bool),
    InvertScrollForToolWidthChanged(bool),
    StagingAreaAutoSwitchChanged(AutoSwitchMode),

    /// Rounded to whole pixels; widths that round to zero are ignored.
    BrushWidthChanged(f64),
    EraserWidthChanged(f64),
    ActiveColorToggled,
    BgColorChanged(RgbaPatch),
    FgColorChanged(RgbaPatch),
    ColorsSetToDefault,
}

impl SettingsAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::Toggled(t) => match t {
                SharedToggle::ShowHud => "canvasSettings/settingsShowHUDToggled",
                SharedToggle::DynamicGrid => "canvasSettings/settingsDynamicGridToggled",
                SharedToggle::OutputOnlyMaskedRegions => "canvasSettings/settingsOutputOnlyMaskedRegionsToggled",
                SharedToggle::AutoProcess => "canvasSettings/settingsAutoProcessToggled",
                SharedToggle::SnapToGrid => "canvasSettings/settingsSnapToGridToggled",
                SharedToggle::ShowProgressOnCanvas => "canvasSettings/settingsShowProgressOnCanvasToggled",
                SharedToggle::BboxOverlay => "canvasSettings/settingsBboxOverlayToggled",
                SharedToggle::PreserveMask => "canvasSettings/settingsPreserveMaskToggled",
                SharedToggle::IsolatedStagingPreview => "canvasSettings/settingsIsolatedStagingPreviewToggled",
                SharedToggle::IsolatedLayerPreview => "canvasSettings/settingsIsolatedLayerPreviewToggled",
                SharedToggle::PressureSensitivity => "canvasSettings/settingsPressureSensitivityToggled",
                SharedToggle::RuleOfThirds => "canvasSettings/settingsRuleOfThirdsToggled",
                SharedToggle::SaveAllImagesToGallery => "canvasSettings/settingsSaveAllImagesToGalleryToggled",
            },
            Self::ClipToBboxChanged(_) => "canvasSettings/settingsClipToBboxChanged",
            Self::InvertScrollForToolWidthChanged(_) => "canvasSettings/settingsInvertScrollForToolWidthChanged",
            Self::StagingAreaAutoSwitchChanged(_) => "canvasSettings/settingsStagingAreaAutoSwitchChanged",
            Self::BrushWidthChanged(_) => "canvasSettings/settingsBrushWidthChanged",
            Self::EraserWidthChanged(_) => "canvasSettings/settingsEraserWidthChanged",
            Self::ActiveColorToggled => "canvasSettings/settingsActiveColorToggled",
            Self::BgColorChanged(_) => "canvasSettings/settingsBgColorChanged",
            Self::FgColorChanged(_) => "canvasSettings/settingsFgColorChanged",
            Self::ColorsSetToDefault => "canvasSettings/settingsColorsSetToDefault",
        }
    }

    /// Whether the action edits one canvas's settings rather than the shared block.
    pub fn is_instance_scoped(&self) -> bool {
        matches!(
            self,
            Self::BrushWidthChanged(_)
                | Self::EraserWidthChanged(_)
                | Self::ActiveColorToggled
                | Self::BgColorChanged(_)
                | Self::FgColorChanged(_)
                | Self::ColorsSetToDefault
        )
    }
}

// ─── Reducers ─────────────────────────────────────────────────────────────

fn whole_pixels(width: f64) -> Option<u32> {
    let rounded = width.round();
    (rounded >= 1.0 && rounded <= f64::from(u32::MAX)).then_some(rounded as u32)
}

pub fn reduce_shared(shared: &mut SharedSettings, action: &SettingsAction) {
    match action {
        SettingsAction::Toggled(t) => {
            let flag = shared.flag_mut(*t);
            *flag = !*flag;
        }
        SettingsAction::ClipToBboxChanged(v) => shared.clip_to_bbox = *v,
        SettingsAction::InvertScrollForToolWidthChanged(v) => shared.invert_scroll_for_tool_width = *v,
        SettingsAction::StagingAreaAutoSwitchChanged(mode) => shared.staging_area_auto_switch = *mode,
        _ => {}
    }
}

pub fn reduce_instance(settings: &mut InstanceSettings, action: &SettingsAction) {
    match action {
        SettingsAction::BrushWidthChanged(w) => match whole_pixels(*w) {
            Some(w) => settings.brush_width = w,
            None => log::debug!("ignoring brush width {w}"),
        },
        SettingsAction::EraserWidthChanged(w) => match whole_pixels(*w) {
            Some(w) => settings.eraser_width = w,
            None => log::debug!("ignoring eraser width {w}"),
        },
        SettingsAction::ActiveColorToggled => {
            settings.active_color = match settings.active_color {
                ActiveColor::Bg => ActiveColor::Fg,
                ActiveColor::Fg => ActiveColor::Bg,
            };
        }
        SettingsAction::BgColorChanged(patch) => settings.bg_color = settings.bg_color.merged(patch),
        SettingsAction::FgColorChanged(patch) => settings.fg_color = settings.fg_color.merged(patch),
        SettingsAction::ColorsSetToDefault => {
            settings.bg_color = RgbaColor::BLACK;
            settings.fg_color = RgbaColor::WHITE;
        }
        _ => {}
    }
}

impl CanvasSettingsState {
    /// Apply a settings action. Instance-scoped actions go to `canvas_id`;
    /// a missing canvas is a no-op.
    pub fn reduce(&mut self, action: &SettingsAction, canvas_id: Option<CanvasId>) -> bool {
        if !action.is_instance_scoped() {
            reduce_shared(&mut self.shared, action);
            return true;
        }
        let Some(id) = canvas_id else {
            log::debug!("{} needs a canvas id", action.action_type());
            return false;
        };
        partition::apply(&mut self.canvases, id, |s| reduce_instance(s, action))
    }

    pub fn canvas_added(&mut self, canvas_id: CanvasId) {
        self.canvases.insert(InstanceSettings::new(canvas_id));
    }

    pub fn canvas_deleted(&mut self, canvas_id: CanvasId) {
        self.canvases.remove(canvas_id);
    }

    pub fn canvas_initialized(&mut self, canvas_id: CanvasId) {
        if !self.canvases.contains(canvas_id) {
            self.canvases.insert(InstanceSettings::new(canvas_id));
        }
    }

    pub fn canvas_multi_canvas_migrated(&mut self, canvas_id: CanvasId) -> bool {
        self.canvases.rekey(CanvasId::placeholder(), canvas_id)
    }
}

// ─── Persistence ──────────────────────────────────────────────────────────

const INSTANCE_KEYS: &[&str] = &["brushWidth", "eraserWidth", "activeColor", "bgColor", "fgColor"];

/// The untagged blob was one canvas's settings, shared and per-canvas
/// fields mixed together.
fn split_shared_and_instance(mut raw: Value) -> StateResult<Value> {
    let obj = expect_object(CanvasSettingsState::NAME, 0, &mut raw)?;
    let mut shared: Map<String, Value> = std::mem::take(obj);

    let mut canvas = Map::new();
    canvas.insert("canvasId".into(), json!(MIGRATION_MULTI_CANVAS_ID_PLACEHOLDER));
    let defaults = serde_json::to_value(InstanceSettings::new(CanvasId::placeholder()))?;
    for key in INSTANCE_KEYS {
        let value = shared.remove(*key).or_else(|| defaults.get(*key).cloned());
        if let Some(v) = value {
            canvas.insert((*key).to_string(), v);
        }
    }

    Ok(json!({
        "shared": shared,
        "canvases": [canvas],
    }))
}

impl PersistedSlice for CanvasSettingsState {
    const NAME: &'static str = "canvasSettings";
    const MIGRATOR: Migrator = Migrator {
        slice: "canvasSettings",
        untagged_version: 0,
        steps: &[split_shared_and_instance],
    };

    fn initial() -> Self {
        Self {
            version: CANVAS_SETTINGS_VERSION,
            shared: SharedSettings::default(),
            canvases: InstanceList::default(),
        }
    }
}

impl Validate for CanvasSettingsState {
    fn collect_issues(&self, path: &str, issues: &mut Vec<ValidationIssue>) {
        check_version(self.version, CANVAS_SETTINGS_VERSION, issues);
        let mut seen = Vec::new();
        for (i, s) in self.canvases.iter().enumerate() {
            let p = join_path(&join_path(path, "canvases"), &format!("[{i}]"));
            check_positive(&p, "brushWidth", f64::from(s.brush_width), issues);
            check_positive(&p, "eraserWidth", f64::from(s.eraser_width), issues);
            if seen.contains(&s.canvas_id) {
                issues.push(ValidationIssue::new(
                    join_path(&p, "canvasId"),
                    "duplicate-id",
                    format!("canvas `{}` listed twice", s.canvas_id),
                ));
            }
            seen.push(s.canvas_id);
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

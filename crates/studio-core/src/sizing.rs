//! Aspect-ratio & size engine.
//!
//! Pure functions that turn a target area, an aspect ratio and the active
//! model family into grid-aligned integer dimensions, plus `SizeEditor`, the
//! one place width/height/ratio edits are applied. Both the generation
//! parameters and the canvas bounding box are edited through it.
//!
//! Invariants kept by every computed size:
//! - both sides are multiples of `grid_size(base)`;
//! - both sides are at least `MIN_DIMENSION`;
//! - when the ratio is locked, `width / height` tracks `aspect_ratio.value`
//!   as closely as grid rounding allows.

use crate::model::BaseModel;
use serde::{Deserialize, Serialize};

/// Smallest width or height the engine will produce.
pub const MIN_DIMENSION: u32 = 64;

/// Area band (relative to optimal²) that counts as "optimal".
const MIN_AREA_FACTOR: f64 = 0.8;
const MAX_AREA_FACTOR: f64 = 1.2;

// ─── Geometry ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }

    pub fn ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height.max(1))
    }
}

// ─── Model constraints ───────────────────────────────────────────────────

/// Pixel alignment required by a model family.
pub fn grid_size(base: Option<BaseModel>) -> u32 {
    match base {
        Some(BaseModel::Imagen3 | BaseModel::Imagen4 | BaseModel::ChatGpt4o) => 64,
        Some(BaseModel::Gemini25 | BaseModel::CogView4) => 32,
        Some(BaseModel::Flux | BaseModel::FluxKontext | BaseModel::Sd3) => 16,
        _ => 8,
    }
}

/// Side length of the square the model was trained at.
pub fn optimal_dimension(base: Option<BaseModel>) -> u32 {
    match base {
        Some(BaseModel::Sd1) => 512,
        Some(BaseModel::Sd2) => 768,
        _ => 1024,
    }
}

/// Whether `width × height` is within the model's optimal area band.
pub fn is_size_optimal(width: u32, height: u32, base: Option<BaseModel>) -> bool {
    let optimal = f64::from(optimal_dimension(base));
    let target = optimal * optimal;
    let area = f64::from(width) * f64::from(height);
    area >= MIN_AREA_FACTOR * target && area <= MAX_AREA_FACTOR * target
}

// ─── Rounding ────────────────────────────────────────────────────────────

pub fn round_to_multiple(value: f64, multiple: u32) -> u32 {
    let m = f64::from(multiple.max(1));
    ((value / m).round() * m).max(0.0) as u32
}

pub fn round_down_to_multiple(value: f64, multiple: u32) -> u32 {
    let m = f64::from(multiple.max(1));
    ((value / m).floor() * m).max(0.0) as u32
}

/// Round to the grid and floor at `MIN_DIMENSION` (a multiple of every grid).
pub fn snap_to_grid(value: f64, grid: u32) -> u32 {
    round_to_multiple(value, grid).max(MIN_DIMENSION)
}

// ─── Size solvers ────────────────────────────────────────────────────────

/// Dimensions with aspect `ratio` whose area is close to `area`.
pub fn calculate_new_size(ratio: f64, area: f64, base: Option<BaseModel>) -> Dimensions {
    let grid = grid_size(base);
    let exact_width = (area * ratio).sqrt();
    let exact_height = exact_width / ratio;
    Dimensions {
        width: snap_to_grid(exact_width, grid),
        height: snap_to_grid(exact_height, grid),
    }
}

/// Processing size for a bbox smaller than the model's optimal area: grow
/// the longer side one grid step at a time, keeping the aspect ratio, until
/// the area reaches optimal². Bboxes already at or above it are only
/// grid-aligned.
pub fn scaled_bbox_dimensions(dims: Dimensions, base: Option<BaseModel>) -> Dimensions {
    let optimal = optimal_dimension(base);
    let grid = grid_size(base);
    let width = snap_to_grid(f64::from(dims.width), grid);
    let height = snap_to_grid(f64::from(dims.height), grid);
    let aspect = f64::from(width) / f64::from(height);
    let target = u64::from(optimal) * u64::from(optimal);

    let mut scaled = Dimensions { width, height };
    let mut area = u64::from(width) * u64::from(height);
    let mut max_dimension = optimal.saturating_sub(grid);

    while area < target {
        max_dimension += grid;
        if width == height {
            scaled = Dimensions::new(optimal, optimal);
            break;
        } else if aspect > 1.0 {
            scaled.width = max_dimension;
            scaled.height = snap_to_grid(f64::from(max_dimension) / aspect, grid);
        } else {
            scaled.height = max_dimension;
            scaled.width = snap_to_grid(f64::from(max_dimension) * aspect, grid);
        }
        area = u64::from(scaled.width) * u64::from(scaled.height);
    }

    scaled
}

// ─── Aspect ratio presets ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatioId {
    Free,
    #[serde(rename = "21:9")]
    R21x9,
    #[serde(rename = "16:9")]
    R16x9,
    #[serde(rename = "3:2")]
    R3x2,
    #[serde(rename = "4:3")]
    R4x3,
    #[serde(rename = "1:1")]
    R1x1,
    #[serde(rename = "3:4")]
    R3x4,
    #[serde(rename = "2:3")]
    R2x3,
    #[serde(rename = "9:16")]
    R9x16,
    #[serde(rename = "9:21")]
    R9x21,
}

impl AspectRatioId {
    pub const PRESETS: &'static [AspectRatioId] = &[
        Self::R21x9,
        Self::R16x9,
        Self::R3x2,
        Self::R4x3,
        Self::R1x1,
        Self::R3x4,
        Self::R2x3,
        Self::R9x16,
        Self::R9x21,
    ];

    /// Fixed ratio of a preset; `None` for `Free`.
    pub fn ratio(self) -> Option<f64> {
        let (w, h) = match self {
            Self::Free => return None,
            Self::R21x9 => (21.0, 9.0),
            Self::R16x9 => (16.0, 9.0),
            Self::R3x2 => (3.0, 2.0),
            Self::R4x3 => (4.0, 3.0),
            Self::R1x1 => (1.0, 1.0),
            Self::R3x4 => (3.0, 4.0),
            Self::R2x3 => (2.0, 3.0),
            Self::R9x16 => (9.0, 16.0),
            Self::R9x21 => (9.0, 21.0),
        };
        Some(w / h)
    }

    /// The preset for the same shape rotated 90°.
    pub fn inverse(self) -> Self {
        match self {
            Self::Free => Self::Free,
            Self::R21x9 => Self::R9x21,
            Self::R16x9 => Self::R9x16,
            Self::R3x2 => Self::R2x3,
            Self::R4x3 => Self::R3x4,
            Self::R1x1 => Self::R1x1,
            Self::R3x4 => Self::R4x3,
            Self::R2x3 => Self::R3x2,
            Self::R9x16 => Self::R16x9,
            Self::R9x21 => Self::R21x9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspectRatioConfig {
    pub id: AspectRatioId,
    pub value: f64,
    pub is_locked: bool,
}

impl Default for AspectRatioConfig {
    fn default() -> Self {
        Self {
            id: AspectRatioId::R1x1,
            value: 1.0,
            is_locked: false,
        }
    }
}

// ─── API model catalogs ──────────────────────────────────────────────────

use AspectRatioId as Ar;

const IMAGEN_SIZES: &[(AspectRatioId, Dimensions)] = &[
    (Ar::R16x9, Dimensions::new(1408, 768)),
    (Ar::R4x3, Dimensions::new(1280, 896)),
    (Ar::R1x1, Dimensions::new(1024, 1024)),
    (Ar::R3x4, Dimensions::new(896, 1280)),
    (Ar::R9x16, Dimensions::new(768, 1408)),
];

const CHATGPT_SIZES: &[(AspectRatioId, Dimensions)] = &[
    (Ar::R3x2, Dimensions::new(1536, 1024)),
    (Ar::R1x1, Dimensions::new(1024, 1024)),
    (Ar::R2x3, Dimensions::new(1024, 1536)),
];

const FLUX_KONTEXT_SIZES: &[(AspectRatioId, Dimensions)] = &[
    (Ar::R21x9, Dimensions::new(1568, 672)),
    (Ar::R16x9, Dimensions::new(1392, 752)),
    (Ar::R4x3, Dimensions::new(1184, 880)),
    (Ar::R1x1, Dimensions::new(1024, 1024)),
    (Ar::R3x4, Dimensions::new(880, 1184)),
    (Ar::R9x16, Dimensions::new(752, 1392)),
    (Ar::R9x21, Dimensions::new(672, 1568)),
];

const GEMINI_SIZES: &[(AspectRatioId, Dimensions)] = &[
    (Ar::R21x9, Dimensions::new(1536, 672)),
    (Ar::R16x9, Dimensions::new(1344, 768)),
    (Ar::R3x2, Dimensions::new(1248, 832)),
    (Ar::R4x3, Dimensions::new(1184, 864)),
    (Ar::R1x1, Dimensions::new(1024, 1024)),
    (Ar::R3x4, Dimensions::new(864, 1184)),
    (Ar::R2x3, Dimensions::new(832, 1248)),
    (Ar::R9x16, Dimensions::new(768, 1344)),
];

/// Fixed output sizes of a hosted model, if it has them.
pub fn api_catalog(base: Option<BaseModel>) -> Option<&'static [(AspectRatioId, Dimensions)]> {
    match base? {
        BaseModel::Imagen3 | BaseModel::Imagen4 => Some(IMAGEN_SIZES),
        BaseModel::ChatGpt4o => Some(CHATGPT_SIZES),
        BaseModel::FluxKontext => Some(FLUX_KONTEXT_SIZES),
        BaseModel::Gemini25 => Some(GEMINI_SIZES),
        _ => None,
    }
}

/// Catalog entry for `id`, if the model has one.
pub fn catalog_size(base: Option<BaseModel>, id: AspectRatioId) -> Option<Dimensions> {
    api_catalog(base)?
        .iter()
        .find(|(entry, _)| *entry == id)
        .map(|(_, dims)| *dims)
}

/// Catalog entry whose ratio is closest to `ratio` (compared in log space so
/// 2:1 and 1:2 are equally far from 1:1).
pub fn nearest_catalog_size(
    base: Option<BaseModel>,
    ratio: f64,
) -> Option<(AspectRatioId, Dimensions)> {
    let target = ratio.max(f64::EPSILON).ln();
    api_catalog(base)?
        .iter()
        .copied()
        .min_by(|(_, a), (_, b)| {
            let da = (a.ratio().ln() - target).abs();
            let db = (b.ratio().ln() - target).abs();
            da.total_cmp(&db)
        })
}

// ─── Editor ──────────────────────────────────────────────────────────────

/// Applies size edits to a width/height pair and its aspect-ratio config.
///
/// Borrowing the fields rather than owning a struct lets the params
/// `dimensions` and the canvas bbox `rect` share one implementation.
pub struct SizeEditor<'a> {
    pub width: &'a mut u32,
    pub height: &'a mut u32,
    pub aspect_ratio: &'a mut AspectRatioConfig,
    pub base: Option<BaseModel>,
}

impl SizeEditor<'_> {
    fn grid(&self) -> u32 {
        grid_size(self.base)
    }

    fn current(&self) -> Dimensions {
        Dimensions::new(*self.width, *self.height)
    }

    fn set(&mut self, dims: Dimensions) {
        *self.width = dims.width;
        *self.height = dims.height;
    }

    fn unlock_to_free(&mut self) {
        self.aspect_ratio.value = self.current().ratio();
        self.aspect_ratio.id = AspectRatioId::Free;
        self.aspect_ratio.is_locked = false;
    }

    /// Set the width. A locked ratio drives the height; an unlocked ratio
    /// (or `update_aspect_ratio`) is re-derived from the new size.
    ///
    /// Without `clamp` the value is only floored at `MIN_DIMENSION` and may
    /// sit off the grid (a field still being typed into). Commit with
    /// `clamp` set.
    pub fn width_changed(&mut self, width: u32, update_aspect_ratio: bool, clamp: bool) {
        let grid = self.grid();
        *self.width = if clamp {
            round_down_to_multiple(f64::from(width), grid).max(MIN_DIMENSION)
        } else {
            width.max(MIN_DIMENSION)
        };

        if self.aspect_ratio.is_locked {
            *self.height = snap_to_grid(f64::from(*self.width) / self.aspect_ratio.value, grid);
        }

        if update_aspect_ratio || !self.aspect_ratio.is_locked {
            self.unlock_to_free();
        }
    }

    /// Mirror of [`Self::width_changed`].
    pub fn height_changed(&mut self, height: u32, update_aspect_ratio: bool, clamp: bool) {
        let grid = self.grid();
        *self.height = if clamp {
            round_down_to_multiple(f64::from(height), grid).max(MIN_DIMENSION)
        } else {
            height.max(MIN_DIMENSION)
        };

        if self.aspect_ratio.is_locked {
            *self.width = snap_to_grid(f64::from(*self.height) * self.aspect_ratio.value, grid);
        }

        if update_aspect_ratio || !self.aspect_ratio.is_locked {
            self.unlock_to_free();
        }
    }

    pub fn lock_toggled(&mut self) {
        self.aspect_ratio.is_locked = !self.aspect_ratio.is_locked;
    }

    pub fn id_changed(&mut self, id: AspectRatioId) {
        self.aspect_ratio.id = id;
        let Some(ratio) = id.ratio() else {
            self.aspect_ratio.is_locked = false;
            return;
        };

        if api_catalog(self.base).is_some() {
            let (id, dims) = match catalog_size(self.base, id) {
                Some(dims) => (id, dims),
                // Presets the hosted model doesn't offer snap to its closest size.
                None => match nearest_catalog_size(self.base, ratio) {
                    Some(entry) => entry,
                    None => return,
                },
            };
            self.set(dims);
            self.aspect_ratio.id = id;
            self.aspect_ratio.value = dims.ratio();
            self.aspect_ratio.is_locked = true;
            return;
        }

        self.aspect_ratio.is_locked = true;
        self.aspect_ratio.value = ratio;
        let dims = calculate_new_size(ratio, self.current().area(), self.base);
        self.set(dims);
    }

    /// Rotate the size 90°.
    pub fn swapped(&mut self) {
        self.aspect_ratio.value = 1.0 / self.aspect_ratio.value;
        self.aspect_ratio.id = self.aspect_ratio.id.inverse();

        if !self.aspect_ratio.is_locked {
            let Dimensions { width, height } = self.current();
            self.set(Dimensions::new(height, width));
            return;
        }

        let dims = catalog_size(self.base, self.aspect_ratio.id).unwrap_or_else(|| {
            calculate_new_size(self.aspect_ratio.value, self.current().area(), self.base)
        });
        self.set(dims);
    }

    /// Resize to the model's optimal area.
    pub fn size_optimized(&mut self) {
        let optimal = optimal_dimension(self.base);
        if self.aspect_ratio.is_locked {
            let area = f64::from(optimal) * f64::from(optimal);
            let dims = calculate_new_size(self.aspect_ratio.value, area, self.base);
            self.set(dims);
        } else {
            *self.aspect_ratio = AspectRatioConfig::default();
            self.set(Dimensions::new(optimal, optimal));
        }
    }

    /// Resize to the optimal area only if the current size is outside the
    /// optimal band. Returns whether anything changed.
    pub fn synced_to_optimal(&mut self) -> bool {
        if is_size_optimal(*self.width, *self.height, self.base) {
            return false;
        }
        let optimal = f64::from(optimal_dimension(self.base));
        let dims = calculate_new_size(self.aspect_ratio.value, optimal * optimal, self.base);
        self.set(dims);
        true
    }

    /// Apply a size recalled from image metadata.
    pub fn size_recalled(&mut self, width: u32, height: u32) {
        if let Some((id, dims)) = nearest_catalog_size(self.base, f64::from(width) / f64::from(height.max(1))) {
            self.set(dims);
            self.aspect_ratio.id = id;
        } else {
            let grid = self.grid();
            *self.width = round_down_to_multiple(f64::from(width), grid).max(MIN_DIMENSION);
            *self.height = round_down_to_multiple(f64::from(height), grid).max(MIN_DIMENSION);
            self.aspect_ratio.id = AspectRatioId::Free;
        }
        self.aspect_ratio.value = self.current().ratio();
        self.aspect_ratio.is_locked = true;
    }

    /// React to the active model family changing. Hosted models are forced
    /// to their square size; other families keep the size, snapped to their
    /// grid. Returns whether the size changed.
    pub fn model_base_changed(&mut self, previous: Option<BaseModel>, next: BaseModel) -> bool {
        self.base = Some(next);
        if previous == Some(next) {
            return false;
        }
        if next.is_api() {
            *self.aspect_ratio = AspectRatioConfig {
                id: AspectRatioId::R1x1,
                value: 1.0,
                is_locked: true,
            };
            self.set(Dimensions::new(1024, 1024));
            return true;
        }

        let before = self.current();
        let grid = self.grid();
        let width = snap_to_grid(f64::from(before.width), grid);
        let height = if self.aspect_ratio.is_locked {
            snap_to_grid(f64::from(width) / self.aspect_ratio.value, grid)
        } else {
            snap_to_grid(f64::from(before.height), grid)
        };
        self.set(Dimensions::new(width, height));
        if !self.aspect_ratio.is_locked {
            self.aspect_ratio.value = self.current().ratio();
        }
        self.current() != before
    }
}

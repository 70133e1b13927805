//! Integration tests: size engine invariants swept across model families
//! (studio-core).

use pretty_assertions::assert_eq;
use serde::Deserialize;
use studio_core::model::BaseModel;
use studio_core::sizing::{self, MIN_DIMENSION, grid_size};
use studio_core::{AspectRatioConfig, AspectRatioId, Dimensions, SizeEditor};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Sweep {
    bases: Vec<BaseModel>,
    api_bases: Vec<BaseModel>,
    sides: Vec<u32>,
}

fn sweep() -> Sweep {
    serde_json::from_str(include_str!("fixtures/size_sweep.json")).unwrap()
}

struct Size {
    width: u32,
    height: u32,
    ratio: AspectRatioConfig,
    base: BaseModel,
}

impl Size {
    fn new(base: BaseModel) -> Self {
        Self {
            width: 512,
            height: 512,
            ratio: AspectRatioConfig::default(),
            base,
        }
    }

    fn editor(&mut self) -> SizeEditor<'_> {
        SizeEditor {
            width: &mut self.width,
            height: &mut self.height,
            aspect_ratio: &mut self.ratio,
            base: Some(self.base),
        }
    }

    fn assert_on_grid(&self) {
        let grid = grid_size(Some(self.base));
        assert_eq!(self.width % grid, 0, "{:?}: width {} off grid", self.base, self.width);
        assert_eq!(self.height % grid, 0, "{:?}: height {} off grid", self.base, self.height);
        assert!(self.width >= MIN_DIMENSION && self.height >= MIN_DIMENSION);
    }

    /// Each side is off by at most half a grid step, so `w - h * ratio`
    /// is bounded by `(1 + ratio) * grid / 2`.
    fn assert_ratio_held(&self) {
        let grid = f64::from(grid_size(Some(self.base)));
        let value = self.ratio.value;
        let drift = (f64::from(self.width) - f64::from(self.height) * value).abs();
        assert!(
            drift <= (1.0 + value) * grid / 2.0 + 1e-9,
            "{:?}: {}x{} drifted from ratio {value}",
            self.base,
            self.width,
            self.height
        );
    }
}

// ─── Locked ratio ───────────────────────────────────────────────────────

#[test]
fn locked_presets_hold_through_width_and_height_edits() {
    let sweep = sweep();
    for &base in &sweep.bases {
        for &id in AspectRatioId::PRESETS {
            for &side in &sweep.sides {
                let mut size = Size::new(base);
                size.editor().id_changed(id);
                assert!(size.ratio.is_locked);
                size.assert_on_grid();

                size.editor().width_changed(side, false, true);
                size.assert_on_grid();
                size.assert_ratio_held();

                size.editor().height_changed(side, false, true);
                size.assert_on_grid();
                size.assert_ratio_held();
            }
        }
    }
}

#[test]
fn swapping_a_locked_preset_flips_it() {
    let sweep = sweep();
    for &base in &sweep.bases {
        for &id in AspectRatioId::PRESETS {
            let mut size = Size::new(base);
            size.editor().id_changed(id);
            size.editor().swapped();
            assert_eq!(size.ratio.id, id.inverse());
            size.assert_on_grid();
            size.assert_ratio_held();
        }
    }
}

#[test]
fn optimizing_lands_in_the_optimal_band() {
    let sweep = sweep();
    for &base in &sweep.bases {
        for &id in AspectRatioId::PRESETS {
            let mut size = Size::new(base);
            size.editor().id_changed(id);
            size.editor().size_optimized();
            size.assert_on_grid();
            assert!(
                sizing::is_size_optimal(size.width, size.height, Some(base)),
                "{base:?} {id:?}: {}x{}",
                size.width,
                size.height
            );
            assert!(!size.editor().synced_to_optimal());
        }
    }
}

// ─── Model family switches ──────────────────────────────────────────────

#[test]
fn switching_families_snaps_to_the_new_grid() {
    let sweep = sweep();
    for &from in &sweep.bases {
        for &to in sweep.bases.iter().filter(|&&b| b != from) {
            for &side in &sweep.sides {
                let mut free = Size::new(from);
                free.editor().width_changed(side + 8, false, true);
                free.editor().model_base_changed(Some(from), to);
                free.base = to;
                free.assert_on_grid();
                assert!(!free.ratio.is_locked);
                assert!((free.ratio.value - f64::from(free.width) / f64::from(free.height)).abs() < 1e-9);

                let mut locked = Size::new(from);
                locked.editor().id_changed(AspectRatioId::R3x2);
                locked.editor().width_changed(side + 8, false, true);
                locked.editor().model_base_changed(Some(from), to);
                locked.base = to;
                locked.assert_on_grid();
                locked.assert_ratio_held();
                assert_eq!(locked.ratio.id, AspectRatioId::R3x2);
            }
        }
    }
}

// ─── Hosted models ──────────────────────────────────────────────────────

#[test]
fn hosted_models_only_take_catalog_sizes() {
    let sweep = sweep();
    for &base in &sweep.api_bases {
        let mut size = Size::new(BaseModel::Sdxl);
        assert!(size.editor().model_base_changed(Some(BaseModel::Sdxl), base));
        size.base = base;
        assert_eq!((size.width, size.height), (1024, 1024));
        assert!(size.ratio.is_locked);

        for &id in AspectRatioId::PRESETS {
            size.editor().id_changed(id);
            let dims = Dimensions::new(size.width, size.height);
            assert_eq!(sizing::catalog_size(Some(base), size.ratio.id), Some(dims), "{base:?} {id:?}");
        }
    }
}

#[test]
fn recalled_sizes_respect_the_grid() {
    let sweep = sweep();
    for &base in &sweep.bases {
        for &w in &sweep.sides {
            for &h in &sweep.sides {
                let mut size = Size::new(base);
                size.editor().size_recalled(w, h);
                size.assert_on_grid();
                assert!(size.ratio.is_locked);
                assert_eq!(size.ratio.id, AspectRatioId::Free);
                assert!(size.width <= w.max(MIN_DIMENSION) && size.height <= h.max(MIN_DIMENSION));
            }
        }
    }
}

#[test]
fn scaled_bbox_reaches_optimal_area() {
    let sweep = sweep();
    for &base in &sweep.bases {
        let optimal = f64::from(sizing::optimal_dimension(Some(base)));
        for &w in &sweep.sides {
            for &h in &sweep.sides {
                let scaled = sizing::scaled_bbox_dimensions(Dimensions::new(w, h), Some(base));
                assert!(scaled.area() >= optimal * optimal || scaled.area() >= f64::from(w) * f64::from(h) * 0.9);
                let grid = grid_size(Some(base));
                assert_eq!((scaled.width % grid, scaled.height % grid), (0, 0));
            }
        }
    }
}

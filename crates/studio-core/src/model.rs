//! Generation-model vocabulary shared by every slice.
//!
//! Model identifiers, base-model families, schedulers and the other
//! enum-constrained parameters. Values that arrive from outside the store
//! (model catalog responses, recalled metadata) are checked here before they
//! are assigned into typed state.

use crate::error::{StateError, StateResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Base models ─────────────────────────────────────────────────────────

/// Model family. Drives grid size, optimal dimension and which size
/// catalogs apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseModel {
    #[serde(rename = "sd-1")]
    Sd1,
    #[serde(rename = "sd-2")]
    Sd2,
    #[serde(rename = "sdxl")]
    Sdxl,
    #[serde(rename = "sdxl-refiner")]
    SdxlRefiner,
    #[serde(rename = "sd-3")]
    Sd3,
    #[serde(rename = "flux")]
    Flux,
    #[serde(rename = "flux-kontext")]
    FluxKontext,
    #[serde(rename = "cogview4")]
    CogView4,
    #[serde(rename = "imagen3")]
    Imagen3,
    #[serde(rename = "imagen4")]
    Imagen4,
    #[serde(rename = "chatgpt-4o")]
    ChatGpt4o,
    #[serde(rename = "gemini-2.5")]
    Gemini25,
    #[serde(rename = "any")]
    Any,
}

impl BaseModel {
    /// Hosted models that only accept a fixed set of output sizes.
    pub fn is_api(self) -> bool {
        matches!(
            self,
            Self::Imagen3 | Self::Imagen4 | Self::ChatGpt4o | Self::FluxKontext | Self::Gemini25
        )
    }

    /// Bases a canvas bbox may be sized for.
    pub fn is_main(self) -> bool {
        !matches!(self, Self::SdxlRefiner | Self::Any)
    }

    /// Highest CLIP skip the family supports. SDXL ignores CLIP skip.
    pub fn max_clip_skip(self) -> u32 {
        match self {
            Self::Sd1 => 12,
            Self::Sd2 => 24,
            _ => 0,
        }
    }
}

// ─── Model identifiers ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Main,
    Vae,
    T5Encoder,
    ClipEmbed,
    ControlLora,
    Lora,
}

/// Reference to an installed model, as stored in parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelIdentifier {
    pub key: String,
    pub hash: String,
    pub name: String,
    pub base: BaseModel,
    #[serde(rename = "type")]
    pub model_type: ModelType,
}

/// The parameter field a model identifier is being assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSlot {
    Main,
    Vae,
    FluxVae,
    T5Encoder,
    ClipEmbed,
    ClipLEmbed,
    ClipGEmbed,
    ControlLora,
    Refiner,
}

impl ModelSlot {
    fn field(self) -> &'static str {
        match self {
            Self::Main => "model",
            Self::Vae => "vae",
            Self::FluxVae => "fluxVAE",
            Self::T5Encoder => "t5EncoderModel",
            Self::ClipEmbed => "clipEmbedModel",
            Self::ClipLEmbed => "clipLEmbedModel",
            Self::ClipGEmbed => "clipGEmbedModel",
            Self::ControlLora => "controlLora",
            Self::Refiner => "refinerModel",
        }
    }
}

impl ModelIdentifier {
    pub fn new(key: &str, name: &str, base: BaseModel, model_type: ModelType) -> Self {
        Self {
            key: key.to_string(),
            hash: format!("blake3:{key}"),
            name: name.to_string(),
            base,
            model_type,
        }
    }

    /// Check that this identifier may be stored in `slot`.
    pub fn check(&self, slot: ModelSlot) -> StateResult<()> {
        if self.key.trim().is_empty() {
            return Err(StateError::invalid_value(slot.field(), "empty model key"));
        }
        let ok = match slot {
            ModelSlot::Main => self.model_type == ModelType::Main && self.base.is_main(),
            ModelSlot::Vae => self.model_type == ModelType::Vae && self.base != BaseModel::Flux,
            ModelSlot::FluxVae => self.model_type == ModelType::Vae && self.base == BaseModel::Flux,
            ModelSlot::T5Encoder => self.model_type == ModelType::T5Encoder,
            ModelSlot::ClipEmbed | ModelSlot::ClipLEmbed | ModelSlot::ClipGEmbed => {
                self.model_type == ModelType::ClipEmbed
            }
            ModelSlot::ControlLora => self.model_type == ModelType::ControlLora,
            ModelSlot::Refiner => {
                self.model_type == ModelType::Main && self.base == BaseModel::SdxlRefiner
            }
        };
        if ok {
            Ok(())
        } else {
            Err(StateError::invalid_value(
                slot.field(),
                format!("{:?} model `{}` ({:?}) not allowed here", self.model_type, self.key, self.base),
            ))
        }
    }
}

/// Validate an optional identifier. `None` is always accepted.
pub fn check_optional_model(model: Option<&ModelIdentifier>, slot: ModelSlot) -> StateResult<()> {
    model.map_or(Ok(()), |m| m.check(slot))
}

// ─── Schedulers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheduler {
    #[serde(rename = "ddim")]
    Ddim,
    #[serde(rename = "ddpm")]
    Ddpm,
    #[serde(rename = "deis")]
    Deis,
    #[serde(rename = "lms")]
    Lms,
    #[serde(rename = "pndm")]
    Pndm,
    #[serde(rename = "heun")]
    Heun,
    #[serde(rename = "euler")]
    Euler,
    #[serde(rename = "euler_k")]
    EulerK,
    #[serde(rename = "euler_a")]
    EulerA,
    #[serde(rename = "kdpm_2")]
    Kdpm2,
    #[serde(rename = "kdpm_2_a")]
    Kdpm2A,
    #[serde(rename = "dpmpp_2s")]
    Dpmpp2s,
    #[serde(rename = "dpmpp_2m")]
    Dpmpp2m,
    #[serde(rename = "dpmpp_2m_k")]
    Dpmpp2mK,
    #[serde(rename = "dpmpp_2m_sde")]
    Dpmpp2mSde,
    #[serde(rename = "dpmpp_3m")]
    Dpmpp3m,
    #[serde(rename = "dpmpp_3m_k")]
    Dpmpp3mK,
    #[serde(rename = "dpmpp_sde")]
    DpmppSde,
    #[serde(rename = "unipc")]
    Unipc,
    #[serde(rename = "lcm")]
    Lcm,
    #[serde(rename = "tcd")]
    Tcd,
}

impl Scheduler {
    pub const ALL: &'static [Scheduler] = &[
        Self::Ddim,
        Self::Ddpm,
        Self::Deis,
        Self::Lms,
        Self::Pndm,
        Self::Heun,
        Self::Euler,
        Self::EulerK,
        Self::EulerA,
        Self::Kdpm2,
        Self::Kdpm2A,
        Self::Dpmpp2s,
        Self::Dpmpp2m,
        Self::Dpmpp2mK,
        Self::Dpmpp2mSde,
        Self::Dpmpp3m,
        Self::Dpmpp3mK,
        Self::DpmppSde,
        Self::Unipc,
        Self::Lcm,
        Self::Tcd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ddim => "ddim",
            Self::Ddpm => "ddpm",
            Self::Deis => "deis",
            Self::Lms => "lms",
            Self::Pndm => "pndm",
            Self::Heun => "heun",
            Self::Euler => "euler",
            Self::EulerK => "euler_k",
            Self::EulerA => "euler_a",
            Self::Kdpm2 => "kdpm_2",
            Self::Kdpm2A => "kdpm_2_a",
            Self::Dpmpp2s => "dpmpp_2s",
            Self::Dpmpp2m => "dpmpp_2m",
            Self::Dpmpp2mK => "dpmpp_2m_k",
            Self::Dpmpp2mSde => "dpmpp_2m_sde",
            Self::Dpmpp3m => "dpmpp_3m",
            Self::Dpmpp3mK => "dpmpp_3m_k",
            Self::DpmppSde => "dpmpp_sde",
            Self::Unipc => "unipc",
            Self::Lcm => "lcm",
            Self::Tcd => "tcd",
        }
    }
}

impl FromStr for Scheduler {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|sch| sch.as_str() == s)
            .ok_or_else(|| StateError::invalid_value("scheduler", format!("unknown scheduler `{s}`")))
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Other enum-constrained parameters ───────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Fp16,
    Fp32,
}

impl FromStr for Precision {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fp16" => Ok(Self::Fp16),
            "fp32" => Ok(Self::Fp32),
            other => Err(StateError::invalid_value(
                "vaePrecision",
                format!("unknown precision `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoherenceMode {
    #[serde(rename = "Gaussian Blur")]
    GaussianBlur,
    #[serde(rename = "Box Blur")]
    BoxBlur,
    #[serde(rename = "Staged")]
    Staged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfillMethod {
    Lama,
    Patchmatch,
    Tile,
    Color,
    Cv2,
}

/// 8-bit RGB with a float alpha in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbaColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl RgbaColor {
    pub const BLACK: Self = Self::rgba(0, 0, 0, 1.0);
    pub const WHITE: Self = Self::rgba(255, 255, 255, 1.0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Overlay the channels present in `patch`.
    pub fn merged(self, patch: &RgbaPatch) -> Self {
        Self {
            r: patch.r.unwrap_or(self.r),
            g: patch.g.unwrap_or(self.g),
            b: patch.b.unwrap_or(self.b),
            a: patch.a.map_or(self.a, |a| a.clamp(0.0, 1.0)),
        }
    }
}

/// Partial color update; absent channels keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RgbaPatch {
    pub r: Option<u8>,
    pub g: Option<u8>,
    pub b: Option<u8>,
    pub a: Option<f32>,
}

//! Request/response DTOs for the `/sdapi/v1/*` surface (§6).

use serde::{Deserialize, Serialize};

/// A LoRA reference as it appears inline in a prompt: `<lora:NAME:WEIGHT>`
/// (§4.1 contract).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraRef {
    /// The LoRA's catalog name.
    pub name: String,
    /// The weight to apply, usually in `[0, 2]`.
    pub weight: f64,
}

impl LoraRef {
    /// Render as the engine's inline prompt syntax.
    #[must_use]
    pub fn to_prompt_fragment(&self) -> String {
        format!("<lora:{}:{:.3}>", self.name, self.weight)
    }
}

/// A `txt2img` request (§6 `/sdapi/v1/txt2img`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Txt2ImgRequest {
    /// The positive prompt, excluding LoRA tags (appended separately).
    pub prompt: String,
    /// The negative prompt.
    #[serde(default)]
    pub negative_prompt: String,
    /// LoRAs to activate, rendered into the prompt per §4.1.
    #[serde(default)]
    pub loras: Vec<LoraRef>,
    /// Sampling steps.
    pub steps: u32,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Sampler name as reported by `list_samplers`.
    pub sampler_name: String,
    /// Classifier-free guidance scale.
    pub cfg_scale: f64,
    /// Seed; `-1` requests a random seed from the engine.
    #[serde(default = "default_seed")]
    pub seed: i64,
}

fn default_seed() -> i64 {
    -1
}

impl Txt2ImgRequest {
    /// The full prompt sent on the wire: positive prompt followed by each
    /// LoRA's inline tag, in selection order (§4.1).
    #[must_use]
    pub fn wire_prompt(&self) -> String {
        let mut out = self.prompt.clone();
        for lora in &self.loras {
            out.push(' ');
            out.push_str(&lora.to_prompt_fragment());
        }
        out
    }
}

/// A decoded generation result.
#[derive(Debug, Clone)]
pub struct Txt2ImgResponse {
    /// Raw image bytes, one per requested batch item.
    pub images: Vec<Vec<u8>>,
    /// Engine-reported generation info (seed actually used, etc.).
    pub info: serde_json::Value,
}

/// A progress snapshot from `/sdapi/v1/progress`.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    /// Fraction complete, `[0, 1]`.
    pub progress: f64,
    /// Estimated seconds remaining, if the engine reports one.
    pub eta_seconds: Option<f64>,
    /// A preview image, if the engine returns live previews.
    pub current_image: Option<Vec<u8>>,
}

/// A model entry from `/sdapi/v1/sd-models`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelInfo {
    /// Display title.
    pub title: String,
    /// The checkpoint filename.
    pub model_name: String,
    /// Hash, when the engine computes one.
    #[serde(default)]
    pub hash: Option<String>,
}

/// A sampler entry from `/sdapi/v1/samplers`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SamplerInfo {
    /// Sampler name, as passed to `sampler_name` on txt2img.
    pub name: String,
}

/// A raw LoRA entry from `/sdapi/v1/loras`, before `sdforge-lora` derives
/// intelligence from it. `metadata` carries the engine's training-tag
/// frequency payload when present (§3 LoRA record, §4.2 ingestion).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawLoraInfo {
    /// The name the engine refers to it by (used in `<lora:NAME:WEIGHT>`).
    pub name: String,
    /// Alias, if the engine has one configured.
    #[serde(default)]
    pub alias: Option<String>,
    /// On-disk path, when reported.
    #[serde(default)]
    pub path: Option<String>,
    /// Opaque training metadata; shape is engine-specific, expected to
    /// contain a tag->count mapping per training bucket when present.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Per-class NudeNet detection thresholds (§6). `1.0` means "never censor"
/// for that class (§9 Open Question, codified as `>= 1.0 - f64::EPSILON`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensorThresholds {
    /// Face detection threshold.
    pub face: f64,
    /// Exposed breast threshold.
    pub exposed_breast: f64,
    /// Covered breast threshold.
    pub covered_breast: f64,
    /// Exposed buttocks threshold.
    pub exposed_buttocks: f64,
    /// Exposed genitalia threshold.
    pub exposed_genitalia: f64,
    /// Exposed feet threshold.
    pub exposed_feet: f64,
    /// Belly threshold.
    pub belly: f64,
    /// Armpits threshold.
    pub armpits: f64,
    /// Back threshold.
    pub back: f64,
    /// Threshold applied to any class not explicitly listed.
    pub default: f64,
}

impl CensorThresholds {
    /// Never censor anything — every class disabled.
    #[must_use]
    pub fn never() -> Self {
        Self {
            face: 1.0,
            exposed_breast: 1.0,
            covered_breast: 1.0,
            exposed_buttocks: 1.0,
            exposed_genitalia: 1.0,
            exposed_feet: 1.0,
            belly: 1.0,
            armpits: 1.0,
            back: 1.0,
            default: 1.0,
        }
    }

    /// Whether a threshold value means "never censor this class" (§9).
    #[must_use]
    pub fn is_disabled(value: f64) -> bool {
        value >= 1.0 - f64::EPSILON
    }
}

/// The masking filter applied to a region the detector flags (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Blur whose strength follows a radius curve.
    VariableBlur,
    /// Pixelation at a configured factor.
    Pixelation,
    /// Flat fill color.
    SolidFill,
}

/// The shape of the mask drawn over a flagged region (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskShape {
    /// Elliptical mask.
    Ellipse,
    /// Rectangular mask.
    Rectangle,
}

/// Full censor-pass configuration passed to the engine's extras pipeline
/// or script invocation (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensorConfig {
    /// Per-class detection thresholds.
    pub thresholds: CensorThresholds,
    /// Non-max suppression threshold for overlapping detections.
    pub nms_threshold: f64,
    /// Which filter to apply to flagged regions.
    pub filter_type: FilterType,
    /// Blur radius, used when `filter_type` is `VariableBlur`.
    pub blur_radius: f64,
    /// Pixelation factor, used when `filter_type` is `Pixelation`.
    pub pixelation_factor: u32,
    /// Fill color (`#rrggbb`), used when `filter_type` is `SolidFill`.
    pub fill_color: String,
    /// Mask shape.
    pub mask_shape: MaskShape,
    /// Blend radius at the mask edge.
    pub mask_blend_radius: f64,
    /// Rounding applied to rectangle corners.
    pub rectangle_rounding: f64,
    /// Factor by which the detected box is expanded before masking.
    pub expansion_factor: f64,
}

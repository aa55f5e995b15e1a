#![deny(missing_docs)]
//! A narrow, typed facade over the external Stable Diffusion HTTP engine
//! (§4.1 SDGateway). This crate is a pure client — it has no opinion about
//! scheduling, censoring policy, or where images end up; that's
//! `sdforge-queue`, `sdforge-lora`, and `sdforge-upload`.

mod client;
mod error;
mod types;

pub use client::SdGateway;
pub use types::{
    CensorConfig, CensorThresholds, FilterType, LoraRef, MaskShape, ModelInfo, ProgressSnapshot,
    RawLoraInfo, SamplerInfo, Txt2ImgRequest, Txt2ImgResponse,
};

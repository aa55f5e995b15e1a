#![deny(missing_docs)]
//! Composition root: environment configuration, component wiring, and
//! the `serve`/`discord` entrypoints (§6, §12 "binary wiring").

pub mod config;
pub mod pipeline;
pub mod wiring;

pub use config::Config;
pub use pipeline::UploadPipeline;
pub use wiring::App;

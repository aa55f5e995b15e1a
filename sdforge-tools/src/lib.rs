#![deny(missing_docs)]
//! The outward tool catalog consumed by the LLM host (§4.9 ToolSurface):
//! composes SDGateway, LoRACatalog, ContentClassifier, QueueEngine,
//! ConversationStore, and UploadRouter behind a flat tool registry.

mod orchestrate;
mod registry;
mod surface;

pub use registry::{tool_fn, ToolDyn, ToolRegistry};
pub use surface::ToolSurface;

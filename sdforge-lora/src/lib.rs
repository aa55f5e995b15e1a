#![deny(missing_docs)]
//! The LoRA intelligence layer (§4.2 LoRACatalog): a persistent,
//! queryable index of LoRAs with derived categorization, trigger-word
//! extraction, prompt scoring, conflict detection, and weight
//! optimization.

mod catalog;
mod conflicts;
mod scoring;
mod types;

pub use catalog::LoraCatalog;
pub use conflicts::{MAX_TOTAL_WEIGHT, STYLE_WEIGHT_LIMIT};
pub use scoring::{categorize, content_rating, prompt_tag_score, tokenize, trigger_words};
pub use types::{CatalogSummary, Conflict, LoraRecord, SearchHit, SelectedLora, Suggestion};

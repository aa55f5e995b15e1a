#![deny(missing_docs)]
//! Hierarchical content taxonomy, prompt safety scoring, and prompt
//! enhancement (§4.3 ContentClassifier).

mod store;
mod types;

pub use store::{ContentClassifier, AXES};
pub use types::{Analysis, ContentCategory, ContentWord, Match, SafetyAssessment};

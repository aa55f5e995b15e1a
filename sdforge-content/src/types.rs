//! Taxonomy and analysis types (§3 ContentCategory/ContentWord, §4.3).

use sdforge_types::SafetyLevel;

/// A node in the category forest (§3 ContentCategory).
#[derive(Debug, Clone, PartialEq)]
pub struct ContentCategory {
    /// Slash-delimited path, e.g. `subject/person/hair/color`.
    pub path: String,
    /// Parent path; must exist or be `None` (§3 invariant).
    pub parent_path: Option<String>,
    /// Free-text description.
    pub description: String,
}

/// A `(word, category_path)` mapping with a confidence weight (§3
/// ContentWord).
#[derive(Debug, Clone, PartialEq)]
pub struct ContentWord {
    /// The matched word or phrase, lowercase.
    pub word: String,
    /// The category this word maps to.
    pub category_path: String,
    /// Match confidence, `[0, 1]`.
    pub confidence: f64,
}

/// A single match found by `analyze` (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// The matched word or phrase.
    pub word: String,
    /// The category it matched under.
    pub category_path: String,
    /// Match confidence.
    pub confidence: f64,
}

/// The outcome of `analyze` (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// All matched words, in the order they were found.
    pub matched: Vec<Match>,
    /// Distinct category paths present among `matched`.
    pub categories_present: Vec<String>,
    /// Axes (style, quality, lighting, ...) with no match.
    pub missing_axes: Vec<String>,
    /// Safety triage.
    pub safety: SafetyAssessment,
}

/// Prompt safety triage (§4.3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyAssessment {
    /// Coarse level.
    pub level: SafetyLevel,
    /// Sum of confidences for nsfw-subtree matches, clamped to `1.0`.
    pub score: f64,
}

//! Persistent and query-surface types for the LoRA catalog (§3, §4.2).

use chrono::{DateTime, Utc};
use sdforge_types::{Confidence, ContentRating, LoraCategory};
use std::collections::HashMap;

/// A catalog LoRA record (§3 LoRA record).
#[derive(Debug, Clone, PartialEq)]
pub struct LoraRecord {
    /// Unique identifier, primary key.
    pub name: String,
    /// On-disk filename.
    pub filename: String,
    /// On-disk path.
    pub path: String,
    /// Optional display alias.
    pub alias: Option<String>,
    /// Derived category.
    pub category: LoraCategory,
    /// Derived content rating.
    pub content_type: ContentRating,
    /// Free-text description.
    pub description: String,
    /// Ordered trigger words, descending frequency then lexicographic.
    pub trigger_words: Vec<String>,
    /// Tag -> count across all training buckets.
    pub training_tag_frequency: HashMap<String, u64>,
    /// Recommended application weight, default `1.0`.
    pub recommended_weight: f64,
    /// First-seen timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-sync timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A LoRA selected for a generation, with its chosen weight (§4.2
/// validate_combination, optimize_weights).
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedLora {
    /// The catalog record's name.
    pub name: String,
    /// Category, denormalized here so conflict checks don't need a join.
    pub category: LoraCategory,
    /// The weight the caller intends to apply.
    pub weight: f64,
}

/// One ranked LoRA suggestion for a prompt (§4.2 suggest_for_prompt).
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// The suggested LoRA's name.
    pub name: String,
    /// Clamped `[0, 1]` relevance score.
    pub score: f64,
    /// Confidence bucket derived from `score`.
    pub confidence: Confidence,
    /// Tags whose token set overlapped the prompt.
    pub matching_tags: Vec<String>,
    /// The record's recommended weight.
    pub recommended_weight: f64,
}

/// A conflict detected by `validate_combination` (§4.2, §8 scenario 5).
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    /// The violated rule's identifier.
    pub rule: String,
    /// Human-readable explanation.
    pub message: String,
    /// Suggested remediation (e.g. which LoRA to drop or reweight).
    pub remediation: String,
}

/// A search or browse hit with its relevance score (§4.2 search).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The matched record.
    pub record: LoraRecord,
    /// Combined relevance score, `[0, 1]`.
    pub score: f64,
}

/// Totals returned by `summary()` (§4.2).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSummary {
    /// Total number of catalogued LoRAs.
    pub total: usize,
    /// Count by category.
    pub by_category: HashMap<LoraCategory, usize>,
    /// Top trigger words across the whole catalog, descending frequency.
    pub top_trigger_words: Vec<String>,
}

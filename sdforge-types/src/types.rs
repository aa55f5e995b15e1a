//! Small shared enums referenced across crate boundaries. Anything used by
//! only one crate lives there instead — this module is deliberately thin.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A LoRA's derived category (§3 LoRA record, §4.2 ingestion).
///
/// Tie-break order when two categories score equally in
/// `LoraCatalog::categorize` is this variant's declaration order:
/// character, anime, realistic, style, concept, general.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoraCategory {
    /// A specific named character.
    Character,
    /// Anime/illustration style.
    Anime,
    /// Photoreal style.
    Realistic,
    /// An art style not tied to a specific character.
    Style,
    /// An abstract concept, pose, or composition.
    Concept,
    /// Doesn't cleanly fit another bucket.
    General,
}

impl LoraCategory {
    /// All variants in tie-break priority order (§4.2).
    pub const TIE_BREAK_ORDER: [LoraCategory; 6] = [
        LoraCategory::Character,
        LoraCategory::Anime,
        LoraCategory::Realistic,
        LoraCategory::Style,
        LoraCategory::Concept,
        LoraCategory::General,
    ];

    /// Lower is preferred when scores tie.
    #[must_use]
    pub fn tie_break_rank(self) -> usize {
        Self::TIE_BREAK_ORDER
            .iter()
            .position(|c| *c == self)
            .unwrap_or(usize::MAX)
    }
}

impl std::fmt::Display for LoraCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Character => "character",
            Self::Anime => "anime",
            Self::Realistic => "realistic",
            Self::Style => "style",
            Self::Concept => "concept",
            Self::General => "general",
        };
        write!(f, "{s}")
    }
}

/// Content-safety rating derived from training tag frequency (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentRating {
    /// No explicit or suggestive markers above threshold.
    Safe,
    /// Suggestive markers above the lower threshold.
    Suggestive,
    /// Explicit markers above the higher threshold.
    Nsfw,
}

/// Prompt safety triage level (§4.3 ContentClassifier::analyze).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    /// No matched terms in the nsfw subtree.
    Safe,
    /// Some matched terms, below the explicit threshold.
    Moderate,
    /// Safety score crossed the explicit threshold.
    Explicit,
}

/// A suggestion-confidence bucket (§4.2 suggest_for_prompt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// score >= 0.5
    High,
    /// score >= 0.2
    Medium,
    /// score < 0.2
    Low,
}

impl Confidence {
    /// Bucket a clamped `[0, 1]` score (§8 scenario 1).
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.5 {
            Self::High
        } else if score >= 0.2 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Weight-optimization style preference (§4.2 optimize_weights).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StylePreference {
    /// 0.6x multiplier.
    Subtle,
    /// 1.0x multiplier.
    Balanced,
    /// 1.3x multiplier.
    Strong,
}

impl StylePreference {
    /// The multiplicative factor applied to each recommended weight (§4.2).
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Self::Subtle => 0.6,
            Self::Balanced => 1.0,
            Self::Strong => 1.3,
        }
    }
}

/// Queue job priority — lower value runs first (§3 Job, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority(pub i32);

impl Default for Priority {
    fn default() -> Self {
        Self(5)
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// A job's lifecycle state (§3 Job, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in the priority heap.
    Queued,
    /// Currently driving the SD engine.
    Running,
    /// Finished successfully; terminal.
    Completed,
    /// Finished with an error; terminal.
    Failed,
    /// Interrupted by `cancel`; terminal.
    Cancelled,
}

impl JobState {
    /// Terminal states never transition further (§3 Job lifecycle).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_tie_break_order_is_fixed() {
        assert_eq!(LoraCategory::Character.tie_break_rank(), 0);
        assert_eq!(LoraCategory::General.tie_break_rank(), 5);
        assert!(LoraCategory::Anime.tie_break_rank() < LoraCategory::Style.tie_break_rank());
    }

    #[test]
    fn confidence_buckets_match_spec_thresholds() {
        assert_eq!(Confidence::from_score(0.72), Confidence::High);
        assert_eq!(Confidence::from_score(0.5), Confidence::High);
        assert_eq!(Confidence::from_score(0.3), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.2), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.1), Confidence::Low);
    }

    #[test]
    fn style_preference_factors() {
        assert_eq!(StylePreference::Subtle.factor(), 0.6);
        assert_eq!(StylePreference::Balanced.factor(), 1.0);
        assert_eq!(StylePreference::Strong.factor(), 1.3);
    }

    #[test]
    fn priority_lower_value_sorts_first() {
        let mut v = vec![Priority(5), Priority(1), Priority(3)];
        v.sort();
        assert_eq!(v, vec![Priority(1), Priority(3), Priority(5)]);
    }

    #[test]
    fn job_state_terminality() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }
}

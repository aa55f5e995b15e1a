//! [`ContentClassifier`] — the hierarchical taxonomy plus prompt analysis
//! (§4.3). In-memory, behind a `RwLock` — the taxonomy is seed data
//! mutated rarely, so a relational store buys nothing here that a
//! guarded `HashMap` doesn't already give.

use std::collections::HashMap;

use sdforge_types::{SafetyLevel, SdForgeError};
use tokio::sync::RwLock;

use crate::types::{Analysis, ContentCategory, ContentWord, Match, SafetyAssessment};

/// Axes checked by `enhance`'s missing-axis detection (§4.3).
pub const AXES: &[&str] = &["style", "quality", "lighting", "composition"];

/// Canonical filler text appended per axis when `apply_suggestions` is
/// true (§4.3).
fn canonical_filler(axis: &str) -> &'static str {
    match axis {
        "quality" => "high quality, detailed",
        "lighting" => "cinematic lighting",
        "style" => "consistent art style",
        "composition" => "balanced composition",
        _ => "",
    }
}

/// The root path whose subtree counts toward the safety score (§4.3).
const NSFW_ROOT: &str = "content_filter/nsfw";

struct Taxonomy {
    categories: HashMap<String, ContentCategory>,
    words: Vec<ContentWord>,
}

/// Hierarchical category/word store plus prompt-level analysis (§4.3).
pub struct ContentClassifier {
    inner: RwLock<Taxonomy>,
}

impl ContentClassifier {
    /// Build a classifier with the built-in seed taxonomy installed.
    #[must_use]
    pub fn new() -> Self {
        let mut classifier = Self {
            inner: RwLock::new(Taxonomy {
                categories: HashMap::new(),
                words: Vec::new(),
            }),
        };
        classifier.seed();
        classifier
    }

    fn seed(&mut self) {
        let taxonomy = self.inner.get_mut();
        for (path, parent, description) in SEED_CATEGORIES {
            taxonomy.categories.insert(
                (*path).to_string(),
                ContentCategory {
                    path: (*path).to_string(),
                    parent_path: parent.map(str::to_string),
                    description: (*description).to_string(),
                },
            );
        }
        for (word, path, confidence) in SEED_WORDS {
            taxonomy.words.push(ContentWord {
                word: (*word).to_lowercase(),
                category_path: (*path).to_string(),
                confidence: *confidence,
            });
        }
    }

    /// Create or update a category path. Refuses when `parent_path` is
    /// `Some` but absent from the store (§3 invariant, §4.3).
    pub async fn add_category(
        &self,
        path: &str,
        parent_path: Option<&str>,
        description: &str,
    ) -> Result<(), SdForgeError> {
        let mut taxonomy = self.inner.write().await;
        if let Some(parent) = parent_path {
            if !taxonomy.categories.contains_key(parent) {
                return Err(SdForgeError::Validation(format!(
                    "parent category does not exist: {parent}"
                )));
            }
        }
        taxonomy.categories.insert(
            path.to_string(),
            ContentCategory {
                path: path.to_string(),
                parent_path: parent_path.map(str::to_string),
                description: description.to_string(),
            },
        );
        Ok(())
    }

    /// Add word->category mappings (§4.3). A word may appear under
    /// multiple categories (§3).
    pub async fn add_words(&self, words: Vec<ContentWord>) -> Result<(), SdForgeError> {
        let mut taxonomy = self.inner.write().await;
        for word in words {
            if !taxonomy.categories.contains_key(&word.category_path) {
                return Err(SdForgeError::Validation(format!(
                    "category does not exist: {}",
                    word.category_path
                )));
            }
            taxonomy.words.push(ContentWord {
                word: word.word.to_lowercase(),
                ..word
            });
        }
        Ok(())
    }

    /// Case-insensitive substring search over registered words (§4.3 CRUD).
    pub async fn search_words(&self, query: &str) -> Vec<ContentWord> {
        let taxonomy = self.inner.read().await;
        let query = query.to_lowercase();
        taxonomy
            .words
            .iter()
            .filter(|w| w.word.contains(&query))
            .cloned()
            .collect()
    }

    /// List registered categories, optionally restricted to a subtree
    /// rooted at `prefix` (inclusive) — §4.9 `get_content_categories`.
    pub async fn list_categories(&self, prefix: Option<&str>) -> Vec<ContentCategory> {
        let taxonomy = self.inner.read().await;
        taxonomy
            .categories
            .values()
            .filter(|c| prefix.is_none_or(|prefix| Self::descends_from(&c.path, prefix)))
            .cloned()
            .collect()
    }

    /// Whether `path` descends from `ancestor` (inclusive).
    fn descends_from(path: &str, ancestor: &str) -> bool {
        path == ancestor || path.starts_with(&format!("{ancestor}/"))
    }

    /// Match `text` against the word list, longest phrase first,
    /// case-insensitive whole-word (§4.3).
    fn find_matches(taxonomy: &Taxonomy, text: &str) -> Vec<Match> {
        let lower = text.to_lowercase();
        let mut candidates: Vec<&ContentWord> = taxonomy.words.iter().collect();
        // Longest-first: by token count then character length, so multi-word
        // phrases are tried before any single-word word they contain.
        candidates.sort_by(|a, b| {
            let a_len = (a.word.split_whitespace().count(), a.word.len());
            let b_len = (b.word.split_whitespace().count(), b.word.len());
            b_len.cmp(&a_len)
        });

        let mut matches = Vec::new();
        for word in candidates {
            if word_boundary_contains(&lower, &word.word) {
                matches.push(Match {
                    word: word.word.clone(),
                    category_path: word.category_path.clone(),
                    confidence: word.confidence,
                });
            }
        }
        matches
    }

    /// Analyze a prompt for category coverage and safety (§4.3).
    pub async fn analyze(&self, prompt: &str, negative_prompt: &str) -> Analysis {
        let taxonomy = self.inner.read().await;
        let combined = format!("{prompt} {negative_prompt}");
        let matched = Self::find_matches(&taxonomy, &combined);

        let mut categories_present: Vec<String> = matched
            .iter()
            .map(|m| m.category_path.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        categories_present.sort();

        let missing_axes: Vec<String> = AXES
            .iter()
            .filter(|axis| !categories_present.iter().any(|c| c.contains(*axis)))
            .map(|s| s.to_string())
            .collect();

        let safety_score: f64 = matched
            .iter()
            .filter(|m| Self::descends_from(&m.category_path, NSFW_ROOT))
            .map(|m| m.confidence)
            .sum::<f64>()
            .min(1.0);

        let level = if safety_score >= 0.5 {
            SafetyLevel::Explicit
        } else if safety_score > 0.0 {
            SafetyLevel::Moderate
        } else {
            SafetyLevel::Safe
        };

        Analysis {
            matched,
            categories_present,
            missing_axes,
            safety: SafetyAssessment { level, score: safety_score },
        }
    }

    /// Append canonical fillers for missing axes, and/or strip explicit
    /// tokens, per `apply_suggestions`/`safety_filter` (§4.3).
    pub async fn enhance(&self, prompt: &str, apply_suggestions: bool, safety_filter: bool) -> String {
        let analysis = self.analyze(prompt, "").await;
        let mut result = prompt.to_string();

        if safety_filter && analysis.safety.level == SafetyLevel::Explicit {
            let taxonomy = self.inner.read().await;
            for m in analysis
                .matched
                .iter()
                .filter(|m| Self::descends_from(&m.category_path, NSFW_ROOT))
            {
                result = strip_whole_word(&result, &m.word);
            }
            drop(taxonomy);
            result = format!("{} [safety-filtered]", result.trim());
        }

        if apply_suggestions {
            for axis in &analysis.missing_axes {
                let filler = canonical_filler(axis);
                if !filler.is_empty() {
                    result = format!("{}, {}", result.trim_end_matches(','), filler);
                }
            }
        }

        result
    }
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn word_boundary_contains(haystack_lower: &str, needle_lower: &str) -> bool {
    if needle_lower.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(offset) = haystack_lower[start..].find(needle_lower) {
        let match_start = start + offset;
        let match_end = match_start + needle_lower.len();
        let before_ok = match_start == 0
            || !haystack_lower.as_bytes()[match_start - 1].is_ascii_alphanumeric();
        let after_ok = match_end >= haystack_lower.len()
            || !haystack_lower.as_bytes()[match_end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return true;
        }
        start = match_start + 1;
    }
    false
}

fn strip_whole_word(text: &str, word: &str) -> String {
    let lower_text = text.to_lowercase();
    let lower_word = word.to_lowercase();
    if let Some(offset) = lower_text.find(&lower_word) {
        let mut out = text.to_string();
        out.replace_range(offset..offset + word.len(), "");
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        text.to_string()
    }
}

/// Built-in seed taxonomy installed on first init (§4.3).
const SEED_CATEGORIES: &[(&str, Option<&str>, &str)] = &[
    ("subject", None, "what the image depicts"),
    ("subject/person", Some("subject"), "a person or character"),
    ("subject/location", Some("subject"), "a setting or place"),
    ("style", None, "overall art style"),
    ("quality", None, "rendering quality descriptors"),
    ("lighting", None, "lighting descriptors"),
    ("composition", None, "framing and composition"),
    ("content_filter", None, "safety triage root"),
    ("content_filter/nsfw", Some("content_filter"), "explicit or suggestive content"),
    ("content_filter/nsfw/nudity", Some("content_filter/nsfw"), "nudity-related terms"),
];

/// Built-in seed words installed on first init (§4.3).
const SEED_WORDS: &[(&str, &str, f64)] = &[
    ("topless", "content_filter/nsfw/nudity", 0.9),
    ("nude", "content_filter/nsfw/nudity", 0.9),
    ("nudity", "content_filter/nsfw/nudity", 0.9),
    ("nsfw", "content_filter/nsfw", 0.95),
    ("explicit", "content_filter/nsfw", 0.8),
    ("lingerie", "content_filter/nsfw", 0.3),
    ("woman", "subject/person", 0.3),
    ("man", "subject/person", 0.3),
    ("beach", "subject/location", 0.3),
    ("anime style", "style", 0.5),
    ("high quality", "quality", 0.5),
    ("detailed", "quality", 0.4),
    ("cinematic lighting", "lighting", 0.5),
];

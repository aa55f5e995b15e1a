//! Pure scoring functions behind the LoRA catalog's derived intelligence
//! (§4.2). Kept free of I/O so they can be unit- and property-tested in
//! isolation from the store.

use std::collections::HashMap;

use sdforge_types::{Confidence, ContentRating, LoraCategory};

/// Tag patterns (substring match, case-insensitive) that vote for each
/// category. Order doesn't matter for scoring; ties fall back to
/// `LoraCategory::tie_break_rank` (§4.2).
const CATEGORY_PATTERNS: &[(LoraCategory, &[&str])] = &[
    (
        LoraCategory::Character,
        &["character", "oc ", "waifu", "protagonist"],
    ),
    (LoraCategory::Anime, &["anime", "manga", "1girl", "1boy", "chibi"]),
    (
        LoraCategory::Realistic,
        &["realistic", "photoreal", "photo", "real life"],
    ),
    (
        LoraCategory::Style,
        &["style", "aesthetic", "art style", "painting"],
    ),
    (
        LoraCategory::Concept,
        &["pose", "concept", "composition", "action"],
    ),
];

/// Generic tags filtered from trigger-word extraction (§4.2).
const STOP_WORDS: &[&str] = &[
    "1girl", "1boy", "solo", "looking at viewer", "simple background",
    "standing", "upper body", "full body",
];

/// Explicit-content marker tags used to derive `content_type` (§4.2,§3).
const EXPLICIT_MARKERS: &[&str] = &[
    "nsfw", "nude", "nudity", "explicit", "sex", "penis", "pussy", "cum",
];
/// Suggestive-content marker tags (a weaker signal than explicit).
const SUGGESTIVE_MARKERS: &[&str] = &["lingerie", "bikini", "cleavage", "underwear", "swimsuit"];

/// Share of total frequency above which content is rated `nsfw`.
pub const NSFW_THRESHOLD: f64 = 0.15;
/// Share of total frequency above which content is rated `suggestive`.
pub const SUGGESTIVE_THRESHOLD: f64 = 0.05;

/// How many trigger words `trigger_words` keeps, after stop-word filtering.
pub const TRIGGER_WORD_LIMIT: usize = 8;

/// Total training-tag frequency across all buckets.
#[must_use]
pub fn total_frequency(freq: &HashMap<String, u64>) -> u64 {
    freq.values().sum()
}

/// Derive a LoRA's category from its training tag frequency (§4.2).
///
/// The category with the highest normalized score (sum of matching tags'
/// share of total frequency) wins; ties break by
/// [`LoraCategory::tie_break_rank`]. Falls back to `General` when no
/// pattern matches and to the name/path heuristic when `freq` is empty.
#[must_use]
pub fn categorize(freq: &HashMap<String, u64>, name_or_path_hint: &str) -> LoraCategory {
    if freq.is_empty() {
        return categorize_from_hint(name_or_path_hint);
    }

    let total = total_frequency(freq).max(1) as f64;
    let mut best: Option<(LoraCategory, f64)> = None;

    for (category, patterns) in CATEGORY_PATTERNS {
        let score: f64 = freq
            .iter()
            .filter(|(tag, _)| {
                let lower = tag.to_lowercase();
                patterns.iter().any(|p| lower.contains(p))
            })
            .map(|(_, count)| *count as f64 / total)
            .sum();

        if score <= 0.0 {
            continue;
        }

        best = match best {
            None => Some((*category, score)),
            Some((best_cat, best_score)) => {
                if score > best_score
                    || (score == best_score && category.tie_break_rank() < best_cat.tie_break_rank())
                {
                    Some((*category, score))
                } else {
                    Some((best_cat, best_score))
                }
            }
        };
    }

    best.map(|(c, _)| c).unwrap_or(LoraCategory::General)
}

/// Name/path heuristic fallback when no training metadata is present
/// (§4.2: "fall back to name/path heuristics with the same output
/// alphabet").
#[must_use]
pub fn categorize_from_hint(hint: &str) -> LoraCategory {
    let lower = hint.to_lowercase();
    for (category, patterns) in CATEGORY_PATTERNS {
        if patterns.iter().any(|p| lower.contains(p)) {
            return *category;
        }
    }
    LoraCategory::General
}

/// Derive `content_type` from the explicit/suggestive marker share of
/// total frequency (§4.2, §3).
#[must_use]
pub fn content_rating(freq: &HashMap<String, u64>) -> ContentRating {
    if freq.is_empty() {
        return ContentRating::Safe;
    }
    let total = total_frequency(freq).max(1) as f64;

    let explicit_share: f64 = freq
        .iter()
        .filter(|(tag, _)| {
            let lower = tag.to_lowercase();
            EXPLICIT_MARKERS.iter().any(|m| lower.contains(m))
        })
        .map(|(_, c)| *c as f64 / total)
        .sum();

    if explicit_share > NSFW_THRESHOLD {
        return ContentRating::Nsfw;
    }

    let suggestive_share: f64 = freq
        .iter()
        .filter(|(tag, _)| {
            let lower = tag.to_lowercase();
            SUGGESTIVE_MARKERS.iter().any(|m| lower.contains(m))
        })
        .map(|(_, c)| *c as f64 / total)
        .sum();

    if suggestive_share > SUGGESTIVE_THRESHOLD {
        ContentRating::Suggestive
    } else {
        ContentRating::Safe
    }
}

/// Extract the top-N trigger words by frequency after filtering the stop
/// list, stable-ordered by descending frequency then lexicographic (§4.2).
#[must_use]
pub fn trigger_words(freq: &HashMap<String, u64>) -> Vec<String> {
    let mut entries: Vec<(&String, &u64)> = freq
        .iter()
        .filter(|(tag, _)| !STOP_WORDS.contains(&tag.to_lowercase().as_str()))
        .collect();

    entries.sort_by(|(tag_a, count_a), (tag_b, count_b)| {
        count_b.cmp(count_a).then_with(|| tag_a.cmp(tag_b))
    });

    entries
        .into_iter()
        .take(TRIGGER_WORD_LIMIT)
        .map(|(tag, _)| tag.clone())
        .collect()
}

/// Tokenize a prompt into a lowercase word set, splitting on whitespace
/// and punctuation but not digit/letter boundaries (§4.2
/// suggest_for_prompt).
#[must_use]
pub fn tokenize(prompt: &str) -> std::collections::HashSet<String> {
    prompt
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Split a tag into its component words, same boundary rule as
/// [`tokenize`], so multi-word tags like `"cat ears"` compare per-word.
fn tag_words(tag: &str) -> Vec<String> {
    tag.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Whether a tag overlaps the prompt's token set. Matches whole-word
/// equality, and also a training-tag convention where a leading digit is
/// a count prefix (`1girl`, `2boys`) against the bare noun (`girl`,
/// `boys`) — anime taggers emit the former, prompts are usually written
/// with the latter.
fn tag_overlaps_prompt(tag: &str, prompt_tokens: &std::collections::HashSet<String>) -> bool {
    tag_words(tag).iter().any(|word| {
        if prompt_tokens.contains(word) {
            return true;
        }
        let bare = word.trim_start_matches(|c: char| c.is_ascii_digit());
        !bare.is_empty() && bare != word && prompt_tokens.contains(bare)
    })
}

/// Score a LoRA's relevance to a prompt: for each `(tag, freq)` whose
/// token set overlaps the prompt's token set, add `freq / total_freq`,
/// clamped to `1.0` (§4.2, §8 scenario 1).
#[must_use]
pub fn prompt_tag_score(
    freq: &HashMap<String, u64>,
    prompt_tokens: &std::collections::HashSet<String>,
) -> (f64, Vec<String>) {
    let total = total_frequency(freq).max(1) as f64;
    let mut score = 0.0;
    let mut matching = Vec::new();

    for (tag, count) in freq {
        if tag_overlaps_prompt(tag, prompt_tokens) {
            score += *count as f64 / total;
            matching.push(tag.clone());
        }
    }

    matching.sort();
    (score.min(1.0), matching)
}

/// Bucket a clamped prompt-tag score into a confidence level (§4.2).
#[must_use]
pub fn confidence_for(score: f64) -> Confidence {
    Confidence::from_score(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn freq(pairs: &[(&str, u64)]) -> HashMap<String, u64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn prompt_scoring_matches_spec_scenario_1() {
        let f = freq(&[("anime", 500), ("1girl", 450), ("cat ears", 80), ("solo", 400)]);
        let tokens = tokenize("anime girl with cat ears");
        let (score, matching) = prompt_tag_score(&f, &tokens);
        assert!((score - 0.72027972).abs() < 1e-4);
        assert!(matching.contains(&"anime".to_string()));
        assert!(matching.contains(&"cat ears".to_string()));
        assert_eq!(confidence_for(score), Confidence::High);
    }

    #[test]
    fn categorize_picks_highest_normalized_score() {
        let f = freq(&[("character design", 10), ("anime", 1)]);
        assert_eq!(categorize(&f, ""), LoraCategory::Character);
    }

    #[test]
    fn categorize_falls_back_to_hint_when_freq_empty() {
        let f = HashMap::new();
        assert_eq!(categorize(&f, "my_anime_style_lora"), LoraCategory::Anime);
        assert_eq!(categorize(&f, "random_thing"), LoraCategory::General);
    }

    #[test]
    fn trigger_words_filters_stop_list_and_orders_stably() {
        let f = freq(&[
            ("1girl", 999),
            ("solo", 999),
            ("cat ears", 80),
            ("blue hair", 80),
            ("anime", 500),
        ]);
        let words = trigger_words(&f);
        assert_eq!(words, vec!["anime", "blue hair", "cat ears"]);
    }

    #[test]
    fn content_rating_thresholds() {
        let safe = freq(&[("anime", 100)]);
        assert_eq!(content_rating(&safe), ContentRating::Safe);

        let suggestive = freq(&[("anime", 90), ("bikini", 10)]);
        assert_eq!(content_rating(&suggestive), ContentRating::Suggestive);

        let nsfw = freq(&[("anime", 80), ("nsfw", 20)]);
        assert_eq!(content_rating(&nsfw), ContentRating::Nsfw);
    }

    #[test]
    fn sync_is_idempotent_given_identical_input() {
        let f = freq(&[("anime", 500), ("1girl", 450)]);
        let first = (categorize(&f, ""), content_rating(&f), trigger_words(&f));
        let second = (categorize(&f, ""), content_rating(&f), trigger_words(&f));
        assert_eq!(first, second);
    }
}

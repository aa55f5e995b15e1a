//! Conflict detection and weight optimization over a selected set of
//! LoRAs (§4.2 validate_combination, optimize_weights).

use sdforge_types::{LoraCategory, StylePreference};

use crate::types::{Conflict, SelectedLora};

/// Maximum total combined weight across non-concept LoRAs (§4.2 rule c).
pub const MAX_TOTAL_WEIGHT: f64 = 2.4;
/// Weight above which a second `style` LoRA is flagged (§4.2 rule b).
pub const STYLE_WEIGHT_LIMIT: f64 = 0.7;

/// Pairs of LoRA names that are never allowed together, regardless of
/// category (§4.2 rule d). A fixed list; in a full deployment this would
/// be data-driven, but the spec names it as an explicit deny list.
pub const EXPLICIT_DENY_PAIRS: &[(&str, &str)] = &[];

/// Detect conflicts in a selected set of LoRAs (§4.2, §8 scenario 5).
///
/// Returns one [`Conflict`] per violated rule; an empty vec means the
/// combination is valid.
#[must_use]
pub fn validate_combination(selected: &[SelectedLora]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    // Rule (a): at most one `character` LoRA.
    let characters: Vec<&SelectedLora> = selected
        .iter()
        .filter(|s| s.category == LoraCategory::Character)
        .collect();
    if characters.len() > 1 {
        let keep = characters
            .iter()
            .max_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(std::cmp::Ordering::Equal))
            .map(|s| s.name.clone())
            .unwrap_or_default();
        conflicts.push(Conflict {
            rule: "at-most-one-character".into(),
            message: format!(
                "selection contains {} character LoRAs: {}",
                characters.len(),
                characters.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
            ),
            remediation: format!("keep {keep} (highest weight for the active prompt) and drop the rest"),
        });
    }

    // Rule (b): at most one `style` LoRA with weight > 0.7.
    let heavy_styles: Vec<&SelectedLora> = selected
        .iter()
        .filter(|s| s.category == LoraCategory::Style && s.weight > STYLE_WEIGHT_LIMIT)
        .collect();
    if heavy_styles.len() > 1 {
        conflicts.push(Conflict {
            rule: "at-most-one-heavy-style".into(),
            message: format!(
                "{} style LoRAs exceed weight {STYLE_WEIGHT_LIMIT}: {}",
                heavy_styles.len(),
                heavy_styles.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
            ),
            remediation: format!("reduce all but one style LoRA to <= {STYLE_WEIGHT_LIMIT}"),
        });
    }

    // Rule (c): total combined weight across non-concept LoRAs <= 2.4.
    let total: f64 = selected
        .iter()
        .filter(|s| s.category != LoraCategory::Concept)
        .map(|s| s.weight)
        .sum();
    if total > MAX_TOTAL_WEIGHT {
        conflicts.push(Conflict {
            rule: "max-total-weight".into(),
            message: format!("combined non-concept weight {total:.2} exceeds {MAX_TOTAL_WEIGHT}"),
            remediation: "scale down weights proportionally or drop a LoRA".into(),
        });
    }

    // Rule (d): explicit pairwise deny list.
    for (a, b) in EXPLICIT_DENY_PAIRS {
        let has_a = selected.iter().any(|s| s.name == *a);
        let has_b = selected.iter().any(|s| s.name == *b);
        if has_a && has_b {
            conflicts.push(Conflict {
                rule: "explicit-deny-pair".into(),
                message: format!("{a} and {b} may not be combined"),
                remediation: format!("drop either {a} or {b}"),
            });
        }
    }

    conflicts
}

/// Apply a style-preference multiplier to each recommended weight,
/// clamped to `[min, max]` bounds (§4.2 optimize_weights).
#[must_use]
pub fn optimize_weights(
    recommended: &[(String, f64)],
    style_preference: StylePreference,
    min_weight: f64,
    max_weight: f64,
) -> Vec<(String, f64)> {
    let factor = style_preference.factor();
    recommended
        .iter()
        .map(|(name, weight)| {
            let optimized = (weight * factor).clamp(min_weight, max_weight);
            (name.clone(), optimized)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(name: &str, category: LoraCategory, weight: f64) -> SelectedLora {
        SelectedLora { name: name.into(), category, weight }
    }

    #[test]
    fn two_characters_always_conflict() {
        let selected = vec![
            sel("miku", LoraCategory::Character, 0.9),
            sel("zelda", LoraCategory::Character, 0.9),
        ];
        let conflicts = validate_combination(&selected);
        assert!(conflicts.iter().any(|c| c.rule == "at-most-one-character"));
    }

    #[test]
    fn removing_one_character_clears_conflict() {
        let selected = vec![sel("miku", LoraCategory::Character, 0.9)];
        assert!(validate_combination(&selected).is_empty());
    }

    #[test]
    fn total_weight_cap_excludes_concept_loras() {
        let selected = vec![
            sel("a", LoraCategory::General, 1.2),
            sel("b", LoraCategory::General, 1.3),
            sel("c", LoraCategory::Concept, 5.0),
        ];
        let conflicts = validate_combination(&selected);
        assert!(conflicts.iter().any(|c| c.rule == "max-total-weight"));
    }

    #[test]
    fn optimize_weights_applies_style_factor_and_clamps() {
        let recommended = vec![("a".to_string(), 1.0)];
        let subtle = optimize_weights(&recommended, StylePreference::Subtle, 0.0, 2.0);
        assert!((subtle[0].1 - 0.6).abs() < 1e-9);

        let strong_clamped = optimize_weights(&recommended, StylePreference::Strong, 0.0, 1.0);
        assert!((strong_clamped[0].1 - 1.0).abs() < 1e-9);
    }
}

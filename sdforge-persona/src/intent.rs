//! Image-intent detection: a small verb set plus a subject phrase,
//! checked with simple tokenized heuristics (§4.8 step 4).

const IMAGE_VERBS: &[&str] = &["generate", "draw", "render", "paint", "create", "make", "imagine"];

/// Explicit command prefix that always means image intent, regardless
/// of verb (§4.8 step 4).
const IMAGE_PREFIX: &str = "/image";

/// Words that don't count as a subject on their own — stripping them
/// from the tail of a verb phrase avoids false subjects like "draw me
/// an image" reporting `"an image"` instead of nothing useful.
const FILLER_WORDS: &[&str] = &["me", "an", "a", "the", "of", "please", "us", "for"];

fn tokenize(message: &str) -> Vec<String> {
    message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// If `message` expresses image-generation intent, return the subject
/// phrase to enhance and generate; otherwise `None`.
///
/// A bare verb with nothing left over ("can you draw?") doesn't count —
/// the algorithm requires a verb *and* a subject phrase.
#[must_use]
pub fn detect_image_intent(message: &str) -> Option<String> {
    if let Some(rest) = message.trim().strip_prefix(IMAGE_PREFIX) {
        let subject = rest.trim();
        return if subject.is_empty() { None } else { Some(subject.to_string()) };
    }

    let tokens = tokenize(message);
    let verb_index = tokens.iter().position(|t| IMAGE_VERBS.contains(&t.as_str()))?;

    // Working in token space (rather than splitting on whitespace) keeps
    // this aligned for hyphenated phrasing like "create-an-image", which
    // tokenizes the same as "create an image".
    let mut subject_tokens: Vec<&str> = tokens.iter().skip(verb_index + 1).map(String::as_str).collect();

    while let Some(first) = subject_tokens.first().copied() {
        if FILLER_WORDS.contains(&first) || first == "image" || first == "picture" {
            subject_tokens.remove(0);
        } else {
            break;
        }
    }

    let subject = subject_tokens.join(" ");
    if subject.is_empty() {
        None
    } else {
        Some(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_plain_verb_and_subject() {
        assert_eq!(detect_image_intent("draw a dragon over a mountain"), Some("dragon over a mountain".to_string()));
    }

    #[test]
    fn strips_filler_words_around_the_verb() {
        assert_eq!(detect_image_intent("please generate an image of a lighthouse"), Some("lighthouse".to_string()));
    }

    #[test]
    fn bare_verb_with_no_subject_is_not_intent() {
        assert_eq!(detect_image_intent("can you render"), None);
    }

    #[test]
    fn ordinary_chat_has_no_intent() {
        assert_eq!(detect_image_intent("what's the weather like today"), None);
    }

    #[test]
    fn hyphenated_create_an_image_phrasing_still_matches() {
        assert_eq!(detect_image_intent("create-an-image of a red fox"), Some("red fox".to_string()));
    }

    #[test]
    fn make_and_imagine_are_recognized_verbs() {
        assert_eq!(detect_image_intent("make a cup of coffee on a table"), Some("cup of coffee on a table".to_string()));
        assert_eq!(detect_image_intent("imagine a city floating in the clouds"), Some("city floating in the clouds".to_string()));
    }

    #[test]
    fn image_prefix_is_recognized_regardless_of_verb() {
        assert_eq!(detect_image_intent("/image a cat wearing sunglasses"), Some("a cat wearing sunglasses".to_string()));
    }

    #[test]
    fn bare_image_prefix_with_no_subject_is_not_intent() {
        assert_eq!(detect_image_intent("/image"), None);
    }
}

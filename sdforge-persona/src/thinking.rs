//! Strip internal reasoning delimiters from assistant replies before
//! they reach the user (§4.8 step 5).

/// Remove every `<think>...</think>` block some providers emit to show
/// their reasoning, collapsing the whitespace left behind. The full,
/// unfiltered reply is still what gets persisted to history — only the
/// user-facing text is filtered.
#[must_use]
pub fn strip_thinking(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("<think>") {
        result.push_str(&rest[..start]);
        rest = &rest[start + "<think>".len()..];
        match rest.find("</think>") {
            Some(end) => rest = &rest[end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    result.push_str(rest);

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

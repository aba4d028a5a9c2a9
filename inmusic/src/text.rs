use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Maximum summary length in characters, before the ellipsis.
pub const SUMMARY_MAX_CHARS: usize = 230;
pub const ELLIPSIS: &str = "...";

/// Decodes HTML entities, collapses whitespace runs to one space and trims.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let decoded = html_escape::decode_html_entities(raw);
    RE_WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

/// Replaces every tag with a space, then normalizes.
pub fn strip_tags(raw: &str) -> String {
    normalize(&RE_TAG.replace_all(raw, " "))
}

/// Normalizes the concatenation of text fragments (`" ".join(...)` of text nodes).
pub fn join_normalized<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    normalize(&parts.into_iter().collect::<Vec<_>>().join(" "))
}

/// Caps a summary at [`SUMMARY_MAX_CHARS`] characters without splitting a word.
///
/// Short input is returned unchanged. Longer input is cut at the last whitespace
/// at or before the cap and suffixed with `"..."`. A single word longer than the
/// cap is cut hard.
pub fn truncate_summary(summary: &str) -> String {
    let total = summary.chars().count();
    if total <= SUMMARY_MAX_CHARS {
        return summary.to_string();
    }

    let cut_byte = summary
        .char_indices()
        .nth(SUMMARY_MAX_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(summary.len());
    let head = &summary[..cut_byte];
    let next_is_space = summary[cut_byte..]
        .chars()
        .next()
        .is_some_and(char::is_whitespace);

    let kept = if next_is_space {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(i) => &head[..i],
            None => head,
        }
    };

    format!("{}{}", kept.trim_end(), ELLIPSIS)
}

//! Input cleaning and the message plausibility filter.
//!
//! The filter is a cascade of cheap checks, not a language model. Its
//! thresholds decide which messages are accepted for a paid video, so they
//! are kept exact.
//!
//! Lengths are counted in UTF-16 code units, the unit browsers use for
//! string length, so an emoji counts as two.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest value [`sanitize`] returns, in UTF-16 code units.
pub const MAX_SANITIZED_LEN: usize = 100;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Strips `<...>` tags, collapses whitespace and caps the length.
///
/// Idempotent: `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(input: &str) -> String {
    let without_tags = TAG.replace_all(input, "");
    let collapsed = WHITESPACE.replace_all(&without_tags, " ");
    let trimmed = collapsed.trim();

    // a surrogate pair straddling the limit is dropped whole
    let mut units = 0;
    let cut = trimmed.char_indices().find_map(|(index, c)| {
        units += c.len_utf16();
        (units > MAX_SANITIZED_LEN).then_some(index)
    });

    match cut {
        // cutting can expose a trailing space
        Some(cut) => trimmed[..cut].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Sanitizes a JSON field, treating anything but a string as empty.
pub fn sanitize_value(value: Option<&serde_json::Value>) -> String {
    value
        .and_then(serde_json::Value::as_str)
        .map(sanitize)
        .unwrap_or_default()
}

fn looks_nonsense(word: &str) -> bool {
    if !word.chars().any(|c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')) {
        return true;
    }

    let mut chars = word.chars();
    if let Some(first) = chars.next() {
        if word.chars().count() >= 3 && chars.all(|c| c == first) {
            return true;
        }
    }

    if utf16_len(word) > 12 {
        return true;
    }

    word.chars().any(|c| !c.is_ascii_alphabetic())
}

/// Returns `true` when `msg` should be rejected.
///
/// Checks run in order on the whitespace-collapsed message and the first
/// failing one rejects:
///
/// 1. fewer than 40 UTF-16 code units
/// 2. fewer than 10 ASCII letters
/// 3. more than 20% digits
/// 4. any one character above 25% of the length
/// 5. no space
/// 6. fewer than 6 words
/// 7. more than 40% nonsense words (no vowel, one repeated character,
///    longer than 12, or containing a non-letter)
/// 8. no `.`, `!`, `?` or `,` and fewer than 12 words
pub fn is_invalid_message(msg: &str) -> bool {
    let collapsed = WHITESPACE.replace_all(msg, " ");
    let m = collapsed.trim();
    let len = utf16_len(m);

    if len < 40 {
        return true;
    }

    let letters = m.chars().filter(char::is_ascii_alphabetic).count();
    if letters < 10 {
        return true;
    }

    let digits = m.chars().filter(char::is_ascii_digit).count();
    if digits as f64 / len as f64 > 0.2 {
        return true;
    }

    let mut freq = std::collections::HashMap::new();
    for c in m.chars() {
        *freq.entry(c).or_insert(0usize) += 1;
    }
    let max = freq.values().copied().max().unwrap_or(0);
    if max as f64 / len as f64 > 0.25 {
        return true;
    }

    if !m.contains(' ') {
        return true;
    }

    let words: Vec<&str> = m.split(' ').filter(|w| !w.is_empty()).collect();
    if words.len() < 6 {
        return true;
    }

    let nonsense = words
        .iter()
        .filter(|w| looks_nonsense(&w.to_lowercase()))
        .count();
    if nonsense as f64 / words.len() as f64 > 0.4 {
        return true;
    }

    let has_punctuation = m.chars().any(|c| matches!(c, '.' | '!' | '?' | ','));
    if !has_punctuation && words.len() < 12 {
        return true;
    }

    false
}

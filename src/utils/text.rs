//! Text helpers shared by templates, scripts and the loader.

use std::{borrow::Cow, ops::Range};

/// Characters dropped from generated slugs
const FORBIDDEN_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

// ============================================================================
// Escaping
// ============================================================================

pub fn html_escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}

/// Decode entities; text with an unknown entity is returned unchanged.
pub fn html_unescape(text: &str) -> String {
    quick_xml::escape::unescape(text)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| text.to_owned())
}

/// Percent-encode every segment of a `/`-separated path, keeping the separators.
pub fn url_encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment))
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Ranges
// ============================================================================

/// Resolve `[i, j)` over `len` items.
///
/// Negative `i` counts from the end, negative `j` counts from one past the end
/// (so `j = -1` means "through the last item"). Indices clamp instead of failing.
pub fn clamp_range(len: usize, i: i64, j: i64) -> Range<usize> {
    let n = len as i64;
    let i = if i < 0 { n.saturating_add(i) } else { i };
    let j = if j < 0 { n.saturating_add(j).saturating_add(1) } else { j };

    let start = i.min(n - 1).max(0) as usize;
    let end = j.min(n).max(0) as usize;
    start..end.max(start)
}

/// Character-based substring with [`clamp_range`] semantics.
pub fn substr(text: &str, i: i64, j: i64) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars[clamp_range(chars.len(), i, j)].iter().collect()
}

// ============================================================================
// Slugs
// ============================================================================

/// Lowercase, whitespace runs to `-`, path-hostile characters removed.
pub fn make_slug(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| !FORBIDDEN_CHARS.contains(c))
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

//! Query-centred previews of document text.

use crate::index::tokenize;

const ELLIPSIS: char = '…';

/// Build a preview of at most `max_chars` characters (plus ellipses).
///
/// The window is centred on the earliest occurrence of any query token in
/// `text`. If no token occurs, the preview is the head of the text.
/// Whitespace runs are collapsed so that indented tree output reads as one
/// line.
pub fn preview(text: &str, query: &str, max_chars: usize) -> String {
    let collapsed: Vec<char> = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .collect();

    if collapsed.len() <= max_chars {
        return collapsed.into_iter().collect();
    }

    let lowered: Vec<char> = collapsed
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();

    let hit = tokenize(query)
        .iter()
        .filter_map(|token| find_chars(&lowered, token))
        .min();

    let start = match hit {
        Some(pos) => pos.saturating_sub(max_chars / 3),
        None => 0,
    };
    let start = start.min(collapsed.len() - max_chars);
    let end = start + max_chars;

    let mut out = String::new();
    if start > 0 {
        out.push(ELLIPSIS);
    }
    out.extend(&collapsed[start..end]);
    if end < collapsed.len() {
        out.push(ELLIPSIS);
    }
    out
}

fn find_chars(haystack: &[char], needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_unchanged() {
        assert_eq!(preview("hello   world", "x", 50), "hello world");
    }

    #[test]
    fn test_window_contains_match() {
        let text = format!("{} reimbursement rules apply {}", "a ".repeat(200), "b ".repeat(200));
        let p = preview(&text, "Reimbursement", 60);
        assert!(p.contains("reimbursement"));
        assert!(p.starts_with('…'));
        assert!(p.ends_with('…'));
    }

    #[test]
    fn test_no_match_uses_head() {
        let text = "x".repeat(100);
        let p = preview(&text, "missing", 10);
        assert_eq!(p, format!("{}…", "x".repeat(10)));
    }

    #[test]
    fn test_multibyte_text() {
        let text = "café ".repeat(50);
        let p = preview(&text, "café", 12);
        assert_eq!(p.chars().filter(|c| *c != '…').count(), 12);
    }
}

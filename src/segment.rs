//! Sentence segmentation — first stage of the chunking pipeline.
//!
//! Text is whitespace-normalised and split after `.`, `!` or `?` when the
//! next word starts with an uppercase ASCII letter, or after a terminator at
//! the very end of the text.  Text with no such boundary falls back to
//! line-based splitting, then to a single unit.
//!
//! The uppercase look-ahead under-segments text made of lowercase-led
//! clauses or non-Latin scripts.  Those inputs still chunk correctly; they
//! just pack into fewer, longer sentences.

use once_cell::sync::Lazy;
use regex::Regex;

// ─────────────────────────────────────────────────────────────────────────────
// Patterns
// ─────────────────────────────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Terminator, whitespace, uppercase letter.  Group 1 is the whitespace the
/// text is split on; the terminator stays with the preceding sentence.
///
/// Plain `regex` runs in linear time, so a boundary megabytes into the text
/// is found as reliably as one near the start.
static RE_SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?](\s+)[A-Z]").unwrap());

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn ends_with_terminator(text: &str) -> bool {
    text.ends_with(|c: char| matches!(c, '.' | '!' | '?'))
}

/// Split normalised text at sentence boundaries.
///
/// Returns `None` when the text contains no boundary at all, so the caller
/// can fall back to line splitting.  A terminator at the very end of the
/// text counts as a boundary.
fn split_at_boundaries(text: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut last = 0;

    for caps in RE_SENTENCE_BOUNDARY.captures_iter(text) {
        let Some(gap) = caps.get(1) else { continue };
        parts.push(&text[last..gap.start()]);
        last = gap.end();
    }
    if parts.is_empty() && !ends_with_terminator(text) {
        return None;
    }
    parts.push(&text[last..]);

    Some(
        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Split `text` into an ordered list of sentence-like units.
///
/// Never returns empty strings, and never returns an empty list for input
/// that contains anything besides whitespace.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    if let Some(sentences) = split_at_boundaries(&normalized) {
        if !sentences.is_empty() {
            return sentences;
        }
    }

    // No punctuation boundary: one unit per non-blank line of the raw text.
    let lines: Vec<String> = text
        .lines()
        .map(normalize_whitespace)
        .filter(|l| !l.is_empty())
        .collect();
    if !lines.is_empty() {
        return lines;
    }

    vec![normalized]
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_sentences() {
        let s = split_into_sentences("Hello there. How are you? I am fine!");
        assert_eq!(s, vec!["Hello there.", "How are you?", "I am fine!"]);
    }

    #[test]
    fn test_whitespace_is_normalised() {
        let s = split_into_sentences("  One   sentence.\n\n\tTwo\t sentences.  ");
        assert_eq!(s, vec!["One sentence.", "Two sentences."]);
    }

    #[test]
    fn test_lowercase_continuation_not_split() {
        // "e.g. something" has no uppercase after the period
        let s = split_into_sentences("Use a tool, e.g. a hammer. Then stop.");
        assert_eq!(s, vec!["Use a tool, e.g. a hammer.", "Then stop."]);
    }

    #[test]
    fn test_unterminated_tail_kept() {
        let s = split_into_sentences("First one. Second without end");
        assert_eq!(s, vec!["First one.", "Second without end"]);
    }

    #[test]
    fn test_line_fallback_without_punctuation() {
        let s = split_into_sentences("chapter one\n\n  the beginning  \nthe end");
        assert_eq!(s, vec!["chapter one", "the beginning", "the end"]);
    }

    #[test]
    fn test_single_unit_fallback() {
        let s = split_into_sentences("   just some words with no ending   ");
        assert_eq!(s, vec!["just some words with no ending"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_into_sentences("").is_empty());
        assert!(split_into_sentences(" \n\t ").is_empty());
    }

    #[test]
    fn test_no_empty_elements() {
        for text in ["A. B. C.", "Wow!! Really?? Yes.", "...", "x\n\n\ny", "Ünïcode. Ok."] {
            let s = split_into_sentences(text);
            assert!(!s.is_empty(), "no sentences for {:?}", text);
            assert!(s.iter().all(|p| !p.is_empty()), "empty part in {:?}", s);
        }
    }

    #[test]
    fn test_rejoin_matches_normalised_input() {
        let inputs = [
            "Hello there. How are you?\nI am fine!  Thanks.",
            "no terminal punctuation\nacross two lines",
            "Mixed case. lowercase follows. Upper Follows!",
            "  leading and trailing   ",
            "Numbers 3.14 stay. Together.",
        ];
        for text in inputs {
            let joined = split_into_sentences(text).join(" ");
            assert_eq!(joined, normalize_whitespace(text), "input {:?}", text);
        }
    }

    #[test]
    fn test_boundary_far_into_text() {
        // The only split point sits more than 1 MB in: every filler sentence
        // is lowercase-led, so nothing before "End" is a boundary.
        let filler = "abc def. ".repeat(120_000);
        let text = format!("Start here. {}End now.", filler);
        assert!(text.len() > 1_000_000);
        let s = split_into_sentences(&text);
        assert_eq!(s.len(), 2);
        assert!(s[0].starts_with("Start here. abc def."));
        assert!(s[0].ends_with("abc def."));
        assert_eq!(s[1], "End now.");
    }

    #[test]
    fn test_far_boundary_does_not_fall_back_to_lines() {
        let filler = "abc def.\n".repeat(120_000);
        let text = format!("Start here. {}End now.", filler);
        let s = split_into_sentences(&text);
        assert_eq!(s.len(), 2);
        assert_eq!(s[1], "End now.");
    }

    #[test]
    fn test_only_trailing_terminator_is_one_sentence() {
        let s = split_into_sentences("all lowercase here\nstill lowercase.");
        assert_eq!(s, vec!["all lowercase here still lowercase."]);
    }
}

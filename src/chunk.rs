//! Chunk builder — packs sentences into synthesis-safe chunks.
//!
//! Chunks never split a sentence, except when one sentence alone exceeds the
//! budget; that sentence is force-split at word boundaries.  A single word
//! longer than the budget is emitted whole, so the bound can be exceeded in
//! that one degenerate case.
//!
//! Lengths are counted in `char`s, not bytes.

use crate::segment::split_into_sentences;

/// Default per-chunk character budget.
///
/// About 400–500 tokens of English, which keeps each call comfortably under
/// the 510-token context of small ONNX TTS models.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1500;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Force-split an oversized sentence at word boundaries.
///
/// Each piece is as long as possible without exceeding `max_len`.
fn split_long_sentence(sentence: &str, max_len: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in sentence.split_whitespace() {
        let word_len = char_len(word);
        if !current.is_empty() && current_len + 1 + word_len > max_len {
            pieces.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Split `text` into ordered chunks of at most `max_chars` characters.
///
/// Joining the chunks with single spaces gives back the whitespace-normalised
/// input, with nothing lost or duplicated.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    // Length of `current` joined with single spaces.
    let mut current_len = 0;

    for sentence in split_into_sentences(text) {
        let sentence_len = char_len(&sentence);

        if sentence_len > max_chars {
            if !current.is_empty() {
                chunks.push(current.join(" "));
                current.clear();
                current_len = 0;
            }
            chunks.extend(split_long_sentence(&sentence, max_chars));
            continue;
        }

        if !current.is_empty() && current_len + 1 + sentence_len > max_chars {
            chunks.push(current.join(" "));
            current.clear();
            current_len = 0;
        }
        if !current.is_empty() {
            current_len += 1;
        }
        current_len += sentence_len;
        current.push(sentence);
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::normalize_whitespace;

    const PROSE: &str = "It was a bright cold day in April. The clocks were striking thirteen. \
        Winston Smith slipped quickly through the glass doors! Was it too late? \
        A kind of gritty dust entered along with him, and the hallway smelt of boiled cabbage \
        and old rag mats, at one end of which a coloured poster had been tacked to the wall.";

    #[test]
    fn test_one_sentence_per_chunk() {
        assert_eq!(chunk_text("A. B. C.", 2), vec!["A.", "B.", "C."]);
    }

    #[test]
    fn test_sentences_packed_together() {
        assert_eq!(chunk_text("A. B. C.", 5), vec!["A. B.", "C."]);
        assert_eq!(chunk_text("A. B. C.", 8), vec!["A. B. C."]);
    }

    #[test]
    fn test_no_sentences_single_chunk() {
        let c = chunk_text("  a run of words with nothing to end it  ", DEFAULT_MAX_CHUNK_CHARS);
        assert_eq!(c, vec!["a run of words with nothing to end it"]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 100).is_empty());
        assert!(chunk_text("   \n ", 100).is_empty());
    }

    #[test]
    fn test_chunk_bound_respected() {
        for max in [10, 25, 40, 80, 200] {
            for chunk in chunk_text(PROSE, max) {
                let single_word = !chunk.contains(' ');
                assert!(
                    chunk.chars().count() <= max || single_word,
                    "chunk {:?} exceeds {}",
                    chunk,
                    max
                );
            }
        }
    }

    #[test]
    fn test_rejoin_is_lossless() {
        for max in [10, 25, 40, 80, 200, DEFAULT_MAX_CHUNK_CHARS] {
            let joined = chunk_text(PROSE, max).join(" ");
            assert_eq!(joined, normalize_whitespace(PROSE), "max {}", max);
        }
    }

    #[test]
    fn test_sentences_not_split() {
        let max = 80;
        let sentences = split_into_sentences(PROSE);
        let chunks = chunk_text(PROSE, max);
        for sentence in sentences.iter().filter(|s| s.chars().count() <= max) {
            assert!(
                chunks.iter().any(|c| c.contains(sentence.as_str())),
                "sentence {:?} was split across chunks",
                sentence
            );
        }
    }

    #[test]
    fn test_long_sentence_flushes_accumulator_first() {
        let text = "Short one. This sentence is definitely longer than twenty chars.";
        let c = chunk_text(text, 20);
        assert_eq!(c[0], "Short one.");
        assert!(c.len() > 2);
        assert!(c[1..].iter().all(|p| p.chars().count() <= 20));
    }

    #[test]
    fn test_oversized_word_emitted_whole() {
        let c = chunk_text("tiny supercalifragilisticexpialidocious end", 10);
        assert_eq!(c, vec!["tiny", "supercalifragilisticexpialidocious", "end"]);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        // 13 chars, 23 bytes
        let c = chunk_text("Ёжики. Ёжики.", 13);
        assert_eq!(c, vec!["Ёжики. Ёжики."]);
    }

    #[test]
    fn test_split_long_sentence() {
        let long = "word ".repeat(200);
        let pieces = split_long_sentence(long.trim(), 400);
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| p.len() <= 400));
    }
}

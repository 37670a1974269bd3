//! Semantic text chunking.
//!
//! Splits a text blob into delivery-sized pieces, preferring natural
//! boundaries over hard cuts: paragraph breaks first, then sentence ends,
//! then single spaces, and only as a last resort an exact-size cut (long
//! unbroken tokens such as URLs or code).

// Boundary qualification thresholds, as a fraction of the target size.
// A paragraph or sentence break counts from the halfway mark; a plain
// space only from 70% so short words near the start don't produce
// needlessly small chunks.
const SEMANTIC_MIN_NUM: usize = 1;
const SEMANTIC_MIN_DEN: usize = 2;
const SPACE_MIN_NUM: usize = 7;
const SPACE_MIN_DEN: usize = 10;

/// Split `text` into pieces of at most `target_size` characters.
///
/// Pieces are trimmed of boundary whitespace; empty pieces are dropped, so
/// empty or whitespace-only input yields an empty vec. Sizes are counted
/// in characters and cuts always land on character boundaries.
///
/// # Panics
///
/// Panics if `target_size` is zero; configuration validation rejects that
/// value before it can reach here.
#[must_use]
pub fn chunk(text: &str, target_size: usize) -> Vec<String> {
    assert!(target_size > 0, "chunk target size must be greater than zero");

    let mut chunks = Vec::new();
    let mut remaining = text.trim();

    loop {
        // Byte offset of the first character past the target, if any.
        let Some(limit) = char_offset(remaining, target_size) else {
            // Whatever is left fits in one piece.
            if !remaining.is_empty() {
                chunks.push(remaining.to_string());
            }
            break;
        };

        let cut = find_break(remaining, limit, target_size);
        let piece = remaining[..cut].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        remaining = remaining[cut..].trim_start();
    }

    chunks
}

/// Pick the best cut position (byte offset) within `s[..limit]`.
fn find_break(s: &str, limit: usize, target_size: usize) -> usize {
    let window = &s[..limit];
    let semantic_min =
        char_offset(s, target_size * SEMANTIC_MIN_NUM / SEMANTIC_MIN_DEN).unwrap_or(0);

    // Paragraph boundary: cut before the blank line.
    if let Some(pos) = window.rfind("\n\n")
        && pos >= semantic_min
    {
        return pos;
    }

    // Sentence boundary: cut just after the terminator, keeping it with
    // the sentence.
    if let Some(pos) = rfind_sentence_end(window)
        && pos >= semantic_min
    {
        return pos;
    }

    // Word boundary: a single space late enough in the window.
    let space_min = char_offset(s, target_size * SPACE_MIN_NUM / SPACE_MIN_DEN).unwrap_or(0);
    if let Some(pos) = window.rfind(' ')
        && pos >= space_min
    {
        return pos;
    }

    // Hard cut at exactly the target size.
    limit
}

/// Byte offset just past the last sentence terminator that is followed by
/// whitespace (`. `, `! `, `? `, or newline variants), if any.
fn rfind_sentence_end(window: &str) -> Option<usize> {
    let bytes = window.as_bytes();
    let mut best = None;
    for (i, b) in bytes.iter().enumerate() {
        if matches!(b, b'.' | b'!' | b'?')
            && let Some(next) = bytes.get(i + 1)
            && next.is_ascii_whitespace()
        {
            best = Some(i + 1);
        }
    }
    best
}

/// Byte offset of the `chars`-th character of `s`, or `None` when `s` has
/// no more than `chars` characters.
fn char_offset(s: &str, chars: usize) -> Option<usize> {
    s.char_indices().nth(chars).map(|(i, _)| i)
}

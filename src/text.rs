//! Character-budget text wrapping

use crate::constants::CONTINUATION_MARKER;
use tracing::trace;

/// Break text into lines of at most `max_chars` characters.
///
/// Explicit newlines are preserved (consecutive newlines produce empty
/// output lines). Within a paragraph, whitespace-delimited words are
/// packed greedily; a single word longer than the budget is hard-split
/// into chunks of `max_chars - 1` characters with a continuation marker
/// appended to every chunk but the last.
///
/// Empty input yields `[""]`, never an empty vector, so callers can
/// always index line 0.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }

    let max_chars = max_chars.max(2);
    let mut all_lines = Vec::new();

    for segment in text.split('\n') {
        let words: Vec<&str> = segment.split_whitespace().collect();

        // Empty or whitespace-only segments become empty lines
        if words.is_empty() {
            all_lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0usize;

        for word in words {
            let word_len = word.chars().count();

            if word_len > max_chars {
                if !current.is_empty() {
                    all_lines.push(std::mem::take(&mut current));
                }

                // Hard-split: max_chars - 1 characters plus the marker
                let chunk = max_chars - 1;
                let chars: Vec<char> = word.chars().collect();
                let mut idx = 0;
                while chars.len() - idx > max_chars {
                    let mut piece: String = chars[idx..idx + chunk].iter().collect();
                    piece.push(CONTINUATION_MARKER);
                    all_lines.push(piece);
                    idx += chunk;
                }
                current = chars[idx..].iter().collect();
                current_len = chars.len() - idx;
            } else if current.is_empty() {
                current = word.to_string();
                current_len = word_len;
            } else if current_len + 1 + word_len <= max_chars {
                current.push(' ');
                current.push_str(word);
                current_len += 1 + word_len;
            } else {
                all_lines.push(std::mem::replace(&mut current, word.to_string()));
                current_len = word_len;
            }
        }

        if !current.is_empty() {
            all_lines.push(current);
        }
    }

    if all_lines.is_empty() {
        all_lines.push(String::new());
    }

    trace!("Wrapped text into {} lines", all_lines.len());
    all_lines
}

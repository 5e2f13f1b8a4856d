//! Recursive character text splitter.
//!
//! Splits text on the first separator from a priority list that occurs in
//! it (paragraph break, line break, sentence end, comma, space, then single
//! characters), merges the pieces back into chunks of at most `chunk_size`
//! characters and carries up to `chunk_overlap` characters of trailing
//! pieces into the next chunk. Pieces still longer than `chunk_size` are
//! split again with the remaining separators.
//!
//! Separators stay attached to the start of the piece that follows them, so
//! joining consecutive pieces reproduces the original text. Lengths are
//! counted in `char`s, not bytes.

use std::collections::VecDeque;

use crate::config::ChunkingConfig;

/// Separators tried in order; `""` means "split into characters".
pub const DEFAULT_SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", ", ", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split `text` into trimmed, non-empty chunks. Empty input yields none.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let chunks = self.split_recursive(text, &self.separators);
        tracing::debug!(chunks = chunks.len(), "split text");
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, remaining) = pick_separator(text, separators);
        let pieces = split_keeping_separator(text, separator);

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }

            if !small.is_empty() {
                chunks.extend(self.merge_pieces(&small));
                small.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !small.is_empty() {
            chunks.extend(self.merge_pieces(&small));
        }

        chunks
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        total,
                        chunk_size = self.chunk_size,
                        "created a chunk longer than the configured size"
                    );
                }
                if !window.is_empty() {
                    if let Some(doc) = join_window(&window) {
                        docs.push(doc);
                    }
                    // Drop leading pieces until only the overlap remains and
                    // the incoming piece fits.
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        let Some(front) = window.pop_front() else {
                            break;
                        };
                        total -= char_len(front);
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        if let Some(doc) = join_window(&window) {
            docs.push(doc);
        }

        docs
    }
}

/// First separator present in `text`, plus the finer separators after it.
fn pick_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return ("", &[]);
        }
        if text.contains(sep.as_str()) {
            return (sep.as_str(), &separators[i + 1..]);
        }
    }
    (
        separators.last().map(String::as_str).unwrap_or_default(),
        &[],
    )
}

/// Split so each separator occurrence begins the following piece.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        pieces.push(&text[start..pos]);
        start = pos;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

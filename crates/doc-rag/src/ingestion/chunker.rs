//! Text chunking with page and position tracking
//!
//! Windows are measured in characters (Unicode scalar values). Each window
//! ends at the best boundary found in its second half: a paragraph break,
//! then a sentence boundary, then a word boundary, falling back to a hard
//! cut. The next window starts `chunk_overlap` characters before the end of
//! the previous chunk, moved back to the start of the word it lands in.

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkSource, FileType, Segment};

/// Lookahead past the window so sentence rules can see the next character
const SENTENCE_LOOKAHEAD: usize = 16;

/// A chunk of text with its character span within the source segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
}

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Overlap between consecutive chunks
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk size must be positive".into()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Chunk every segment of a loaded document
    ///
    /// `first_index` is the batch-wide index given to the first chunk; the
    /// rest follow consecutively across segments.
    pub fn chunk_document(
        &self,
        filename: &str,
        file_type: FileType,
        segments: &[Segment],
        first_index: u32,
    ) -> Vec<Chunk> {
        let total_pages = segments.len() as u32;
        let mut chunks = Vec::new();
        let mut chunk_index = first_index;

        for segment in segments {
            for span in self.split_text(&segment.text) {
                let source = ChunkSource {
                    filename: filename.to_string(),
                    file_type,
                    page_number: segment.number,
                    total_pages,
                };
                chunks.push(Chunk::new(
                    span.text,
                    source,
                    chunk_index,
                    span.char_start,
                    span.char_end,
                ));
                chunk_index += 1;
            }
        }

        chunks
    }

    /// Split text into overlapping spans
    ///
    /// Every span ends strictly after the previous one, so no span repeats
    /// only text that was already emitted.
    pub fn split_text(&self, text: &str) -> Vec<TextSpan> {
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let mut spans = Vec::new();

        let mut start = skip_whitespace(&chars, 0);
        let mut prev_end = 0;
        while start < n {
            let hard = (start + self.chunk_size).min(n);
            let end = if hard == n {
                n
            } else {
                // The span must reach past the overlap and past the previous span
                let floor = skip_whitespace(&chars, (start + self.overlap).max(prev_end)) + 1;
                self.find_break(&chars, start, hard, floor)
            };

            let mut trimmed_end = end;
            while trimmed_end > start && chars[trimmed_end - 1].is_whitespace() {
                trimmed_end -= 1;
            }

            spans.push(TextSpan {
                text: chars[start..trimmed_end].iter().collect(),
                char_start: start,
                char_end: trimmed_end,
            });

            let next_text = skip_whitespace(&chars, trimmed_end);
            if end >= n || next_text >= n {
                break;
            }

            start = self.next_start(&chars, start, trimmed_end, next_text);
            prev_end = trimmed_end;
        }

        spans
    }

    /// Pick where the window `[start, hard)` should end
    ///
    /// `floor` is the earliest acceptable end; past it the latest paragraph
    /// break wins, then sentence boundary, then word boundary, else `hard`.
    fn find_break(&self, chars: &[char], start: usize, hard: usize, floor: usize) -> usize {
        let preferred = floor.max(start + self.chunk_size / 2);

        if preferred <= hard {
            if let Some(b) = (preferred..=hard)
                .rev()
                .find(|&b| b >= start + 2 && chars[b - 1] == '\n' && chars[b - 2] == '\n')
            {
                return b;
            }

            if let Some(b) = sentence_break(chars, start, hard, preferred) {
                return b;
            }
        }

        (floor..=hard)
            .rev()
            .find(|&b| chars[b - 1].is_whitespace() && !chars[b].is_whitespace())
            .unwrap_or(hard)
    }

    /// Start of the window after the span `[start, end)`
    ///
    /// Lands `overlap` characters before `end`, preferably on a word start,
    /// close enough that the next window can reach `next_text`.
    fn next_start(&self, chars: &[char], start: usize, end: usize, next_text: usize) -> usize {
        if self.overlap == 0 {
            return next_text;
        }

        let target = end.saturating_sub(self.overlap);
        let lo = start.max((next_text + 1).saturating_sub(self.chunk_size));
        if lo > target {
            return next_text;
        }

        let word_floor = (lo + 1).max(target.saturating_sub(self.overlap));
        (word_floor..=target)
            .rev()
            .find(|&p| !chars[p].is_whitespace() && chars[p - 1].is_whitespace())
            .or_else(|| (lo..=target).rev().find(|&p| !chars[p].is_whitespace()))
            .unwrap_or(next_text)
    }
}

/// Latest sentence start within `[lo, hard]`
fn sentence_break(chars: &[char], start: usize, hard: usize, lo: usize) -> Option<usize> {
    let window_end = (hard + SENTENCE_LOOKAHEAD).min(chars.len());
    let window: String = chars[start..window_end].iter().collect();

    let mut best = None;
    let mut char_pos = 0usize;
    let mut byte_pos = 0usize;
    for (byte_idx, _) in window.split_sentence_bound_indices() {
        char_pos += window[byte_pos..byte_idx].chars().count();
        byte_pos = byte_idx;

        let b = start + char_pos;
        if b > hard {
            break;
        }
        if b >= lo {
            best = Some(b);
        }
    }
    best
}

fn skip_whitespace(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    pos
}

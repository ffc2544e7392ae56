//! Overlapping fixed-width chunking of note bodies.
//!
//! A body is cut into windows of at most `chunk_size` characters. Each window
//! after the first starts exactly `overlap` characters before the end of the
//! previous one, so the body is recovered by keeping the first window whole
//! and dropping the leading `overlap` characters of every later window.
//!
//! Window ends are pulled back to a sentence end, or failing that to
//! whitespace, when one lies within a quarter of the window of the hard edge.
//! Otherwise the window is cut hard at `chunk_size`.

use crate::error::{QuillError, Result};
use crate::model::{Fragment, FragmentId};
use std::ops::Range;

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    /// # Errors
    ///
    /// Returns [`QuillError::InvalidConfig`] if `chunk_size` is zero or
    /// `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(QuillError::InvalidConfig(
                "chunk_size must be greater than 0".into(),
            ));
        }
        if overlap >= chunk_size {
            return Err(QuillError::InvalidConfig(format!(
                "chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub const fn overlap(&self) -> usize {
        self.overlap
    }

    const fn tolerance(&self) -> usize {
        let quarter = self.chunk_size / 4;
        if quarter == 0 { 1 } else { quarter }
    }
}

/// Split `text` into fragments owned by `note_id`.
///
/// # Errors
///
/// Returns [`QuillError::InvalidConfig`] for unusable parameters.
pub fn chunk(
    note_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Fragment>> {
    let params = ChunkParams::new(chunk_size, overlap)?;
    Ok(chunk_with(note_id, text, params))
}

/// Split `text` with already-validated parameters.
#[must_use]
pub fn chunk_with(note_id: &str, text: &str, params: ChunkParams) -> Vec<Fragment> {
    let chars: Vec<char> = text.chars().collect();
    window_spans(&chars, params)
        .into_iter()
        .enumerate()
        .map(|(seq, span)| Fragment {
            id: FragmentId::new(note_id, seq),
            text: chars[span.clone()].iter().collect(),
            char_start: span.start,
            char_len: span.len(),
        })
        .collect()
}

/// Rebuild the original body from an ordered fragment sequence.
#[must_use]
pub fn reconstruct(fragments: &[Fragment], overlap: usize) -> String {
    let mut out = String::new();
    for (idx, fragment) in fragments.iter().enumerate() {
        if idx == 0 {
            out.push_str(&fragment.text);
        } else {
            out.extend(fragment.text.chars().skip(overlap));
        }
    }
    out
}

fn window_spans(chars: &[char], params: ChunkParams) -> Vec<Range<usize>> {
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }
    if total <= params.chunk_size {
        return vec![0..total];
    }

    let mut spans = Vec::new();
    let mut start = 0;
    loop {
        let hard_end = (start + params.chunk_size).min(total);
        if hard_end == total {
            spans.push(start..total);
            break;
        }

        // A window must outlast the overlap or the next start would not advance.
        let floor = (start + params.overlap + 1).max(hard_end.saturating_sub(params.tolerance()));
        let end = find_boundary(chars, floor, hard_end).unwrap_or(hard_end);
        spans.push(start..end);
        start = end - params.overlap;
    }
    spans
}

/// Best cut position in `floor..=hard_end`, nearest the edge first.
fn find_boundary(chars: &[char], floor: usize, hard_end: usize) -> Option<usize> {
    if floor > hard_end {
        return None;
    }
    let candidates = || (floor..=hard_end).rev();
    candidates()
        .find(|&end| is_sentence_end(chars, end))
        .or_else(|| candidates().find(|&end| chars[end - 1].is_whitespace()))
}

fn is_sentence_end(chars: &[char], end: usize) -> bool {
    let last = chars[end - 1];
    if last == '\n' {
        return true;
    }
    matches!(last, '.' | '!' | '?') && chars.get(end).is_none_or(|next| next.is_whitespace())
}

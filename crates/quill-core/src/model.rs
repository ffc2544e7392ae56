//! Notes and the fragments derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored note. Owned by the note store; the retrieval engine only ever
/// sees its id and current content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity of one fragment: owning note plus 0-based sequence number.
///
/// Ordering is by note id, then sequence. Every ranked list in the engine
/// breaks score ties with this ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FragmentId {
    pub note_id: String,
    pub seq: usize,
}

impl FragmentId {
    #[must_use]
    pub fn new(note_id: impl Into<String>, seq: usize) -> Self {
        Self {
            note_id: note_id.into(),
            seq,
        }
    }

    /// Smallest id belonging to `note_id`, for range scans.
    #[must_use]
    pub fn first_of(note_id: &str) -> Self {
        Self::new(note_id, 0)
    }

    /// Largest id belonging to `note_id`, for range scans.
    #[must_use]
    pub fn last_of(note_id: &str) -> Self {
        Self::new(note_id, usize::MAX)
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.note_id, self.seq)
    }
}

/// A contiguous window of a note's body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: FragmentId,
    pub text: String,
    /// Offset of the window in the body, in characters.
    pub char_start: usize,
    /// Length of the window, in characters.
    pub char_len: usize,
}

impl Fragment {
    #[must_use]
    pub fn note_id(&self) -> &str {
        &self.id.note_id
    }

    #[must_use]
    pub const fn seq(&self) -> usize {
        self.id.seq
    }
}

/// Read access to note metadata, used for citation display only.
pub trait NoteLookup: Send + Sync {
    /// Title of `note_id`, or `None` if the note no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn note_title(&self, note_id: &str) -> anyhow::Result<Option<String>>;

    /// Current body of `note_id`, or `None` if the note no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn note_text(&self, note_id: &str) -> anyhow::Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_ids_order_by_note_then_seq() {
        let mut ids = vec![
            FragmentId::new("n2", 0),
            FragmentId::new("n1", 10),
            FragmentId::new("n1", 2),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                FragmentId::new("n1", 2),
                FragmentId::new("n1", 10),
                FragmentId::new("n2", 0),
            ]
        );
    }

    #[test]
    fn note_bounds_bracket_every_seq() {
        let id = FragmentId::new("n1", 7);
        assert!(FragmentId::first_of("n1") <= id);
        assert!(id <= FragmentId::last_of("n1"));
        assert!(FragmentId::last_of("n1") < FragmentId::first_of("n10"));
    }

    #[test]
    fn display_joins_note_and_seq() {
        assert_eq!(FragmentId::new("qn-1a2b", 3).to_string(), "qn-1a2b#3");
    }
}

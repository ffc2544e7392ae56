//! Semantic KNN search over stored fragment embeddings.
//!
//! Vectors are compared to the query by cosine similarity in `[-1, 1]`.
//! Zero-norm vectors score 0 against everything.

use crate::hit::{ScoredFragment, sort_and_truncate};
use quill_core::{Fragment, FragmentId, QuillError, Result};
use std::collections::BTreeMap;

/// One embedding per indexed fragment, all of the same dimension.
#[derive(Debug, Clone, Default)]
pub struct SemanticIndex {
    dimension: Option<usize>,
    vectors: BTreeMap<FragmentId, Vec<f32>>,
}

impl SemanticIndex {
    /// An index pinned to `dimension`, or pinned by the first insert if `None`.
    #[must_use]
    pub const fn new(dimension: Option<usize>) -> Self {
        Self {
            dimension,
            vectors: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Reject a vector whose length differs from the index dimension.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::DimensionMismatch`].
    pub fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != vector.len() => Err(QuillError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Store the embedding of one fragment, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::DimensionMismatch`] if the vector does not match
    /// the index dimension.
    pub fn insert(&mut self, fragment: &Fragment, vector: Vec<f32>) -> Result<()> {
        self.check_dimension(&vector)?;
        if vector.is_empty() {
            return Err(QuillError::DimensionMismatch {
                expected: self.dimension.unwrap_or(1),
                actual: 0,
            });
        }
        self.dimension.get_or_insert(vector.len());
        self.vectors.insert(fragment.id.clone(), vector);
        Ok(())
    }

    /// Store a whole batch, or nothing if any vector is malformed.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::DimensionMismatch`] for the first bad vector;
    /// the index is unchanged in that case.
    pub fn insert_batch(&mut self, fragments: &[Fragment], vectors: Vec<Vec<f32>>) -> Result<()> {
        self.validate_batch(fragments, &vectors)?;
        for (fragment, vector) in fragments.iter().zip(vectors) {
            self.insert(fragment, vector)?;
        }
        Ok(())
    }

    /// Check that [`Self::insert_batch`] would accept this batch, without
    /// touching the index.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::EmbeddingFailed`] if the counts differ and
    /// [`QuillError::DimensionMismatch`] for the first malformed vector.
    pub fn validate_batch(&self, fragments: &[Fragment], vectors: &[Vec<f32>]) -> Result<()> {
        if fragments.len() != vectors.len() {
            return Err(QuillError::EmbeddingFailed(format!(
                "expected {} vectors, got {}",
                fragments.len(),
                vectors.len()
            )));
        }
        let expected = self
            .dimension
            .or_else(|| vectors.first().map(Vec::len))
            .unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected || v.is_empty()) {
            return Err(QuillError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
        Ok(())
    }

    /// Drop every vector of `note_id`. Returns how many were removed.
    pub fn remove(&mut self, note_id: &str) -> usize {
        let ids: Vec<FragmentId> = self
            .vectors
            .range(FragmentId::first_of(note_id)..=FragmentId::last_of(note_id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            self.vectors.remove(id);
        }
        ids.len()
    }

    /// Top `k` fragments by cosine similarity to `query`, ties by fragment id.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::DimensionMismatch`] if the index is non-empty and
    /// `query` has the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredFragment>> {
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        let mut hits: Vec<ScoredFragment> = self
            .vectors
            .iter()
            .map(|(id, vector)| ScoredFragment::new(id.clone(), cosine_similarity(query, vector)))
            .collect();
        sort_and_truncate(&mut hits, k);
        tracing::trace!(candidates = self.vectors.len(), returned = hits.len(), "semantic knn");
        Ok(hits)
    }

    /// All indexed fragment ids, ascending.
    pub fn fragment_ids(&self) -> impl Iterator<Item = &FragmentId> {
        self.vectors.keys()
    }

    /// Whether a vector is stored for this fragment.
    #[must_use]
    pub fn contains(&self, id: &FragmentId) -> bool {
        self.vectors.contains_key(id)
    }

    #[must_use]
    pub fn contains_note(&self, note_id: &str) -> bool {
        self.vectors
            .range(FragmentId::first_of(note_id)..=FragmentId::last_of(note_id))
            .next()
            .is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let mut dot = 0.0_f32;
    let mut left_norm_sq = 0.0_f32;
    let mut right_norm_sq = 0.0_f32;

    for (a, b) in left.iter().zip(right.iter()) {
        dot += a * b;
        left_norm_sq += a * a;
        right_norm_sq += b * b;
    }

    let denom = left_norm_sq.sqrt() * right_norm_sq.sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}

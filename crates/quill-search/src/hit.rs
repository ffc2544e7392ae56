//! Scored fragment references shared by both indexes and the fusion step.

use quill_core::FragmentId;
use serde::Serialize;
use std::cmp::Ordering;

/// One entry of a ranked list: a fragment and the score its index gave it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFragment {
    pub id: FragmentId,
    pub score: f32,
}

impl ScoredFragment {
    #[must_use]
    pub const fn new(id: FragmentId, score: f32) -> Self {
        Self { id, score }
    }
}

/// Descending score, then ascending fragment id.
pub(crate) fn rank_order(
    a_score: f32,
    a_id: &FragmentId,
    b_score: f32,
    b_id: &FragmentId,
) -> Ordering {
    b_score.total_cmp(&a_score).then_with(|| a_id.cmp(b_id))
}

/// Sort hits best-first and keep at most `limit`.
pub(crate) fn sort_and_truncate(hits: &mut Vec<ScoredFragment>, limit: usize) {
    hits.sort_by(|a, b| rank_order(a.score, &a.id, b.score, &b.id));
    hits.truncate(limit);
}

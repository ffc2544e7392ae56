//! Reciprocal Rank Fusion.
//!
//! ```text
//! score(f) = sum over lists L containing f of 1 / (c + rank_L(f))
//! ```
//!
//! Ranks are 1-based and a list that does not contain `f` contributes 0.
//! Only positions matter, so the lexical and semantic score scales never need
//! to be reconciled.

use super::{FusedHit, collect_signals, sort_fused};
use crate::hit::ScoredFragment;

/// Fuse two ranked lists with RRF constant `c`, best first.
///
/// # Example
///
/// ```
/// use quill_core::FragmentId;
/// use quill_search::ScoredFragment;
/// use quill_search::fusion::rrf_fuse;
///
/// let lexical = vec![ScoredFragment::new(FragmentId::new("n1", 0), 2.3)];
/// let semantic = vec![
///     ScoredFragment::new(FragmentId::new("n2", 0), 0.9),
///     ScoredFragment::new(FragmentId::new("n1", 0), 0.8),
/// ];
/// let fused = rrf_fuse(&lexical, &semantic, 60.0);
/// assert_eq!(fused[0].id, FragmentId::new("n1", 0));
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rrf_fuse(lexical: &[ScoredFragment], semantic: &[ScoredFragment], c: f32) -> Vec<FusedHit> {
    let contribution = |rank: Option<usize>| rank.map_or(0.0, |rank| 1.0 / (c + rank as f32));

    let mut fused: Vec<FusedHit> = collect_signals(lexical, semantic)
        .into_values()
        .map(|mut hit| {
            hit.score = contribution(hit.lexical_rank) + contribution(hit.semantic_rank);
            hit
        })
        .collect();
    sort_fused(&mut fused);
    fused
}

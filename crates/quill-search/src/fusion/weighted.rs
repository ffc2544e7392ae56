//! Weighted-score fusion.
//!
//! Each list is min-max normalized to `[0, 1]` on its own, then
//! `score = w_lex * lex + w_sem * sem` with absent entries counted as 0.
//! A list whose scores are all equal normalizes every entry to 1.0.

use super::{FusedHit, collect_signals, sort_fused};
use crate::hit::ScoredFragment;

/// Min-max normalize `scores` in place.
pub fn min_max_normalize(scores: &mut [f32]) {
    let Some((min, max)) = scores.iter().fold(None, |acc: Option<(f32, f32)>, &s| {
        Some(acc.map_or((s, s), |(lo, hi)| (lo.min(s), hi.max(s))))
    }) else {
        return;
    };

    let range = max - min;
    for score in scores.iter_mut() {
        *score = if range > f32::EPSILON {
            (*score - min) / range
        } else {
            1.0
        };
    }
}

fn normalized(list: &[ScoredFragment]) -> Vec<f32> {
    let mut scores: Vec<f32> = list.iter().map(|hit| hit.score).collect();
    min_max_normalize(&mut scores);
    scores
}

/// Fuse two ranked lists by weighted normalized score, best first.
///
/// The raw per-list scores stay on each [`FusedHit`]; only the fused score
/// uses the normalized values.
#[must_use]
pub fn weighted_fuse(
    lexical: &[ScoredFragment],
    semantic: &[ScoredFragment],
    lexical_weight: f32,
    semantic_weight: f32,
) -> Vec<FusedHit> {
    let lexical_norm = normalized(lexical);
    let semantic_norm = normalized(semantic);

    let mut fused: Vec<FusedHit> = collect_signals(lexical, semantic)
        .into_values()
        .map(|mut hit| {
            let lex = hit
                .lexical_rank
                .and_then(|rank| lexical_norm.get(rank - 1))
                .copied()
                .unwrap_or(0.0);
            let sem = hit
                .semantic_rank
                .and_then(|rank| semantic_norm.get(rank - 1))
                .copied()
                .unwrap_or(0.0);
            hit.score = lexical_weight.mul_add(lex, semantic_weight * sem);
            hit
        })
        .collect();
    sort_fused(&mut fused);
    fused
}

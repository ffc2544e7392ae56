//! Fusion of the lexical and semantic rankings into one ordered list.
//!
//! Both strategies are pure functions of their inputs. The output is ordered
//! by descending fused score with ties broken by ascending fragment id, and
//! every hit remembers where it stood in each input list.

pub mod rrf;
pub mod weighted;

pub use rrf::rrf_fuse;
pub use weighted::{min_max_normalize, weighted_fuse};

use crate::hit::{ScoredFragment, rank_order};
use quill_core::FragmentId;
use quill_core::config::{FusionPolicy, RetrievalConfig};
use serde::Serialize;
use std::collections::BTreeMap;

/// One fused result with its per-signal breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedHit {
    pub id: FragmentId,
    /// Fused score; higher is better.
    pub score: f32,
    /// 1-based rank in the lexical list, `None` if absent.
    pub lexical_rank: Option<usize>,
    /// 1-based rank in the semantic list, `None` if absent.
    pub semantic_rank: Option<usize>,
    pub lexical_score: Option<f32>,
    pub semantic_score: Option<f32>,
}

/// A configured fusion strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fusion {
    /// Reciprocal Rank Fusion with constant `c`.
    Rrf { c: f32 },
    /// Weighted sum of min-max normalized scores.
    Weighted { lexical: f32, semantic: f32 },
}

impl Fusion {
    #[must_use]
    pub const fn from_config(config: &RetrievalConfig) -> Self {
        match config.fusion {
            FusionPolicy::Rrf => Self::Rrf { c: config.rrf_k },
            FusionPolicy::Weighted => Self::Weighted {
                lexical: config.lexical_weight,
                semantic: config.semantic_weight,
            },
        }
    }

    /// Merge both lists and keep the best `k`.
    #[must_use]
    pub fn fuse(
        &self,
        lexical: &[ScoredFragment],
        semantic: &[ScoredFragment],
        k: usize,
    ) -> Vec<FusedHit> {
        let mut fused = match *self {
            Self::Rrf { c } => rrf_fuse(lexical, semantic, c),
            Self::Weighted {
                lexical: w_lex,
                semantic: w_sem,
            } => weighted_fuse(lexical, semantic, w_lex, w_sem),
        };
        fused.truncate(k);
        fused
    }
}

/// Gather every fragment that appears in either list, with its ranks and raw
/// scores filled in and the fused score left at zero.
pub(crate) fn collect_signals(
    lexical: &[ScoredFragment],
    semantic: &[ScoredFragment],
) -> BTreeMap<FragmentId, FusedHit> {
    let mut hits: BTreeMap<FragmentId, FusedHit> = BTreeMap::new();

    for (idx, hit) in lexical.iter().enumerate() {
        let entry = hits
            .entry(hit.id.clone())
            .or_insert_with(|| empty_hit(&hit.id));
        entry.lexical_rank.get_or_insert(idx + 1);
        entry.lexical_score.get_or_insert(hit.score);
    }
    for (idx, hit) in semantic.iter().enumerate() {
        let entry = hits
            .entry(hit.id.clone())
            .or_insert_with(|| empty_hit(&hit.id));
        entry.semantic_rank.get_or_insert(idx + 1);
        entry.semantic_score.get_or_insert(hit.score);
    }

    hits
}

fn empty_hit(id: &FragmentId) -> FusedHit {
    FusedHit {
        id: id.clone(),
        score: 0.0,
        lexical_rank: None,
        semantic_rank: None,
        lexical_score: None,
        semantic_score: None,
    }
}

pub(crate) fn sort_fused(hits: &mut [FusedHit]) {
    hits.sort_by(|a, b| rank_order(a.score, &a.id, b.score, &b.id));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[(&str, f32)]) -> Vec<ScoredFragment> {
        entries
            .iter()
            .map(|(id, score)| ScoredFragment::new(FragmentId::new(*id, 0), *score))
            .collect()
    }

    #[test]
    fn from_config_follows_policy() {
        let mut config = RetrievalConfig::default();
        assert_eq!(Fusion::from_config(&config), Fusion::Rrf { c: 60.0 });

        config.fusion = FusionPolicy::Weighted;
        assert_eq!(
            Fusion::from_config(&config),
            Fusion::Weighted {
                lexical: 0.3,
                semantic: 0.7
            }
        );
    }

    #[test]
    fn fuse_truncates_to_k() {
        let lexical = list(&[("a", 3.0), ("b", 2.0), ("c", 1.0)]);
        let semantic = list(&[("d", 0.9), ("e", 0.8)]);
        let fused = Fusion::Rrf { c: 60.0 }.fuse(&lexical, &semantic, 2);
        assert_eq!(fused.len(), 2);
        assert!(Fusion::Rrf { c: 60.0 }.fuse(&lexical, &semantic, 0).is_empty());
    }

    #[test]
    fn signals_keep_first_rank_and_raw_score() {
        let lexical = list(&[("a", 3.0), ("b", 2.0)]);
        let semantic = list(&[("b", 0.5)]);
        let signals = collect_signals(&lexical, &semantic);

        let b = &signals[&FragmentId::new("b", 0)];
        assert_eq!(b.lexical_rank, Some(2));
        assert_eq!(b.semantic_rank, Some(1));
        assert_eq!(b.lexical_score, Some(2.0));
        assert_eq!(b.semantic_score, Some(0.5));

        let a = &signals[&FragmentId::new("a", 0)];
        assert_eq!(a.semantic_rank, None);
    }

    #[test]
    fn both_strategies_handle_empty_inputs() {
        assert!(Fusion::Rrf { c: 60.0 }.fuse(&[], &[], 5).is_empty());
        let weighted = Fusion::Weighted {
            lexical: 0.3,
            semantic: 0.7,
        };
        assert!(weighted.fuse(&[], &[], 5).is_empty());
    }
}

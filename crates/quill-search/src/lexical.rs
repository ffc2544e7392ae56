//! In-memory BM25 index over note fragments.
//!
//! Scoring follows Okapi BM25:
//!
//! ```text
//! idf(t)    = ln(1 + (N - n(t) + 0.5) / (n(t) + 0.5))
//! score(d)  = sum over query terms t of
//!             idf(t) * tf(t,d) * (k1 + 1) / (tf(t,d) + k1 * (1 - b + b * |d| / avgdl))
//! ```
//!
//! `idf` is always positive, so any fragment sharing a term with the query
//! scores above zero and fragments sharing none are never returned.

use crate::hit::{ScoredFragment, sort_and_truncate};
use quill_core::{Fragment, FragmentId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// BM25 free parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Length normalization strength in `[0, 1]`.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Lowercased alphanumeric terms of `text`, in order of appearance.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone)]
struct IndexedFragment {
    fragment: Fragment,
    term_freqs: HashMap<String, u32>,
    len: u32,
}

/// Term-frequency statistics for every indexed fragment.
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    params: Bm25Params,
    docs: BTreeMap<FragmentId, IndexedFragment>,
    postings: HashMap<String, BTreeSet<FragmentId>>,
    total_len: u64,
}

impl LexicalIndex {
    #[must_use]
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Index one fragment, replacing any fragment with the same id.
    pub fn insert(&mut self, fragment: &Fragment) {
        self.remove_fragment(&fragment.id);

        let mut term_freqs: HashMap<String, u32> = HashMap::new();
        let mut len = 0_u32;
        for term in tokenize(&fragment.text) {
            *term_freqs.entry(term).or_default() += 1;
            len = len.saturating_add(1);
        }

        for term in term_freqs.keys() {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(fragment.id.clone());
        }
        self.total_len += u64::from(len);
        self.docs.insert(
            fragment.id.clone(),
            IndexedFragment {
                fragment: fragment.clone(),
                term_freqs,
                len,
            },
        );
    }

    /// Drop every fragment of `note_id`. Returns how many were removed.
    pub fn remove(&mut self, note_id: &str) -> usize {
        let ids: Vec<FragmentId> = self
            .docs
            .range(FragmentId::first_of(note_id)..=FragmentId::last_of(note_id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            self.remove_fragment(id);
        }
        ids.len()
    }

    fn remove_fragment(&mut self, id: &FragmentId) {
        let Some(doc) = self.docs.remove(id) else {
            return;
        };
        self.total_len -= u64::from(doc.len);
        for term in doc.term_freqs.keys() {
            if let Some(ids) = self.postings.get_mut(term) {
                ids.remove(id);
                if ids.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
    }

    /// Top `k` fragments for `query`, best first, ties by fragment id.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn search(&self, query: &str, k: usize) -> Vec<ScoredFragment> {
        if k == 0 || self.docs.is_empty() {
            return Vec::new();
        }

        let mut terms = tokenize(query);
        terms.sort_unstable();
        terms.dedup();

        let doc_count = self.docs.len() as f32;
        let avg_len = (self.total_len as f32 / doc_count).max(f32::EPSILON);
        let Bm25Params { k1, b } = self.params;

        let mut scores: BTreeMap<&FragmentId, f32> = BTreeMap::new();
        for term in &terms {
            let Some(ids) = self.postings.get(term) else {
                continue;
            };
            let df = ids.len() as f32;
            let idf = ((doc_count - df + 0.5) / (df + 0.5)).ln_1p();

            for id in ids {
                let Some(doc) = self.docs.get(id) else {
                    continue;
                };
                let tf = doc.term_freqs.get(term).copied().unwrap_or(0) as f32;
                let norm = k1 * (1.0 - b + b * doc.len as f32 / avg_len);
                *scores.entry(id).or_default() += idf * tf * (k1 + 1.0) / (tf + norm);
            }
        }

        let mut hits: Vec<ScoredFragment> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(id, score)| ScoredFragment::new(id.clone(), score))
            .collect();
        sort_and_truncate(&mut hits, k);
        hits
    }

    /// The indexed fragment with this id.
    #[must_use]
    pub fn fragment(&self, id: &FragmentId) -> Option<&Fragment> {
        self.docs.get(id).map(|doc| &doc.fragment)
    }

    /// All indexed fragment ids, ascending.
    pub fn fragment_ids(&self) -> impl Iterator<Item = &FragmentId> {
        self.docs.keys()
    }

    /// Whether any fragment of `note_id` is indexed.
    #[must_use]
    pub fn contains_note(&self, note_id: &str) -> bool {
        self.docs
            .range(FragmentId::first_of(note_id)..=FragmentId::last_of(note_id))
            .next()
            .is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Number of distinct terms in the vocabulary.
    #[must_use]
    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }
}

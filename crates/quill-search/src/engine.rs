//! The retrieval facade: one object that owns both indexes and answers
//! queries with cited fragments.

use crate::answer::{Answer, AnswerContext, Generator, respond};
use crate::fusion::{FusedHit, Fusion};
use crate::retry::RetryPolicy;
use crate::semantic::{Embedder, embed_with_timeout};
use crate::sync::{CorpusSynchronizer, IndexReport, inconsistency};
use quill_core::config::{FusionPolicy, RetrievalConfig};
use quill_core::{NoteLookup, QuillError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A ranked fragment with everything needed to cite it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitedFragment {
    pub note_id: String,
    pub title: String,
    pub text: String,
    pub seq: usize,
    /// Fused score.
    pub score: f32,
    /// 1-based position in the result list.
    pub rank: usize,
    pub lexical_rank: Option<usize>,
    pub semantic_rank: Option<usize>,
}

/// Result of rebuilding the indexes from a full note listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReindexSummary {
    pub notes: usize,
    pub fragments: usize,
    /// Notes dropped from the indexes because they are no longer listed.
    pub removed: usize,
    /// `(note_id, error)` for every note that could not be indexed.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub notes: usize,
    pub fragments: usize,
    pub vocabulary: usize,
    pub embedding_dim: usize,
    pub fusion: FusionPolicy,
}

/// Hybrid lexical and semantic retrieval over a note corpus.
///
/// Cheap to share behind an [`Arc`]; all methods take `&self`.
pub struct RetrievalEngine {
    config: RetrievalConfig,
    fusion: Fusion,
    corpus: CorpusSynchronizer,
    notes: Arc<dyn NoteLookup>,
    retry: RetryPolicy,
}

impl RetrievalEngine {
    /// Validate `config` and build an empty engine.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::InvalidConfig`] for a bad configuration and
    /// [`QuillError::DimensionMismatch`] if the embedder disagrees with
    /// `embedding_dim`.
    pub fn new(
        config: RetrievalConfig,
        embedder: Arc<dyn Embedder>,
        notes: Arc<dyn NoteLookup>,
    ) -> Result<Self> {
        config.validate()?;
        let corpus = CorpusSynchronizer::new(&config, embedder)?;
        Ok(Self {
            fusion: Fusion::from_config(&config),
            config,
            corpus,
            notes,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy used for query embedding.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// (Re)index one note. See [`CorpusSynchronizer::index_note`].
    ///
    /// # Errors
    ///
    /// Fails if embedding fails or times out; the note is then unindexed.
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub fn index_note(&self, note_id: &str, text: &str) -> Result<IndexReport> {
        self.corpus.index_note(note_id, text)
    }

    /// Remove a note from both indexes. Unknown ids are a no-op.
    #[instrument(skip(self))]
    pub fn delete_note(&self, note_id: &str) -> usize {
        self.corpus.delete_note(note_id)
    }

    /// Index every `(note_id, text)` pair and drop indexed notes not listed.
    ///
    /// Failures are collected per note instead of aborting the rebuild.
    #[instrument(skip_all)]
    pub fn reindex_all<'a, I>(&self, notes: I) -> ReindexSummary
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut summary = ReindexSummary::default();
        let mut stale = self.corpus.indexed_notes();

        for (note_id, text) in notes {
            stale.remove(note_id);
            match self.corpus.index_note(note_id, text) {
                Ok(report) => {
                    summary.notes += 1;
                    summary.fragments += report.fragments;
                }
                Err(err) => {
                    warn!(note_id, error = %err, "failed to index note");
                    summary.failed.push((note_id.to_owned(), err.to_string()));
                }
            }
        }

        for note_id in &stale {
            self.corpus.delete_note(note_id);
        }
        summary.removed = stale.len();

        info!(
            notes = summary.notes,
            fragments = summary.fragments,
            removed = summary.removed,
            failed = summary.failed.len(),
            "reindex complete"
        );
        summary
    }

    /// Top `k` fragments for `query`. `k == 0` means the configured default.
    ///
    /// A blank query or an empty corpus yields an empty list.
    ///
    /// # Errors
    ///
    /// - [`QuillError::RetrievalTimeout`] if query embedding keeps timing out.
    /// - [`QuillError::EmbeddingFailed`] if the embedder errors.
    /// - [`QuillError::DimensionMismatch`] if the query vector is malformed.
    /// - [`QuillError::IndexInconsistency`] if a ranked fragment is present
    ///   in only one index.
    #[instrument(skip(self))]
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<CitedFragment>> {
        let k = if k == 0 { self.config.top_k } else { k };
        if query.trim().is_empty() || self.is_empty() {
            debug!("nothing to search");
            return Ok(Vec::new());
        }

        let query_vector = self.embed_query(query)?;
        let pool = self.config.candidate_pool(k);

        let ranked: Vec<(FusedHit, String)> = {
            let snapshot = self.corpus.snapshot();
            let lexical = snapshot.lexical.search(query, pool);
            let semantic = snapshot.semantic.search(&query_vector, pool)?;
            debug!(lexical = lexical.len(), semantic = semantic.len(), pool, "candidates");

            self.fusion
                .fuse(&lexical, &semantic, k)
                .into_iter()
                .map(|hit| {
                    let Some(fragment) = snapshot.lexical.fragment(&hit.id) else {
                        return Err(inconsistency(&hit.id, "lexical"));
                    };
                    if !snapshot.semantic.contains(&hit.id) {
                        return Err(inconsistency(&hit.id, "semantic"));
                    }
                    let text = fragment.text.clone();
                    Ok((hit, text))
                })
                .collect::<Result<_>>()
                .inspect_err(|err| warn!(error = %err, "search hit a torn note"))?
        };

        let mut titles: HashMap<String, String> = HashMap::new();
        let cited = ranked
            .into_iter()
            .enumerate()
            .map(|(idx, (hit, text))| {
                let title = titles
                    .entry(hit.id.note_id.clone())
                    .or_insert_with(|| self.resolve_title(&hit.id.note_id))
                    .clone();
                CitedFragment {
                    note_id: hit.id.note_id,
                    title,
                    text,
                    seq: hit.id.seq,
                    score: hit.score,
                    rank: idx + 1,
                    lexical_rank: hit.lexical_rank,
                    semantic_rank: hit.semantic_rank,
                }
            })
            .collect();
        Ok(cited)
    }

    /// Search and keep the hits at or above the configured minimum score.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::search`] errors.
    pub fn context(&self, query: &str, k: usize) -> Result<AnswerContext> {
        let hits = self.search(query, k)?;
        Ok(AnswerContext::build(query, hits, self.config.min_score))
    }

    /// Retrieve context for `query` and hand it to `generator`.
    ///
    /// # Errors
    ///
    /// Fails on retrieval errors or if the generator fails.
    pub fn ask(&self, query: &str, k: usize, generator: &dyn Generator) -> anyhow::Result<Answer> {
        let context = self.context(query, k)?;
        respond(context, generator)
    }

    /// # Errors
    ///
    /// Returns [`QuillError::IndexInconsistency`] if the indexes disagree.
    pub fn check_consistency(&self) -> Result<()> {
        self.corpus.check_consistency()
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let notes = self.corpus.indexed_notes().len();
        let snapshot = self.corpus.snapshot();
        EngineStats {
            notes,
            fragments: snapshot.lexical.len(),
            vocabulary: snapshot.lexical.vocabulary_size(),
            embedding_dim: self.config.embedding_dim,
            fusion: self.config.fusion,
        }
    }

    fn is_empty(&self) -> bool {
        let snapshot = self.corpus.snapshot();
        snapshot.lexical.is_empty() && snapshot.semantic.is_empty()
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let vectors = self.retry.run(|| {
            embed_with_timeout(
                self.corpus.embedder(),
                vec![query.to_owned()],
                self.corpus.embed_timeout(),
            )
        })?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| QuillError::EmbeddingFailed("no vector returned for query".into()))
    }

    fn resolve_title(&self, note_id: &str) -> String {
        match self.notes.note_title(note_id) {
            Ok(Some(title)) => title,
            Ok(None) => {
                warn!(note_id, "indexed note has no stored title");
                note_id.to_owned()
            }
            Err(err) => {
                warn!(note_id, error = %format!("{err:#}"), "title lookup failed");
                note_id.to_owned()
            }
        }
    }
}

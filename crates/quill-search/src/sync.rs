//! Keeps the lexical and semantic indexes in lock-step with the note corpus.
//!
//! Both indexes are only ever mutated here. A note's fragments are replaced as
//! a unit: chunks are embedded first, then both write locks are taken (lexical
//! before semantic) and the old fragments are purged and the new ones inserted
//! under those locks. Readers see a note either entirely before or entirely
//! after the swap.

use crate::lexical::{Bm25Params, LexicalIndex};
use crate::semantic::{Embedder, SemanticIndex, embed_with_timeout};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use quill_core::chunk::{ChunkParams, chunk_with};
use quill_core::config::RetrievalConfig;
use quill_core::{FragmentId, QuillError, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of indexing one note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub note_id: String,
    /// Fragments now indexed for the note.
    pub fragments: usize,
    /// Fragments of the previous version that were purged.
    pub replaced: usize,
}

/// Read access to both indexes at once.
pub struct IndexSnapshot<'a> {
    pub lexical: RwLockReadGuard<'a, LexicalIndex>,
    pub semantic: RwLockReadGuard<'a, SemanticIndex>,
}

/// Owner of both indexes and the only writer to them.
pub struct CorpusSynchronizer {
    lexical: RwLock<LexicalIndex>,
    semantic: RwLock<SemanticIndex>,
    note_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkParams,
    embed_timeout: Duration,
    #[cfg(test)]
    refuse_semantic_insert: std::sync::atomic::AtomicBool,
}

impl CorpusSynchronizer {
    /// Build empty indexes from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::InvalidConfig`] for unusable chunk parameters and
    /// [`QuillError::DimensionMismatch`] if the embedder's dimension differs
    /// from `embedding_dim`.
    pub fn new(config: &RetrievalConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let chunking = ChunkParams::new(config.chunk_size, config.chunk_overlap)?;
        if embedder.dimension() != config.embedding_dim {
            return Err(QuillError::DimensionMismatch {
                expected: config.embedding_dim,
                actual: embedder.dimension(),
            });
        }

        Ok(Self {
            lexical: RwLock::new(LexicalIndex::new(Bm25Params {
                k1: config.bm25_k1,
                b: config.bm25_b,
            })),
            semantic: RwLock::new(SemanticIndex::new(Some(config.embedding_dim))),
            note_locks: Mutex::new(HashMap::new()),
            embedder,
            chunking,
            embed_timeout: config.embed_timeout(),
            #[cfg(test)]
            refuse_semantic_insert: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Replace whatever is indexed for `note_id` with the fragments of `text`.
    ///
    /// On any failure the note is left absent from both indexes.
    ///
    /// # Errors
    ///
    /// - [`QuillError::RetrievalTimeout`] if embedding exceeds the deadline.
    /// - [`QuillError::EmbeddingFailed`] if the embedder errors.
    /// - [`QuillError::DimensionMismatch`] if a vector has the wrong length.
    pub fn index_note(&self, note_id: &str, text: &str) -> Result<IndexReport> {
        self.with_note_lock(note_id, || {
            let fragments = chunk_with(note_id, text, self.chunking);
            let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();

            let vectors = match embed_with_timeout(&self.embedder, texts, self.embed_timeout) {
                Ok(vectors) => vectors,
                Err(err) => {
                    let purged = self.purge(note_id);
                    warn!(note_id, purged, error = %err, "embedding failed, note left unindexed");
                    return Err(err);
                }
            };

            let mut lexical = self.lexical.write();
            let mut semantic = self.semantic.write();

            let replaced = lexical.remove(note_id);
            semantic.remove(note_id);

            // Validation runs before the lexical insert, so a bad batch never
            // touches either index. The rollback below covers insert failures
            // that validation cannot see.
            semantic.validate_batch(&fragments, &vectors)?;
            for fragment in &fragments {
                lexical.insert(fragment);
            }
            if let Err(err) = self.insert_vectors(&mut semantic, &fragments, vectors) {
                lexical.remove(note_id);
                warn!(note_id, error = %err, "semantic insert failed, rolled back lexical insert");
                return Err(err);
            }

            debug!(note_id, fragments = fragments.len(), replaced, "indexed note");
            Ok(IndexReport {
                note_id: note_id.to_owned(),
                fragments: fragments.len(),
                replaced,
            })
        })
    }

    fn insert_vectors(
        &self,
        semantic: &mut SemanticIndex,
        fragments: &[quill_core::Fragment],
        vectors: Vec<Vec<f32>>,
    ) -> Result<()> {
        #[cfg(test)]
        if self
            .refuse_semantic_insert
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(QuillError::EmbeddingFailed("semantic insert refused".into()));
        }
        semantic.insert_batch(fragments, vectors)
    }

    /// Remove every fragment of `note_id`. Returns how many were removed;
    /// unknown ids remove nothing.
    pub fn delete_note(&self, note_id: &str) -> usize {
        self.with_note_lock(note_id, || {
            let removed = self.purge(note_id);
            debug!(note_id, removed, "deleted note from indexes");
            removed
        })
    }

    fn purge(&self, note_id: &str) -> usize {
        let mut lexical = self.lexical.write();
        let mut semantic = self.semantic.write();
        let removed = lexical.remove(note_id);
        let removed_vectors = semantic.remove(note_id);
        if removed != removed_vectors {
            warn!(note_id, removed, removed_vectors, "indexes held different fragment counts");
        }
        removed.max(removed_vectors)
    }

    /// Verify that both indexes hold exactly the same fragment ids.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::IndexInconsistency`] naming the first fragment
    /// present in one index but not the other.
    pub fn check_consistency(&self) -> Result<()> {
        let snapshot = self.snapshot();
        let mut lexical = snapshot.lexical.fragment_ids().peekable();
        let mut semantic = snapshot.semantic.fragment_ids().peekable();

        loop {
            let missing = match (lexical.peek(), semantic.peek()) {
                (None, None) => return Ok(()),
                (Some(lex), None) => Some((*lex, "semantic")),
                (None, Some(sem)) => Some((*sem, "lexical")),
                (Some(lex), Some(sem)) => match lex.cmp(sem) {
                    Ordering::Equal => None,
                    Ordering::Less => Some((*lex, "semantic")),
                    Ordering::Greater => Some((*sem, "lexical")),
                },
            };
            if let Some((id, index)) = missing {
                return Err(inconsistency(id, index));
            }
            lexical.next();
            semantic.next();
        }
    }

    /// Both indexes under read locks, taken lexical first.
    pub fn snapshot(&self) -> IndexSnapshot<'_> {
        let lexical = self.lexical.read();
        let semantic = self.semantic.read();
        IndexSnapshot { lexical, semantic }
    }

    /// Ids of every note with at least one fragment in either index.
    #[must_use]
    pub fn indexed_notes(&self) -> BTreeSet<String> {
        let snapshot = self.snapshot();
        snapshot
            .lexical
            .fragment_ids()
            .chain(snapshot.semantic.fragment_ids())
            .map(|id| id.note_id.clone())
            .collect()
    }

    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    #[must_use]
    pub const fn embed_timeout(&self) -> Duration {
        self.embed_timeout
    }

    fn with_note_lock<T>(&self, note_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.note_locks.lock();
            Arc::clone(locks.entry(note_id.to_owned()).or_default())
        };

        let result = {
            let _guard = lock.lock();
            f()
        };

        let mut locks = self.note_locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(note_id);
        }
        result
    }

    #[cfg(test)]
    fn tracked_note_locks(&self) -> usize {
        self.note_locks.lock().len()
    }

    /// Make the next semantic batch insert fail after the lexical insert.
    #[cfg(test)]
    pub(crate) fn fail_next_semantic_insert(&self) {
        self.refuse_semantic_insert
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Insert into the lexical index only, to simulate a torn write.
    #[cfg(test)]
    pub(crate) fn insert_lexical_only(&self, fragment: &quill_core::Fragment) {
        self.lexical.write().insert(fragment);
    }

    /// Insert into the semantic index only, to simulate a torn write.
    #[cfg(test)]
    pub(crate) fn insert_semantic_only(&self, fragment: &quill_core::Fragment, vector: Vec<f32>) {
        self.semantic
            .write()
            .insert(fragment, vector)
            .expect("vector matches the index dimension");
    }
}

pub(crate) fn inconsistency(id: &FragmentId, missing_from: &str) -> QuillError {
    QuillError::IndexInconsistency {
        note_id: id.note_id.clone(),
        detail: format!("fragment {id} is missing from the {missing_from} index"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{FailingEmbedder, HashEmbedder};
    use quill_core::{Fragment, FragmentId};

    fn config() -> RetrievalConfig {
        RetrievalConfig {
            chunk_size: 40,
            chunk_overlap: 5,
            embedding_dim: 32,
            ..RetrievalConfig::default()
        }
    }

    fn synchronizer() -> CorpusSynchronizer {
        CorpusSynchronizer::new(&config(), Arc::new(HashEmbedder::new(32))).expect("valid config")
    }

    #[test]
    fn rejects_embedder_with_wrong_dimension() {
        let result = CorpusSynchronizer::new(&config(), Arc::new(HashEmbedder::new(8)));
        assert!(matches!(
            result,
            Err(QuillError::DimensionMismatch {
                expected: 32,
                actual: 8
            })
        ));
    }

    #[test]
    fn index_note_fills_both_indexes() {
        let sync = synchronizer();
        let report = sync
            .index_note("n1", "A fairly long note body. It spans more than one window of text.")
            .expect("index");
        assert!(report.fragments > 1);
        assert_eq!(report.replaced, 0);

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.lexical.len(), report.fragments);
        assert_eq!(snapshot.semantic.len(), report.fragments);
        drop(snapshot);
        sync.check_consistency().expect("consistent");
    }

    #[test]
    fn reindex_replaces_previous_fragments() {
        let sync = synchronizer();
        sync.index_note("n1", "apples and oranges").expect("index");
        let report = sync.index_note("n1", "bananas").expect("reindex");
        assert_eq!(report.replaced, 1);

        let snapshot = sync.snapshot();
        assert!(snapshot.lexical.search("apples", 5).is_empty());
        assert_eq!(snapshot.lexical.search("bananas", 5).len(), 1);
    }

    #[test]
    fn empty_text_leaves_note_absent() {
        let sync = synchronizer();
        sync.index_note("n1", "something").expect("index");
        let report = sync.index_note("n1", "").expect("index empty");
        assert_eq!(report.fragments, 0);
        assert!(!sync.snapshot().lexical.contains_note("n1"));
    }

    #[test]
    fn failed_embedding_purges_the_note() {
        let failing =
            CorpusSynchronizer::new(&config(), Arc::new(FailingEmbedder { dim: 32 })).expect("cfg");
        failing.insert_lexical_only(&Fragment {
            id: FragmentId::new("n1", 0),
            text: "stale".into(),
            char_start: 0,
            char_len: 5,
        });

        let err = failing.index_note("n1", "new text").expect_err("must fail");
        assert!(matches!(err, QuillError::EmbeddingFailed(_)));
        let snapshot = failing.snapshot();
        assert!(!snapshot.lexical.contains_note("n1"));
        assert!(!snapshot.semantic.contains_note("n1"));
    }

    #[test]
    fn semantic_insert_failure_rolls_back_lexical_insert() {
        let sync = synchronizer();
        sync.index_note("n1", "old text about apples").expect("index");
        sync.index_note("n2", "unrelated note about pears").expect("index");

        sync.fail_next_semantic_insert();
        let err = sync
            .index_note("n1", "new text about bananas")
            .expect_err("semantic insert fails");
        assert!(matches!(err, QuillError::EmbeddingFailed(_)));

        let snapshot = sync.snapshot();
        assert!(!snapshot.lexical.contains_note("n1"));
        assert!(!snapshot.semantic.contains_note("n1"));
        assert!(snapshot.lexical.search("bananas", 5).is_empty());
        assert!(snapshot.lexical.contains_note("n2"));
        drop(snapshot);
        sync.check_consistency().expect("consistent after rollback");

        sync.index_note("n1", "new text about bananas").expect("next insert succeeds");
        assert_eq!(sync.snapshot().lexical.search("bananas", 5).len(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let sync = synchronizer();
        sync.index_note("n1", "hello world").expect("index");
        assert_eq!(sync.delete_note("n1"), 1);
        assert_eq!(sync.delete_note("n1"), 0);
        assert_eq!(sync.delete_note("never"), 0);
        assert!(sync.snapshot().lexical.is_empty());
    }

    #[test]
    fn consistency_check_names_the_torn_note() {
        let sync = synchronizer();
        sync.index_note("n1", "fine").expect("index");
        sync.insert_lexical_only(&Fragment {
            id: FragmentId::new("n2", 0),
            text: "orphan".into(),
            char_start: 0,
            char_len: 6,
        });

        let err = sync.check_consistency().expect_err("torn write detected");
        match err {
            QuillError::IndexInconsistency { note_id, detail } => {
                assert_eq!(note_id, "n2");
                assert!(detail.contains("semantic"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn note_locks_are_released_after_use() {
        let sync = synchronizer();
        sync.index_note("n1", "text").expect("index");
        sync.delete_note("n1");
        assert_eq!(sync.tracked_note_locks(), 0);
    }
}

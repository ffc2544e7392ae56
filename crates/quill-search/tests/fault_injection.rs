//! Failure injection for the embedding collaborator.
//!
//! Covers a backend that always fails, one that hangs past the deadline, one
//! that fails only once, and one that returns vectors of the wrong size.

use anyhow::{Result, bail};
use quill_core::QuillError;
use quill_core::config::RetrievalConfig;
use quill_core::db::NoteStore;
use quill_search::{Embedder, HashEmbedder, RetrievalEngine, RetryPolicy};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

const DIM: usize = 16;

fn config() -> RetrievalConfig {
    RetrievalConfig {
        embedding_dim: DIM,
        embed_timeout_ms: 50,
        ..RetrievalConfig::default()
    }
}

fn engine_with(embedder: Arc<dyn Embedder>) -> RetrievalEngine {
    let store = Arc::new(NoteStore::open_in_memory().expect("store"));
    RetrievalEngine::new(config(), embedder, store).expect("valid engine")
}

/// Rejects every text.
struct Unavailable;

impl Embedder for Unavailable {
    fn dimension(&self) -> usize {
        DIM
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("embedding backend unavailable")
    }
}

/// Delegates to a hash embedder until `broken` is set.
struct Switchable {
    inner: HashEmbedder,
    broken: AtomicBool,
}

impl Embedder for Switchable {
    fn dimension(&self) -> usize {
        DIM
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.broken.load(Ordering::SeqCst) {
            bail!("backend went away");
        }
        self.inner.embed(text)
    }
}

/// Sleeps well past the engine deadline.
struct Sluggish;

impl Embedder for Sluggish {
    fn dimension(&self) -> usize {
        DIM
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        thread::sleep(Duration::from_millis(400));
        Ok(vec![0.0; DIM])
    }
}

/// Hangs on the first call only.
struct HiccupOnce {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl Embedder for HiccupOnce {
    fn dimension(&self) -> usize {
        DIM
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(400));
        }
        self.inner.embed(text)
    }
}

/// Hangs on every call while `stalled` is set.
struct Stalling {
    inner: HashEmbedder,
    stalled: AtomicBool,
    calls: AtomicUsize,
}

impl Embedder for Stalling {
    fn dimension(&self) -> usize {
        DIM
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(400));
        }
        self.inner.embed(text)
    }
}

/// Claims one dimension, produces another.
struct Liar;

impl Embedder for Liar {
    fn dimension(&self) -> usize {
        DIM
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; DIM + 1])
    }
}

#[test]
fn failing_embedder_leaves_note_absent_everywhere() {
    let engine = engine_with(Arc::new(Unavailable));

    let err = engine
        .index_note("qn-aaaaaaaa", "Paris is the capital of France.")
        .expect_err("embedding must fail");
    assert!(matches!(err, QuillError::EmbeddingFailed(_)));

    assert_eq!(engine.stats().fragments, 0);
    engine.check_consistency().expect("nothing half-written");
    assert!(engine.search("Paris", 5).expect("empty corpus").is_empty());
}

#[test]
fn failed_reindex_purges_the_previous_version() {
    let embedder = Arc::new(Switchable {
        inner: HashEmbedder::new(DIM),
        broken: AtomicBool::new(false),
    });
    let engine = engine_with(embedder.clone());
    engine
        .index_note("qn-aaaaaaaa", "old searchable text")
        .expect("index");
    engine
        .index_note("qn-bbbbbbbb", "unrelated neighbour")
        .expect("index");

    embedder.broken.store(true, Ordering::SeqCst);
    assert!(engine.index_note("qn-aaaaaaaa", "new text").is_err());

    let stats = engine.stats();
    assert_eq!(stats.notes, 1);
    engine.check_consistency().expect("indexes agree");
}

#[test]
fn slow_embedder_times_out_on_index() {
    let engine = engine_with(Arc::new(Sluggish));
    let err = engine
        .index_note("qn-aaaaaaaa", "anything")
        .expect_err("deadline exceeded");
    assert!(matches!(
        err,
        QuillError::RetrievalTimeout {
            operation: "embedding",
            ..
        }
    ));
    assert_eq!(err.code().code(), "E4001");
    engine.check_consistency().expect("indexes agree");
}

#[test]
fn persistent_query_timeout_exhausts_retries() {
    let store = Arc::new(NoteStore::open_in_memory().expect("store"));
    let embedder = Arc::new(Stalling {
        inner: HashEmbedder::new(DIM),
        stalled: AtomicBool::new(false),
        calls: AtomicUsize::new(0),
    });
    let engine = RetrievalEngine::new(config(), embedder.clone(), store)
        .expect("valid engine")
        .with_retry(RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        });
    engine.index_note("qn-aaaaaaaa", "indexed text").expect("index");

    embedder.stalled.store(true, Ordering::SeqCst);
    let before = embedder.calls.load(Ordering::SeqCst);
    let err = engine.search("indexed", 3).expect_err("both attempts time out");
    assert!(matches!(err, QuillError::RetrievalTimeout { .. }));
    assert_eq!(embedder.calls.load(Ordering::SeqCst) - before, 2);
}

#[test]
fn transient_query_timeout_is_retried() {
    let store = Arc::new(NoteStore::open_in_memory().expect("store"));
    let seeded = Arc::new(HiccupOnce {
        inner: HashEmbedder::new(DIM),
        calls: AtomicUsize::new(1),
    });
    let engine = RetrievalEngine::new(config(), seeded.clone(), store)
        .expect("valid engine")
        .with_retry(RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        });
    engine.index_note("qn-aaaaaaaa", "retry me").expect("index");

    seeded.calls.store(0, Ordering::SeqCst);
    let hits = engine.search("retry", 3).expect("second attempt succeeds");
    assert_eq!(hits.len(), 1);
    assert!(seeded.calls.load(Ordering::SeqCst) >= 2);
}

#[test]
fn query_timeout_without_retry_surfaces_as_error() {
    let store = Arc::new(NoteStore::open_in_memory().expect("store"));
    let seeded = Arc::new(HiccupOnce {
        inner: HashEmbedder::new(DIM),
        calls: AtomicUsize::new(1),
    });
    let engine = RetrievalEngine::new(config(), seeded.clone(), store)
        .expect("valid engine")
        .with_retry(RetryPolicy::none());
    engine.index_note("qn-aaaaaaaa", "retry me").expect("index");

    seeded.calls.store(0, Ordering::SeqCst);
    let err = engine.search("retry", 3).expect_err("single attempt times out");
    assert!(err.is_transient());
}

#[test]
fn wrong_sized_vectors_are_rejected_before_any_insert() {
    let engine = engine_with(Arc::new(Liar));
    let err = engine
        .index_note("qn-aaaaaaaa", "some text")
        .expect_err("dimension mismatch");
    assert!(matches!(
        err,
        QuillError::DimensionMismatch {
            expected: DIM,
            actual: 17
        }
    ));
    assert_eq!(engine.stats().fragments, 0);
    engine.check_consistency().expect("indexes agree");
}

//! End-to-end retrieval scenarios against a real note store.
//!
//! # Scenarios covered
//!
//! 1. **Exact lexical match wins** — "capital of France" ranks the Paris note
//!    first over the Tokyo note.
//! 2. **Empty corpus** — any query returns an empty list, never an error.
//! 3. **Invalid chunking** — overlap larger than chunk size is rejected at
//!    construction.
//! 4. **Determinism** — repeated searches return identical results.
//! 5. **Weighted policy** — the fallback fusion policy ranks the same way on
//!    the canonical scenario.
//! 6. **Citation fields** — titles come from the store and JSON output keeps
//!    per-signal ranks.

use quill_core::QuillError;
use quill_core::config::{FusionPolicy, RetrievalConfig};
use quill_core::db::NoteStore;
use quill_search::{AnswerContext, HashEmbedder, RetrievalEngine};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn engine_over(store: &Arc<NoteStore>, config: RetrievalConfig) -> RetrievalEngine {
    let dim = config.embedding_dim;
    RetrievalEngine::new(config, Arc::new(HashEmbedder::new(dim)), store.clone())
        .expect("valid engine")
}

/// Store the two canonical notes, index them, and return their ids.
fn capitals(store: &NoteStore, engine: &RetrievalEngine) -> (String, String) {
    let paris = store
        .create("Paris", "Paris is the capital of France.")
        .expect("create paris");
    let tokyo = store
        .create("Tokyo", "Tokyo is the capital of Japan.")
        .expect("create tokyo");
    engine.index_note(&paris.id, &paris.content).expect("index paris");
    engine.index_note(&tokyo.id, &tokyo.content).expect("index tokyo");
    (paris.id, tokyo.id)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn capital_of_france_finds_paris_first() {
    let store = Arc::new(NoteStore::open_in_memory().expect("store"));
    let engine = engine_over(&store, RetrievalConfig::default());
    let (paris, tokyo) = capitals(&store, &engine);

    let top = engine.search("capital of France", 1).expect("search");
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].note_id, paris);
    assert_eq!(top[0].title, "Paris");
    assert_eq!(top[0].text, "Paris is the capital of France.");

    let both = engine.search("capital of France", 5).expect("search");
    assert_eq!(both.len(), 2);
    assert_eq!(both[1].note_id, tokyo);
    assert!(both[0].score > both[1].score);
}

#[test]
fn empty_corpus_returns_empty_list() {
    let store = Arc::new(NoteStore::open_in_memory().expect("store"));
    let engine = engine_over(&store, RetrievalConfig::default());

    let hits = engine.search("anything", 5).expect("empty corpus is not an error");
    assert!(hits.is_empty());

    let context = engine.context("anything", 5).expect("context");
    assert!(context.is_empty());
}

#[test]
fn overlap_larger_than_chunk_size_is_invalid() {
    let store = Arc::new(NoteStore::open_in_memory().expect("store"));
    let config = RetrievalConfig {
        chunk_size: 10,
        chunk_overlap: 12,
        ..RetrievalConfig::default()
    };
    let result = RetrievalEngine::new(config, Arc::new(HashEmbedder::default()), store);
    assert!(matches!(result, Err(QuillError::InvalidConfig(_))));
}

#[test]
fn repeated_searches_are_identical() {
    let store = Arc::new(NoteStore::open_in_memory().expect("store"));
    let engine = engine_over(&store, RetrievalConfig::default());
    capitals(&store, &engine);
    let extra = store
        .create("Rivers", "The Seine flows through Paris and the capital region.")
        .expect("create");
    engine.index_note(&extra.id, &extra.content).expect("index");

    let first = engine.search("Paris capital", 3).expect("search");
    for _ in 0..5 {
        assert_eq!(engine.search("Paris capital", 3).expect("search"), first);
    }
}

#[test]
fn weighted_fusion_agrees_on_the_canonical_scenario() {
    let store = Arc::new(NoteStore::open_in_memory().expect("store"));
    let config = RetrievalConfig {
        fusion: FusionPolicy::Weighted,
        ..RetrievalConfig::default()
    };
    let engine = engine_over(&store, config);
    let (paris, _) = capitals(&store, &engine);

    let top = engine.search("capital of France", 1).expect("search");
    assert_eq!(top[0].note_id, paris);
    assert!(top[0].score <= 1.0 + f32::EPSILON);
}

#[test]
fn cited_fragments_serialize_with_signal_ranks() {
    let store = Arc::new(NoteStore::open_in_memory().expect("store"));
    let engine = engine_over(&store, RetrievalConfig::default());
    capitals(&store, &engine);

    let hits = engine.search("capital of France", 1).expect("search");
    let json = serde_json::to_value(&hits[0]).expect("serialize");
    assert_eq!(json["rank"], 1);
    assert_eq!(json["lexical_rank"], 1);
    assert_eq!(json["semantic_rank"], 1);
    assert_eq!(json["title"], "Paris");
}

#[test]
fn context_prompt_cites_the_top_fragment() {
    let store = Arc::new(NoteStore::open_in_memory().expect("store"));
    let engine = engine_over(&store, RetrievalConfig::default());
    capitals(&store, &engine);

    let context = engine.context("capital of France", 1).expect("context");
    let AnswerContext::Cited { sources, .. } = &context else {
        panic!("expected cited context, got {context:?}");
    };
    assert_eq!(sources.len(), 1);
    let prompt = context.render_prompt().expect("prompt");
    assert!(prompt.contains("- Paris is the capital of France."));
    assert!(prompt.contains("Query: capital of France"));
}

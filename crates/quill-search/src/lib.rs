#![forbid(unsafe_code)]
//! quill-search library.
//!
//! Hybrid retrieval over note fragments: a BM25 lexical index and an
//! embedding index kept in lock-step by [`sync::CorpusSynchronizer`], fused
//! by [`fusion::Fusion`], and served through [`engine::RetrievalEngine`].
//!
//! # Conventions
//!
//! - **Errors**: retrieval operations return [`quill_core::Result`]; the
//!   answer layer uses `anyhow::Result` around external generators.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod answer;
pub mod engine;
pub mod fusion;
mod hit;
pub mod lexical;
pub mod retry;
pub mod semantic;
pub mod sync;

pub use answer::{Answer, AnswerContext, EmptyReason, Generator};
pub use engine::{CitedFragment, EngineStats, ReindexSummary, RetrievalEngine};
pub use fusion::{FusedHit, Fusion};
pub use hit::ScoredFragment;
pub use retry::RetryPolicy;
pub use semantic::{Embedder, HashEmbedder};
pub use sync::{CorpusSynchronizer, IndexReport};

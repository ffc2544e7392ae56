//! Embedding-based retrieval: the embedder capability and the vector index.

mod embed;
pub mod search;

pub use embed::{Embedder, HashEmbedder, embed_with_timeout};

#[cfg(test)]
pub(crate) use embed::FailingEmbedder;
pub use search::SemanticIndex;

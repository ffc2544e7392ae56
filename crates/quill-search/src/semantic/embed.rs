use crate::lexical::tokenize;
use anyhow::Result;
use quill_core::QuillError;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Text-to-vector capability consumed by the semantic index.
///
/// Implementations must be deterministic for identical input and always
/// return vectors of [`Embedder::dimension`] entries.
pub trait Embedder: Send + Sync + 'static {
    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch inference for efficiency.
    ///
    /// # Errors
    ///
    /// Returns an error if any text fails to embed.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Model-free embedder using signed feature hashing.
///
/// Every lowercase token and every character trigram of each token is hashed
/// with FNV-1a into one of `dim` buckets; a second hash bit picks the sign.
/// The vector is L2-normalized, so cosine similarity reduces to a dot product.
/// Texts that share vocabulary land close together; it knows nothing about
/// synonyms.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dim: 384 }
    }
}

impl HashEmbedder {
    /// Create an embedder with the given dimension (at least 1).
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        #[allow(clippy::cast_possible_truncation)]
        let bucket = (hash % self.dim as u64) as usize;
        let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dim];
        for token in tokenize(text) {
            self.add_feature(&mut vector, &token, 1.0);

            let padded: Vec<char> = format!("#{token}#").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vector, &gram, 0.5);
            }
        }
        normalize(&mut vector);
        Ok(vector)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Embed `texts` on a worker thread, giving up after `timeout`.
///
/// Each call runs on its own `quill-embed` thread. A thread cannot be
/// cancelled, so on timeout the worker is detached: it keeps running until the
/// embedder returns and its result is then dropped. A backend that hangs
/// forever therefore pins one thread per timed-out call, retries included.
///
/// # Errors
///
/// - [`QuillError::RetrievalTimeout`] if the deadline passes first.
/// - [`QuillError::EmbeddingFailed`] if the embedder errors, panics, or
///   returns the wrong number of vectors.
pub fn embed_with_timeout(
    embedder: &Arc<dyn Embedder>,
    texts: Vec<String>,
    timeout: Duration,
) -> Result<Vec<Vec<f32>>, QuillError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let expected = texts.len();
    let worker = Arc::clone(embedder);
    let (tx, rx) = mpsc::sync_channel(1);
    let started = Instant::now();

    thread::Builder::new()
        .name("quill-embed".into())
        .spawn(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            if tx.send(worker.embed_batch(&refs)).is_err() {
                tracing::debug!(texts = refs.len(), "embed worker finished after its caller gave up");
            }
        })
        .map_err(|err| QuillError::EmbeddingFailed(format!("cannot spawn embed worker: {err}")))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(vectors)) if vectors.len() == expected => Ok(vectors),
        Ok(Ok(vectors)) => Err(QuillError::EmbeddingFailed(format!(
            "embedding batch length mismatch: expected {expected}, got {}",
            vectors.len()
        ))),
        Ok(Err(err)) => Err(QuillError::EmbeddingFailed(format!("{err:#}"))),
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(?timeout, texts = expected, "embedding timed out");
            Err(QuillError::RetrievalTimeout {
                operation: "embedding",
                waited: started.elapsed(),
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(QuillError::EmbeddingFailed(
            "embed worker exited without a result".into(),
        )),
    }
}

/// Embedder that rejects everything.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct FailingEmbedder {
    pub dim: usize,
}

#[cfg(test)]
impl Embedder for FailingEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("embedding backend unavailable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn hash_embeddings_are_deterministic_and_normalized() -> Result<()> {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("Paris is the capital of France.")?;
        let b = embedder.embed("Paris is the capital of France.")?;
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn shared_vocabulary_is_closer() -> Result<()> {
        let embedder = HashEmbedder::default();
        let query = embedder.embed("capital of France")?;
        let paris = embedder.embed("Paris is the capital of France.")?;
        let garden = embedder.embed("Water the tomatoes every morning.")?;
        assert!(cosine(&query, &paris) > cosine(&query, &garden));
        Ok(())
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() -> Result<()> {
        let embedder = HashEmbedder::new(8);
        assert!(embedder.embed("")?.iter().all(|v| *v == 0.0));
        Ok(())
    }

    #[test]
    fn fnv1a_matches_reference_vector() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn timeout_is_reported_as_retrieval_timeout() {
        struct Slow;
        impl Embedder for Slow {
            fn dimension(&self) -> usize {
                2
            }
            fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                thread::sleep(Duration::from_millis(500));
                Ok(vec![1.0, 0.0])
            }
        }

        let embedder: Arc<dyn Embedder> = Arc::new(Slow);
        let err = embed_with_timeout(&embedder, vec!["x".into()], Duration::from_millis(20))
            .expect_err("slow embedder must time out");
        assert!(matches!(err, QuillError::RetrievalTimeout { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn timed_out_worker_finishes_in_the_background() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Slow(Arc<AtomicUsize>);
        impl Embedder for Slow {
            fn dimension(&self) -> usize {
                2
            }
            fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                thread::sleep(Duration::from_millis(200));
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1.0, 0.0])
            }
        }

        let finished = Arc::new(AtomicUsize::new(0));
        let embedder: Arc<dyn Embedder> = Arc::new(Slow(Arc::clone(&finished)));
        let started = Instant::now();
        let err = embed_with_timeout(&embedder, vec!["x".into()], Duration::from_millis(20))
            .expect_err("slow embedder must time out");
        assert!(matches!(err, QuillError::RetrievalTimeout { .. }));
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        let deadline = Instant::now() + Duration::from_secs(5);
        while finished.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        let vectors = embed_with_timeout(&embedder, vec!["y".into()], Duration::from_secs(5))
            .expect("later call with a generous deadline succeeds");
        assert_eq!(vectors, vec![vec![1.0, 0.0]]);
    }

    #[test]
    fn backend_errors_become_embedding_failed() {
        let embedder: Arc<dyn Embedder> = Arc::new(FailingEmbedder { dim: 4 });
        let err = embed_with_timeout(&embedder, vec!["x".into()], Duration::from_secs(1))
            .expect_err("failing embedder must fail");
        assert!(matches!(err, QuillError::EmbeddingFailed(_)));
        assert!(err.to_string().contains("unavailable"));
    }

    #[test]
    fn empty_batch_skips_the_worker() {
        let embedder: Arc<dyn Embedder> = Arc::new(FailingEmbedder { dim: 4 });
        let vectors = embed_with_timeout(&embedder, Vec::new(), Duration::from_millis(1))
            .expect("empty batch succeeds");
        assert!(vectors.is_empty());
    }
}

//! Brute-force similarity index over the knowledge corpus.
//!
//! Built once from every chunk in a single embedding batch and never mutated
//! afterwards. Queries score all stored vectors by dot product, which equals
//! cosine similarity for the unit vectors the embedders produce.

use std::cmp::Ordering;

use helpdesk_core::types::DocumentChunk;
use serde::Serialize;
use tracing::{debug, info};

use crate::embedding::DynEmbeddingService;
use crate::error::EmbeddingError;

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Immutable store of chunks and their embedding vectors.
#[derive(Debug)]
pub struct EmbeddingIndex {
    chunks: Vec<DocumentChunk>,
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
}

impl EmbeddingIndex {
    /// Embed every chunk in one batch and build the index.
    ///
    /// Fails if the embedder errors, returns a different number of vectors
    /// than chunks, or returns vectors of differing length. Nothing is kept on
    /// failure.
    pub async fn build<E>(chunks: Vec<DocumentChunk>, embedder: &E) -> Result<Self, EmbeddingError>
    where
        E: DynEmbeddingService + ?Sized,
    {
        if chunks.is_empty() {
            info!("Embedding index built from an empty corpus");
            return Ok(Self {
                chunks,
                vectors: Vec::new(),
                dimensions: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch_boxed(&texts).await?;
        Self::from_parts(chunks, vectors)
    }

    /// Assemble an index from precomputed vectors, applying the same checks
    /// as [`EmbeddingIndex::build`].
    pub fn from_parts(
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, EmbeddingError> {
        if vectors.len() != chunks.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }

        info!(chunks = chunks.len(), dimensions, "Embedding index built");
        Ok(Self {
            chunks,
            vectors,
            dimensions,
        })
    }

    /// Embed `text` and return the `min(k, len)` most similar chunks, best
    /// first. Equal scores keep corpus order.
    pub async fn query<E>(
        &self,
        text: &str,
        k: usize,
        embedder: &E,
    ) -> Result<Vec<SimilarityResult>, EmbeddingError>
    where
        E: DynEmbeddingService + ?Sized,
    {
        if k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let input = [text.to_string()];
        let mut vectors = embedder.embed_batch_boxed(&input).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        let query_vec = vectors.swap_remove(0);
        self.rank(&query_vec, k)
    }

    /// Score every stored vector against `query_vec` and keep the top `k`.
    pub fn rank(&self, query_vec: &[f32], k: usize) -> Result<Vec<SimilarityResult>, EmbeddingError> {
        if query_vec.len() != self.dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vec.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(query_vec, v)))
            .collect();

        // sort_by is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        debug!(k, returned = scored.len(), "Similarity query ranked");
        Ok(scored
            .into_iter()
            .map(|(i, score)| SimilarityResult {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Vector length shared by every entry (`0` for an empty index).
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingService, MockEmbedding};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn chunks(texts: &[&str]) -> Vec<DocumentChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(id, t)| DocumentChunk {
                id,
                text: t.to_string(),
            })
            .collect()
    }

    /// Maps known texts to fixed vectors and counts calls.
    struct TableEmbedding {
        table: Vec<(&'static str, Vec<f32>)>,
        calls: AtomicUsize,
    }

    impl TableEmbedding {
        fn new(table: Vec<(&'static str, Vec<f32>)>) -> Self {
            Self {
                table,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    impl EmbeddingService for TableEmbedding {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            texts
                .iter()
                .map(|t| {
                    self.table
                        .iter()
                        .find(|(k, _)| *k == t.as_str())
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| EmbeddingError::Request(format!("unknown text {}", t)))
                })
                .collect()
        }
    }

    /// Always returns a fixed number of vectors, regardless of input.
    struct ShortEmbedding {
        count: usize,
    }

    impl EmbeddingService for ShortEmbedding {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(vec![vec![1.0, 0.0]; self.count])
        }
    }

    struct FailingEmbedding;

    impl EmbeddingService for FailingEmbedding {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Request("provider down".to_string()))
        }
    }

    fn axis_table() -> TableEmbedding {
        TableEmbedding::new(vec![
            ("pricing", vec![1.0, 0.0, 0.0]),
            ("support", vec![0.0, 1.0, 0.0]),
            ("agents", vec![0.0, 0.0, 1.0]),
            ("pricing twin", vec![1.0, 0.0, 0.0]),
            ("how much", vec![0.9, 0.1, 0.0]),
            ("short", vec![1.0, 0.0]),
        ])
    }

    // =========================================================================
    // build
    // =========================================================================

    #[tokio::test]
    async fn test_build_embeds_in_one_batch() {
        let embedder = axis_table();
        let index = EmbeddingIndex::build(chunks(&["pricing", "support", "agents"]), &embedder)
            .await
            .unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimensions(), 3);
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_build_empty_corpus_skips_embedder() {
        let embedder = axis_table();
        let index = EmbeddingIndex::build(Vec::new(), &embedder).await.unwrap();
        assert!(index.is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_build_count_mismatch_fails() {
        let result = EmbeddingIndex::build(chunks(&["a", "b", "c"]), &ShortEmbedding { count: 2 }).await;
        assert_eq!(
            result.unwrap_err(),
            EmbeddingError::CountMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[tokio::test]
    async fn test_build_inconsistent_dimensions_fails() {
        let embedder = axis_table();
        let result = EmbeddingIndex::build(chunks(&["pricing", "short"]), &embedder).await;
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_build_propagates_embedder_error() {
        let result = EmbeddingIndex::build(chunks(&["a"]), &FailingEmbedding).await;
        assert!(matches!(result, Err(EmbeddingError::Request(_))));
    }

    // =========================================================================
    // query
    // =========================================================================

    #[tokio::test]
    async fn test_query_orders_by_score() {
        let embedder = axis_table();
        let index = EmbeddingIndex::build(chunks(&["support", "pricing", "agents"]), &embedder)
            .await
            .unwrap();
        let results = index.query("how much", 2, &embedder).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "pricing");
        assert_eq!(results[1].chunk.text, "support");
        assert!((results[0].score - 0.9).abs() < 1e-6);
        assert!((results[1].score - 0.1).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_ties_keep_insertion_order() {
        let embedder = axis_table();
        let index = EmbeddingIndex::build(
            chunks(&["support", "pricing twin", "pricing"]),
            &embedder,
        )
        .await
        .unwrap();
        let results = index.query("pricing", 2, &embedder).await.unwrap();
        assert_eq!(results[0].chunk.id, 1);
        assert_eq!(results[1].chunk.id, 2);
        assert_eq!(results[0].score, results[1].score);
    }

    #[tokio::test]
    async fn test_query_returns_min_k_n_non_increasing() {
        let embedder = MockEmbedding::with_dimensions(32);
        let corpus = chunks(&["alpha", "beta", "gamma", "delta", "epsilon"]);
        let index = EmbeddingIndex::build(corpus, &embedder).await.unwrap();

        for k in [1, 2, 5, 9] {
            let results = index.query("beta release", k, &embedder).await.unwrap();
            assert_eq!(results.len(), k.min(5));
            for pair in results.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }
    }

    #[tokio::test]
    async fn test_query_is_repeatable() {
        let embedder = MockEmbedding::with_dimensions(32);
        let index = EmbeddingIndex::build(chunks(&["one", "two", "three"]), &embedder)
            .await
            .unwrap();
        let first = index.query("two", 3, &embedder).await.unwrap();
        let second = index.query("two", 3, &embedder).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_query_k_zero_skips_embedder() {
        let embedder = axis_table();
        let index = EmbeddingIndex::build(chunks(&["pricing"]), &embedder)
            .await
            .unwrap();
        let results = index.query("pricing", 0, &embedder).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let embedder = axis_table();
        let index = EmbeddingIndex::build(chunks(&["pricing"]), &embedder)
            .await
            .unwrap();
        let result = index.query("short", 1, &embedder).await;
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_query_embedding_failure_is_error() {
        let index = EmbeddingIndex::from_parts(chunks(&["a"]), vec![vec![1.0]]).unwrap();
        let result = index.query("a", 1, &FailingEmbedding).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_query_through_dyn_service() {
        let embedder: Box<dyn DynEmbeddingService> = Box::new(MockEmbedding::with_dimensions(8));
        let index = EmbeddingIndex::build(chunks(&["x", "y"]), embedder.as_ref())
            .await
            .unwrap();
        let results = index.query("x", 1, embedder.as_ref()).await.unwrap();
        assert_eq!(results[0].chunk.text, "x");
        assert!((results[0].score - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_dot() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
    }
}

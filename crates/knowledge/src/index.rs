//! Embedding index with maximal-marginal-relevance retrieval.
//!
//! Built once per ingestion cycle from the full chunk list and never patched.
//! Retrieval fetches the `fetch_k` nearest chunks and then greedily picks `k`
//! of them, trading relevance to the question against similarity to chunks
//! already picked so near-duplicates do not crowd the result.

use crate::embeddings::EmbeddingProvider;
use crate::types::Chunk;
use crate::vector_index::{FlatIndex, VectorIndex};
use std::sync::Arc;
use unichat_core::{AppError, AppResult};

/// Retrieval tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalOptions {
    /// Candidates considered before diversity re-ranking
    pub fetch_k: usize,

    /// 1.0 ranks purely by relevance, 0.0 purely by diversity
    pub lambda: f32,

    /// Chunks per embedding request during build
    pub batch_size: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            fetch_k: 20,
            lambda: 0.5,
            batch_size: 100,
        }
    }
}

pub struct EmbeddingIndex {
    chunks: Vec<Chunk>,
    vectors: Box<dyn VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    options: RetrievalOptions,
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("chunks", &self.chunks.len())
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_name())
            .field("options", &self.options)
            .finish()
    }
}

/// Any failure while embedding is a backend failure.
fn backend_error(err: AppError) -> AppError {
    match err {
        AppError::EmbeddingBackend(_) => err,
        other => AppError::EmbeddingBackend(other.to_string()),
    }
}

impl EmbeddingIndex {
    /// Embed every chunk and build the searchable index.
    ///
    /// # Errors
    /// `AppError::EmbeddingBackend` if the backend fails or returns the wrong
    /// number or size of vectors.
    pub async fn build(
        chunks: Vec<Chunk>,
        provider: Arc<dyn EmbeddingProvider>,
        options: RetrievalOptions,
    ) -> AppResult<Self> {
        tracing::info!(
            chunks = chunks.len(),
            provider = provider.provider_name(),
            model = provider.model_name(),
            "Building embedding index"
        );

        let mut vectors = FlatIndex::new(provider.dimensions());
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        for batch in texts.chunks(options.batch_size.max(1)) {
            let embeddings = provider.embed_batch(batch).await.map_err(backend_error)?;
            if embeddings.len() != batch.len() {
                return Err(AppError::EmbeddingBackend(format!(
                    "Requested {} embeddings, received {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            for embedding in embeddings {
                vectors.insert(embedding)?;
            }
        }

        tracing::debug!(vectors = vectors.len(), dimensions = vectors.dimensions(), "Embedding index ready");

        Ok(Self {
            chunks,
            vectors: Box::new(vectors),
            provider,
            options,
        })
    }

    /// The `k` chunks best balancing relevance to `question` against redundancy.
    pub async fn retrieve(&self, question: &str, k: usize) -> AppResult<Vec<Chunk>> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query = self.provider.embed(question).await.map_err(backend_error)?;
        let candidates = self.vectors.search(&query, self.options.fetch_k.max(k));

        let embeddings: Vec<&[f32]> = candidates
            .iter()
            .filter_map(|(position, _)| self.vectors.embedding(*position))
            .collect();

        let picked = maximal_marginal_relevance(&query, &embeddings, k, self.options.lambda);

        let results: Vec<Chunk> = picked
            .into_iter()
            .filter_map(|i| candidates.get(i))
            .filter_map(|(position, _)| self.chunks.get(*position).cloned())
            .collect();

        tracing::debug!(
            candidates = candidates.len(),
            returned = results.len(),
            ids = ?results.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            "Retrieved chunks"
        );

        Ok(results)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }
}

/// Greedy MMR selection over `candidates`, returning their indices in pick order.
///
/// The first pick is the candidate most similar to the query; each later pick
/// maximises `lambda * sim(query, d) - (1 - lambda) * max sim(d, picked)`.
/// Ties go to the earlier candidate.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[&[f32]],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let limit = k.min(candidates.len());
    if limit == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, c))
        .collect();

    let mut first = 0;
    for (i, score) in relevance.iter().enumerate() {
        if *score > relevance[first] {
            first = i;
        }
    }

    let mut picked = vec![first];
    while picked.len() < limit {
        let mut best: Option<(usize, f32)> = None;

        for (i, query_score) in relevance.iter().enumerate() {
            if picked.contains(&i) {
                continue;
            }
            let redundancy = picked
                .iter()
                .map(|&p| cosine_similarity(candidates[i], candidates[p]))
                .fold(f32::NEG_INFINITY, f32::max);
            let score = lambda * query_score - (1.0 - lambda) * redundancy;

            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        match best {
            Some((i, _)) => picked.push(i),
            None => break,
        }
    }

    picked
}

/// Cosine similarity; zero for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chunk(n: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("Doc-{}", n),
            text: text.to_string(),
            start_offset: 0,
            source_path: PathBuf::from("a.txt"),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_mmr_skips_near_duplicates() {
        let query = [1.0, 0.2];
        let a = [1.0, 0.0];
        let duplicate = [1.0, 0.0];
        let different = [0.5, 1.0];
        let candidates: Vec<&[f32]> = vec![&a, &duplicate, &different];

        assert_eq!(maximal_marginal_relevance(&query, &candidates, 2, 0.5), vec![0, 2]);
        // Pure relevance keeps the duplicate
        assert_eq!(maximal_marginal_relevance(&query, &candidates, 2, 1.0), vec![0, 1]);
    }

    #[test]
    fn test_mmr_bounds() {
        let a = [1.0, 0.0];
        let candidates: Vec<&[f32]> = vec![&a];
        assert_eq!(maximal_marginal_relevance(&[1.0, 0.0], &candidates, 3, 0.5), vec![0]);
        assert!(maximal_marginal_relevance(&[1.0, 0.0], &candidates, 0, 0.5).is_empty());
        assert!(maximal_marginal_relevance(&[1.0, 0.0], &[], 3, 0.5).is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_finds_relevant_chunk() {
        let chunks = vec![
            chunk(0, "Bananas grow in tropical climates."),
            chunk(1, "Paris is the capital of France."),
            chunk(2, "The Rhine flows through Germany."),
        ];
        let provider = Arc::new(TrigramProvider::new(384));
        let index = EmbeddingIndex::build(chunks, provider, RetrievalOptions::default())
            .await
            .unwrap();

        let results = index.retrieve("What is the capital of France?", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "Doc-1");
    }

    #[tokio::test]
    async fn test_fetch_k_limits_candidates() {
        let chunks = (0..5).map(|n| chunk(n, &format!("entry number {}", n))).collect();
        let options = RetrievalOptions {
            fetch_k: 2,
            ..Default::default()
        };
        let index = EmbeddingIndex::build(chunks, Arc::new(TrigramProvider::new(64)), options)
            .await
            .unwrap();

        // fetch_k below k is raised to k
        assert_eq!(index.retrieve("entry", 3).await.unwrap().len(), 3);
        assert_eq!(index.retrieve("entry", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_index_retrieves_nothing() {
        let index = EmbeddingIndex::build(
            Vec::new(),
            Arc::new(TrigramProvider::new(8)),
            RetrievalOptions::default(),
        )
        .await
        .unwrap();
        assert!(index.is_empty());
        assert!(index.retrieve("anything", 3).await.unwrap().is_empty());
    }

    #[derive(Debug)]
    struct FailingProvider {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn provider_name(&self) -> &str {
            "failing"
        }
        fn model_name(&self) -> &str {
            "none"
        }
        fn dimensions(&self) -> usize {
            4
        }
        async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Other("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_backend_failure_is_fatal_to_build() {
        let provider = Arc::new(FailingProvider {
            calls: AtomicUsize::new(0),
        });
        let result = EmbeddingIndex::build(
            vec![chunk(0, "text")],
            provider.clone(),
            RetrievalOptions::default(),
        )
        .await;

        match result {
            Err(AppError::EmbeddingBackend(message)) => {
                assert!(message.contains("connection refused"))
            }
            other => panic!("expected EmbeddingBackend error, got {:?}", other),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}

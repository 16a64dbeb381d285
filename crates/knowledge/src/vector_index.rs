//! Vector index abstraction.
//!
//! The retrieval layer only needs exhaustive similarity search over a few
//! thousand vectors, so the default backend is a flat in-memory index.

use crate::index::cosine_similarity;
use unichat_core::{AppError, AppResult};

/// Trait for vector index backends.
///
/// Vectors are addressed by insertion position.
pub trait VectorIndex: Send + Sync {
    /// Append a vector, returning its position.
    fn insert(&mut self, embedding: Vec<f32>) -> AppResult<usize>;

    /// Positions and scores of the `top_k` most similar vectors, best first.
    /// Equal scores keep insertion order.
    fn search(&self, query: &[f32], top_k: usize) -> Vec<(usize, f32)>;

    fn embedding(&self, position: usize) -> Option<&[f32]>;

    fn dimensions(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exhaustive cosine-similarity index.
#[derive(Debug, Default)]
pub struct FlatIndex {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn insert(&mut self, embedding: Vec<f32>) -> AppResult<usize> {
        if embedding.len() != self.dimensions {
            return Err(AppError::EmbeddingBackend(format!(
                "Embedding has {} dimensions, index expects {}",
                embedding.len(),
                self.dimensions
            )));
        }
        self.vectors.push(embedding);
        Ok(self.vectors.len() - 1)
    }

    fn search(&self, query: &[f32], top_k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    fn embedding(&self, position: usize) -> Option<&[f32]> {
        self.vectors.get(position).map(Vec::as_slice)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}

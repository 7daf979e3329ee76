//! Exact inner-product index over unit vectors.

use std::sync::Arc;

use tracing::debug;

use super::{EncodingError, TextEmbedder, similarity::inner_product, similarity::l2_normalize};
use crate::AssessmentItem;

/// Flat index: every search scans all stored vectors.
///
/// Vectors are stored contiguously, `dimension` floats per row, in catalog
/// order. Row `i` belongs to item `i` of the generation it was built for.
pub struct EmbeddingIndex {
    embedder: Arc<dyn TextEmbedder>,
    dimension: usize,
    vectors: Vec<f32>,
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("embedder", &self.embedder.name())
            .field("dimension", &self.dimension)
            .field("len", &self.len())
            .finish()
    }
}

impl EmbeddingIndex {
    /// Encodes every item and returns the finished index.
    ///
    /// Fails as a whole if any single item cannot be encoded.
    pub fn build(
        embedder: Arc<dyn TextEmbedder>,
        items: &[AssessmentItem],
    ) -> Result<Self, EncodingError> {
        let dimension = embedder.dimension();
        let texts: Vec<String> = items.iter().map(AssessmentItem::descriptive_text).collect();
        let embeddings = embedder.embed_batch(&texts)?;

        if embeddings.len() != items.len() {
            return Err(EncodingError::Failed(format!(
                "embedder returned {} vectors for {} items",
                embeddings.len(),
                items.len()
            )));
        }

        let mut vectors = Vec::with_capacity(items.len() * dimension);
        for mut embedding in embeddings {
            check_dimension(dimension, &embedding)?;
            l2_normalize(&mut embedding)?;
            vectors.extend_from_slice(&embedding);
        }

        debug!(
            embedder = embedder.name(),
            embedder_version = embedder.version(),
            dimension,
            items = items.len(),
            "built embedding index"
        );

        Ok(Self {
            embedder,
            dimension,
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len() / self.dimension.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedder_name(&self) -> &'static str {
        self.embedder.name()
    }

    /// Returns up to `k` `(row, score)` pairs, best first.
    ///
    /// `k` is clamped to the number of rows. Equal scores keep insertion order.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<(usize, f32)>, EncodingError> {
        let mut query_vector = self.embedder.embed(query)?;
        check_dimension(self.dimension, &query_vector)?;
        l2_normalize(&mut query_vector)?;

        let mut scores: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|row| inner_product(&query_vector, row))
            .enumerate()
            .collect();

        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        scores.truncate(k.min(self.len()));
        Ok(scores)
    }
}

fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), EncodingError> {
    if vector.len() != expected {
        return Err(EncodingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

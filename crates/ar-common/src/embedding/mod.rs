pub mod config;
#[cfg(feature = "fastembed")]
pub mod fastembed_embedder;
pub mod hash_embedder;
pub mod index;
pub mod similarity;
pub mod tokenizer;

use std::sync::Arc;

use tracing::warn;

pub use config::{EmbedderKind, EmbeddingConfig};
#[cfg(feature = "fastembed")]
pub use fastembed_embedder::FastEmbedder;
pub use hash_embedder::HashEmbedder;
pub use index::EmbeddingIndex;
pub use similarity::{inner_product, l2_normalize};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("embedding failed: {0}")]
    Failed(String),
    #[error("embedding has zero norm")]
    ZeroNorm,
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Text to fixed-dimension vector.
///
/// Implementations:
/// - `HashEmbedder`: feature hashing, deterministic, needs no model files
/// - `FastEmbedder`: all-MiniLM-L6-v2 sentence embeddings (`fastembed` feature)
pub trait TextEmbedder: Send + Sync {
    /// Implementation name ("hash", "fastembed").
    fn name(&self) -> &'static str;

    /// Changes whenever the same text would produce a different vector.
    fn version(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError>;

    /// Batch variant. The default loops; model-backed embedders should override.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncodingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Builds the configured embedder.
///
/// Returns `None` for [`EmbedderKind::Disabled`] and whenever a model cannot be
/// loaded; callers then rank lexically.
pub fn create_embedder(config: &EmbeddingConfig) -> Option<Arc<dyn TextEmbedder>> {
    match config.kind {
        EmbedderKind::Disabled => None,
        EmbedderKind::Hash => Some(Arc::new(HashEmbedder::new(config.dimension))),
        EmbedderKind::FastEmbed => load_fastembed(),
    }
}

#[cfg(feature = "fastembed")]
fn load_fastembed() -> Option<Arc<dyn TextEmbedder>> {
    match FastEmbedder::try_new() {
        Ok(embedder) => Some(Arc::new(embedder)),
        Err(err) => {
            warn!(error = %err, "failed to load sentence embedding model; ranking lexically");
            None
        }
    }
}

#[cfg(not(feature = "fastembed"))]
fn load_fastembed() -> Option<Arc<dyn TextEmbedder>> {
    warn!("built without the `fastembed` feature; ranking lexically");
    None
}

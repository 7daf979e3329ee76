use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::{EncodingError, TextEmbedder};

const MINILM_DIMENSION: usize = 384;

/// all-MiniLM-L6-v2 sentence embeddings through ONNX Runtime.
///
/// The model is fetched into the fastembed cache on first use, so
/// construction fails when it is neither cached nor downloadable.
pub struct FastEmbedder {
    model: TextEmbedding,
}

impl FastEmbedder {
    pub fn try_new() -> Result<Self, EncodingError> {
        let options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        let model = TextEmbedding::try_new(options)
            .map_err(|err| EncodingError::ModelUnavailable(err.to_string()))?;
        Ok(Self { model })
    }
}

impl TextEmbedder for FastEmbedder {
    fn name(&self) -> &'static str {
        "fastembed"
    }

    fn version(&self) -> &str {
        "all-minilm-l6-v2"
    }

    fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| EncodingError::Failed("model returned no embedding".into()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncodingError> {
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|err| EncodingError::Failed(err.to_string()))
    }
}

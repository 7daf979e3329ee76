use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EmbedderKind {
    #[default]
    Hash,
    #[strum(serialize = "fastembed")]
    #[serde(rename = "fastembed")]
    FastEmbed,
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub kind: EmbedderKind,
    /// Only used by the hash embedder; model-backed embedders report their own.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::Hash,
            dimension: 384,
        }
    }
}

impl EmbeddingConfig {
    /// Reads `AR_EMBEDDER` and `AR_EMBEDDING_DIMENSION`, keeping defaults for
    /// unset or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            kind: std::env::var("AR_EMBEDDER")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.kind),
            dimension: std::env::var("AR_EMBEDDING_DIMENSION")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|dim: &usize| *dim > 0)
                .unwrap_or(defaults.dimension),
        }
    }
}

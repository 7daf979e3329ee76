//! Generation lifecycle and query dispatch.
//!
//! A [`Generation`] is built completely before it becomes visible; the only
//! shared mutation is the single pointer assignment in
//! [`RecommendationService::index`]. Queries clone the current `Arc` and work
//! on that snapshot, so a concurrent re-index never affects them.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use strum::AsRefStr;
use tracing::{debug, info, warn};

use crate::catalog::{self, ValidationError};
use crate::embedding::{
    EmbeddingConfig, EmbeddingIndex, EncodingError, TextEmbedder, create_embedder,
};
use crate::{AssessmentItem, ScoredItem, lexical, run_id};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub embedding: EmbeddingConfig,
    /// Rank lexically when embedding fails instead of reporting the failure.
    pub lexical_fallback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            lexical_fallback: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            embedding: EmbeddingConfig::from_env(),
            lexical_fallback: parse_toggle(
                std::env::var("AR_LEXICAL_FALLBACK").ok().as_deref(),
                true,
            ),
        }
    }
}

/// Case-insensitive `true/false`, `1/0`, `yes/no`, `on/off`. Anything else keeps `default`.
fn parse_toggle(raw: Option<&str>, default: bool) -> bool {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return default;
    };

    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(value, default, "unrecognized boolean setting; using default");
            default
        }
    }
}

/// Which ranking produced a result. The two modes are never blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScoringMode {
    Embedding,
    Lexical,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no catalog has been indexed yet")]
    NotReady,
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub count: usize,
    pub generation_id: String,
    pub scoring_mode: ScoringMode,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub mode: ScoringMode,
    pub items: Vec<ScoredItem>,
}

/// Immutable catalog snapshot plus the index built over it.
#[derive(Debug)]
pub struct Generation {
    id: String,
    indexed_at: DateTime<Utc>,
    items: Vec<AssessmentItem>,
    index: Option<EmbeddingIndex>,
    lexical_fallback: bool,
}

impl Generation {
    fn build(
        items: Vec<AssessmentItem>,
        embedder: Option<&Arc<dyn TextEmbedder>>,
        lexical_fallback: bool,
    ) -> Result<Self, EncodingError> {
        let index = match embedder {
            Some(embedder) => match EmbeddingIndex::build(Arc::clone(embedder), &items) {
                Ok(index) => Some(index),
                Err(err) if lexical_fallback => {
                    warn!(
                        embedder = embedder.name(),
                        error = %err,
                        "failed to build embedding index; generation will rank lexically"
                    );
                    None
                }
                Err(err) => return Err(err),
            },
            None => None,
        };

        Ok(Self {
            id: run_id::generate(),
            indexed_at: Utc::now(),
            items,
            index,
            lexical_fallback,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn indexed_at(&self) -> DateTime<Utc> {
        self.indexed_at
    }

    /// Items in catalog order.
    pub fn items(&self) -> &[AssessmentItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn scoring_mode(&self) -> ScoringMode {
        if self.index.is_some() {
            ScoringMode::Embedding
        } else {
            ScoringMode::Lexical
        }
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            count: self.items.len(),
            generation_id: self.id.clone(),
            scoring_mode: self.scoring_mode(),
            indexed_at: self.indexed_at,
        }
    }

    /// Ranks this generation's items for `text`.
    ///
    /// `top_k` must be positive and is clamped to the item count.
    pub fn rank(&self, text: &str, top_k: usize) -> Result<Ranking, ServiceError> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }
        if top_k == 0 {
            return Err(ValidationError::NonPositiveTopK.into());
        }
        let k = top_k.min(self.items.len());

        let Some(index) = &self.index else {
            return Ok(self.rank_lexically(text, k));
        };

        match index.search(text, k) {
            Ok(hits) => {
                debug!(generation_id = %self.id, k, hits = hits.len(), "embedding query");
                let items = hits
                    .into_iter()
                    .map(|(row, score)| ScoredItem {
                        item: self.items[row].clone(),
                        similarity_score: f64::from(score),
                    })
                    .collect();
                Ok(Ranking {
                    mode: ScoringMode::Embedding,
                    items,
                })
            }
            Err(err) if self.lexical_fallback => {
                warn!(
                    generation_id = %self.id,
                    error = %err,
                    "failed to encode query; ranking lexically"
                );
                Ok(self.rank_lexically(text, k))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn rank_lexically(&self, text: &str, k: usize) -> Ranking {
        let items = lexical::rank(text, &self.items, k);
        debug!(generation_id = %self.id, k, hits = items.len(), "lexical query");
        Ranking {
            mode: ScoringMode::Lexical,
            items,
        }
    }
}

/// Owns the current generation and serves queries against it.
pub struct RecommendationService {
    embedder: Option<Arc<dyn TextEmbedder>>,
    lexical_fallback: bool,
    current: RwLock<Option<Arc<Generation>>>,
}

impl std::fmt::Debug for RecommendationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationService")
            .field("embedder", &self.embedder.as_ref().map(|e| e.name()))
            .field("lexical_fallback", &self.lexical_fallback)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl RecommendationService {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_embedder(create_embedder(&config.embedding), config.lexical_fallback)
    }

    pub fn with_embedder(embedder: Option<Arc<dyn TextEmbedder>>, lexical_fallback: bool) -> Self {
        Self {
            embedder,
            lexical_fallback,
            current: RwLock::new(None),
        }
    }

    /// Name of the configured embedder, if any.
    pub fn embedder_name(&self) -> Option<&'static str> {
        self.embedder.as_ref().map(|e| e.name())
    }

    /// Validates a raw catalog document and makes it the current generation.
    ///
    /// On any error the previous generation stays current.
    pub fn index(&self, raw: &Value) -> Result<IndexStats, ServiceError> {
        let items = catalog::validate(raw)?;
        self.install(items)
    }

    /// Typed counterpart of [`Self::index`].
    pub fn index_items(&self, items: Vec<AssessmentItem>) -> Result<IndexStats, ServiceError> {
        let items = catalog::validate_items(items)?;
        self.install(items)
    }

    fn install(&self, items: Vec<AssessmentItem>) -> Result<IndexStats, ServiceError> {
        let generation = Generation::build(items, self.embedder.as_ref(), self.lexical_fallback)?;
        let stats = generation.stats();

        let previous = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            current.replace(Arc::new(generation))
        };

        info!(
            generation_id = %stats.generation_id,
            previous_generation_id = previous.as_ref().map(|g| g.id()).unwrap_or(""),
            count = stats.count,
            scoring_mode = stats.scoring_mode.as_ref(),
            "catalog indexed"
        );

        Ok(stats)
    }

    /// Snapshot of the current generation.
    pub fn current(&self) -> Result<Arc<Generation>, ServiceError> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ServiceError::NotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.current().is_ok()
    }

    pub fn item_count(&self) -> usize {
        self.current().map(|g| g.len()).unwrap_or(0)
    }

    pub fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredItem>, ServiceError> {
        self.current()?
            .rank(text, top_k)
            .map(|ranking| ranking.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::test_support::{analyst_and_sales, item};
    use serde_json::json;

    struct BrokenEmbedder;

    impl TextEmbedder for BrokenEmbedder {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn version(&self) -> &str {
            "test"
        }

        fn dimension(&self) -> usize {
            8
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, EncodingError> {
            Err(EncodingError::ModelUnavailable("model missing".into()))
        }
    }

    /// Hash embeddings, except that any text mentioning "poison" fails.
    struct PoisonEmbedder;

    impl TextEmbedder for PoisonEmbedder {
        fn name(&self) -> &'static str {
            "poison"
        }

        fn version(&self) -> &str {
            "test"
        }

        fn dimension(&self) -> usize {
            128
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
            if text.to_lowercase().contains("poison") {
                return Err(EncodingError::Failed("poisoned input".into()));
            }
            HashEmbedder::new(128).embed(text)
        }
    }

    fn lexical_service() -> RecommendationService {
        RecommendationService::with_embedder(None, true)
    }

    fn hash_service() -> RecommendationService {
        RecommendationService::with_embedder(Some(Arc::new(HashEmbedder::new(256))), true)
    }

    fn ids(items: &[ScoredItem]) -> Vec<&str> {
        items.iter().map(|s| s.item.id.as_str()).collect()
    }

    fn catalog_json() -> Value {
        serde_json::to_value(analyst_and_sales()).unwrap()
    }

    #[test]
    fn query_before_index_is_not_ready() {
        let service = hash_service();

        assert!(matches!(
            service.query("data", 5),
            Err(ServiceError::NotReady)
        ));
        assert!(!service.is_ready());
        assert_eq!(service.item_count(), 0);
    }

    #[test]
    fn empty_query_is_rejected() {
        let service = hash_service();
        service.index(&catalog_json()).unwrap();

        for text in ["", "   \t"] {
            assert!(matches!(
                service.query(text, 5),
                Err(ServiceError::Validation(ValidationError::EmptyQuery))
            ));
        }
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let service = lexical_service();
        service.index(&catalog_json()).unwrap();

        assert!(matches!(
            service.query("data", 0),
            Err(ServiceError::Validation(ValidationError::NonPositiveTopK))
        ));
    }

    #[test]
    fn top_k_is_clamped_to_catalog_size() {
        let service = hash_service();
        let items = vec![
            item("1", "Numerical Reasoning", "numbers", "Cognitive", &[], &[]),
            item("2", "Verbal Reasoning", "words", "Cognitive", &[], &[]),
            item("3", "Personality", "traits", "Behavioral", &[], &[]),
        ];
        service.index_items(items).unwrap();

        let results = service.query("reasoning", 1000).unwrap();

        assert!(results.len() <= 3);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn lexical_mode_returns_only_matching_items() {
        let service = lexical_service();
        let stats = service.index(&catalog_json()).unwrap();
        assert_eq!(stats.scoring_mode, ScoringMode::Lexical);

        let results = service.query("data analyst", 5).unwrap();

        assert_eq!(ids(&results), ["a"]);
        assert_eq!(results[0].similarity_score, 3.25);
    }

    #[test]
    fn lexical_mode_returns_empty_when_nothing_matches() {
        let service = lexical_service();
        service.index(&catalog_json()).unwrap();

        assert!(service.query("zzzz", 5).unwrap().is_empty());
    }

    #[test]
    fn embedding_mode_ranks_every_item() {
        let service = hash_service();
        let stats = service.index(&catalog_json()).unwrap();
        assert_eq!(stats.scoring_mode, ScoringMode::Embedding);

        let results = service.query("data analyst", 5).unwrap();

        assert_eq!(ids(&results), ["a", "b"]);
        assert!(results[0].similarity_score >= results[1].similarity_score);
    }

    #[test]
    fn indexing_identical_catalog_twice_is_idempotent() {
        let service = hash_service();

        service.index(&catalog_json()).unwrap();
        let first = service.query("sales skills", 2).unwrap();
        service.index(&catalog_json()).unwrap();
        let second = service.query("sales skills", 2).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn listing_returns_catalog_in_original_order() {
        let service = hash_service();
        let mut items = analyst_and_sales();
        items.reverse();
        items[0].duration_minutes = Some(20);

        service.index_items(items.clone()).unwrap();

        assert_eq!(service.current().unwrap().items(), items.as_slice());
    }

    #[test]
    fn rejected_catalog_leaves_previous_generation_intact() {
        let service = hash_service();
        let stats = service.index(&catalog_json()).unwrap();

        for bad in [json!([]), json!({"not": "a list"}), json!([{"id": "x"}])] {
            let err = service.index(&bad).unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{err:?}");
        }

        let current = service.current().unwrap();
        assert_eq!(current.id(), stats.generation_id);
        assert_eq!(current.items(), analyst_and_sales().as_slice());
    }

    #[test]
    fn each_index_creates_a_new_generation() {
        let service = hash_service();

        let first = service.index(&catalog_json()).unwrap();
        let held = service.current().unwrap();
        let second = service.index_items(vec![item("c", "Coding", "", "", &[], &[])]).unwrap();

        assert_ne!(first.generation_id, second.generation_id);
        // A snapshot taken earlier still sees its own items.
        assert_eq!(held.len(), 2);
        assert_eq!(service.item_count(), 1);
    }

    #[test]
    fn broken_embedder_falls_back_to_lexical_generation() {
        let service = RecommendationService::with_embedder(Some(Arc::new(BrokenEmbedder)), true);

        let stats = service.index(&catalog_json()).unwrap();
        assert_eq!(stats.scoring_mode, ScoringMode::Lexical);

        assert_eq!(ids(&service.query("data analyst", 5).unwrap()), ["a"]);
    }

    #[test]
    fn encoding_failure_without_fallback_keeps_previous_generation() {
        let service = RecommendationService::with_embedder(Some(Arc::new(PoisonEmbedder)), false);
        let stats = service.index(&catalog_json()).unwrap();

        let poisoned = vec![item("p", "poison", "", "", &[], &[])];
        assert!(matches!(
            service.index_items(poisoned),
            Err(ServiceError::Encoding(EncodingError::Failed(_)))
        ));

        assert_eq!(service.current().unwrap().id(), stats.generation_id);
        assert_eq!(ids(&service.query("data analyst", 1).unwrap()), ["a"]);
    }

    #[test]
    fn unencodable_query_falls_back_to_lexical_ranking() {
        let service = hash_service();
        service.index(&catalog_json()).unwrap();
        let generation = service.current().unwrap();

        let ranking = generation.rank("???", 5).unwrap();

        assert_eq!(ranking.mode, ScoringMode::Lexical);
        assert!(ranking.items.is_empty());
    }

    #[test]
    fn unencodable_query_without_fallback_is_an_error() {
        let service = RecommendationService::with_embedder(Some(Arc::new(HashEmbedder::new(64))), false);
        service.index(&catalog_json()).unwrap();

        assert!(matches!(
            service.query("???", 5),
            Err(ServiceError::Encoding(EncodingError::ZeroNorm))
        ));
    }

    #[test]
    fn concurrent_queries_observe_exactly_one_generation() {
        let service = hash_service();
        let catalog_for = |prefix: &str| -> Vec<AssessmentItem> {
            (0..4)
                .map(|n| {
                    item(
                        &format!("{prefix}-{n}"),
                        &format!("{prefix} assessment {n}"),
                        "general assessment",
                        "General",
                        &["assessment"],
                        &["Candidate"],
                    )
                })
                .collect()
        };
        let old = catalog_for("old");
        let new = catalog_for("new");
        service.index_items(old.clone()).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let results = service.query("assessment", 10).unwrap();
                        assert_eq!(results.len(), 4);
                        let prefix = results[0].item.id.split('-').next().unwrap().to_string();
                        assert!(
                            results.iter().all(|r| r.item.id.starts_with(&prefix)),
                            "mixed generations: {:?}",
                            ids(&results)
                        );
                    }
                });
            }

            scope.spawn(|| {
                for round in 0..50 {
                    let next = if round % 2 == 0 { new.clone() } else { old.clone() };
                    service.index_items(next).unwrap();
                }
            });
        });
    }

    #[test]
    fn engine_config_defaults_to_hash_with_fallback() {
        let config = EngineConfig::default();
        let service = RecommendationService::new(&config);

        assert_eq!(service.embedder_name(), Some("hash"));
        assert!(config.lexical_fallback);
    }

    #[test]
    fn scoring_mode_serializes_snake_case() {
        assert_eq!(serde_json::to_value(ScoringMode::Embedding).unwrap(), "embedding");
        assert_eq!(ScoringMode::Lexical.as_ref(), "lexical");
    }

    #[test]
    fn lexical_fallback_toggle_ignores_case() {
        assert!(!parse_toggle(Some("FALSE"), true));
        assert!(!parse_toggle(Some("No"), true));
        assert!(!parse_toggle(Some(" off "), true));
        assert!(parse_toggle(Some("TRUE"), false));
        assert!(parse_toggle(None, true));
        assert!(parse_toggle(Some(""), true));
        assert!(parse_toggle(Some("maybe"), true));
    }
}

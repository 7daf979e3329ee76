pub mod catalog;
pub mod catalog_file;
pub mod embedding;
pub mod lexical;
pub mod logging;
pub mod run_id;
pub mod service;

use serde::{Deserialize, Serialize};

pub use catalog::ValidationError;
pub use embedding::{EmbeddingIndex, EncodingError, TextEmbedder};
pub use service::{
    EngineConfig, Generation, IndexStats, RecommendationService, ScoringMode, ServiceError,
};

/// One entry of the assessment catalog.
///
/// Required fields are enforced by [`catalog::validate`]; only
/// `duration_minutes` may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub recommended_roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl AssessmentItem {
    /// Lowercased name, description, category, tags and roles joined by spaces.
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = vec![&self.name, &self.description, &self.category];
        parts.extend(self.tags.iter().map(String::as_str));
        parts.extend(self.recommended_roles.iter().map(String::as_str));
        parts.join(" ").to_lowercase()
    }

    /// Sentence-style rendering used as embedding input.
    pub fn descriptive_text(&self) -> String {
        format!(
            "{}. {} Categories: {}. Tags: {}. Recommended for: {}.",
            self.name,
            self.description,
            self.category,
            self.tags.join(", "),
            self.recommended_roles.join(", ")
        )
    }
}

/// A catalog item paired with the relevance score it earned for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: AssessmentItem,
    pub similarity_score: f64,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::AssessmentItem;

    pub fn item(
        id: &str,
        name: &str,
        description: &str,
        category: &str,
        tags: &[&str],
        roles: &[&str],
    ) -> AssessmentItem {
        AssessmentItem {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            category: category.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            recommended_roles: roles.iter().map(|r| r.to_string()).collect(),
            duration_minutes: None,
        }
    }

    /// The two-item catalog used by the lexical ranking scenario.
    pub fn analyst_and_sales() -> Vec<AssessmentItem> {
        vec![
            item(
                "a",
                "Data Analyst Test",
                "skills in data analysis",
                "Analytics",
                &["data"],
                &["Data Analyst"],
            ),
            item(
                "b",
                "Sales Test",
                "sales skills",
                "Sales",
                &["sales"],
                &["Sales Rep"],
            ),
        ]
    }
}

//! Keyword-overlap scoring used when no vector index is available.
//!
//! The arithmetic is fixed: scores must be reproducible across runs and
//! versions, so weights are constants rather than configuration.

use std::collections::BTreeSet;

use crate::{AssessmentItem, ScoredItem};

const EXACT_MATCH: f64 = 1.0;
const PARTIAL_TOKEN_MATCH: f64 = 0.5;
const CATEGORY_MATCH: f64 = 2.0;
const ROLE_MATCH: f64 = 1.5;

/// Query words shorter than this never earn partial token matches.
const PARTIAL_MIN_LEN: usize = 4;

/// Lowercased, de-duplicated whitespace words of a query.
pub fn query_words(query: &str) -> BTreeSet<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Scores one item against a query. Returns 0.0 for a query without words.
pub fn score(query: &str, item: &AssessmentItem) -> f64 {
    score_words(&query_words(query), item)
}

fn score_words(words: &BTreeSet<String>, item: &AssessmentItem) -> f64 {
    if words.is_empty() {
        return 0.0;
    }

    let searchable = item.searchable_text();
    let tokens: Vec<&str> = searchable.split_whitespace().collect();
    let mut raw = 0.0;

    for word in words {
        if searchable.contains(word.as_str()) {
            raw += EXACT_MATCH;
        }
        // An exact token hit is counted again here on purpose.
        if word.chars().count() >= PARTIAL_MIN_LEN {
            let partial_hits = tokens
                .iter()
                .filter(|token| token.contains(word.as_str()) || word.contains(*token))
                .count();
            raw += PARTIAL_TOKEN_MATCH * partial_hits as f64;
        }
    }

    let category = item.category.to_lowercase();
    if words.iter().any(|word| category.contains(word.as_str())) {
        raw += CATEGORY_MATCH;
    }

    let matched_roles = item
        .recommended_roles
        .iter()
        .map(|role| role.to_lowercase())
        .filter(|role| words.iter().any(|word| role.contains(word.as_str())))
        .count();
    raw += ROLE_MATCH * matched_roles as f64;

    round4(raw / words.len() as f64)
}

/// Four decimals, ties to even.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round_ties_even() / 10_000.0
}

/// Scores every item, drops non-positive scores and keeps the best `top_k`.
///
/// Sorting is stable, so equal scores stay in catalog order.
pub fn rank(query: &str, items: &[AssessmentItem], top_k: usize) -> Vec<ScoredItem> {
    let words = query_words(query);

    let mut scored: Vec<ScoredItem> = items
        .iter()
        .filter_map(|item| {
            let similarity_score = score_words(&words, item);
            (similarity_score > 0.0).then(|| ScoredItem {
                item: item.clone(),
                similarity_score,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    scored.truncate(top_k);
    scored
}

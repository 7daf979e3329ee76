use axum::{Json, body::Bytes, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use ar_common::{ScoredItem, ScoringMode};

use crate::SharedState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub query: String,
    pub scoring_mode: ScoringMode,
    pub generation_id: String,
    pub recommendations: Vec<ScoredItem>,
}

fn parse_request(body: &[u8]) -> Result<RecommendRequest, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::BadRequest(format!("invalid request body: {err}")))
}

fn resolve_top_k(requested: Option<i64>, default_top_k: usize) -> Result<usize, ApiError> {
    match requested {
        None => Ok(default_top_k),
        Some(k) if k > 0 => Ok(usize::try_from(k).unwrap_or(usize::MAX)),
        Some(_) => Err(ApiError::BadRequest("top_k must be positive".into())),
    }
}

pub async fn recommend(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<RecommendResponse>, ApiError> {
    let request = parse_request(&body)?;
    let top_k = resolve_top_k(request.top_k, state.config.default_top_k)?;

    let generation = state.service.current()?;
    let query = request.query;

    let (generation, query, ranking) = tokio::task::spawn_blocking(move || {
        let ranking = generation.rank(&query, top_k);
        (generation, query, ranking)
    })
    .await
    .map_err(|err| ApiError::Internal(format!("ranking task failed: {err}")))?;
    let ranking = ranking?;

    info!(
        generation_id = generation.id(),
        top_k,
        returned = ranking.items.len(),
        scoring_mode = ranking.mode.as_ref(),
        "recommendation served"
    );

    Ok(Json(RecommendResponse {
        query,
        scoring_mode: ranking.mode,
        generation_id: generation.id().to_string(),
        recommendations: ranking.items,
    }))
}

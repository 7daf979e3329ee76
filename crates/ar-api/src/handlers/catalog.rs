use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ar_common::{AssessmentItem, ScoringMode};

use crate::SharedState;
use crate::error::ApiError;

const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, Default)]
pub struct CatalogQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_limit() -> i64 {
    10
}

fn validate_limit(limit: i64) -> Result<usize, ApiError> {
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    usize::try_from(limit).map_err(|err| ApiError::BadRequest(err.to_string()))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub message: String,
    pub count: usize,
    pub generation_id: String,
    pub scoring_mode: ScoringMode,
}

#[derive(Debug, Serialize)]
pub struct CatalogListing {
    pub total: usize,
    pub showing: usize,
    pub generation_id: String,
    pub assessments: Vec<AssessmentItem>,
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

fn rejected(status: StatusCode, message: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(message)
    } else {
        ApiError::BadRequest(message)
    }
}

/// Contents of the `file` form field, which must name a `.json` file.
async fn read_catalog_file(mut multipart: Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| rejected(err.status(), err.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default();
        if !file_name.ends_with(".json") {
            return Err(ApiError::BadRequest("Only JSON files are accepted".into()));
        }

        return field
            .bytes()
            .await
            .map_err(|err| rejected(err.status(), err.body_text()));
    }

    Err(ApiError::BadRequest("missing form field: file".into()))
}

/// Replaces the catalog with an uploaded JSON array.
///
/// Accepts a multipart form with a `file` field or the array as a raw body.
/// The new generation becomes visible only after it is fully indexed.
pub async fn upload_catalog(
    State(state): State<SharedState>,
    request: Request,
) -> Result<Json<UploadResponse>, ApiError> {
    let body = if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|err| rejected(err.status(), err.body_text()))?;
        read_catalog_file(multipart).await?
    } else {
        Bytes::from_request(request, &state)
            .await
            .map_err(|err| rejected(err.status(), err.body_text()))?
    };

    let raw: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("invalid JSON format".into()))?;

    let worker_state = state.clone();
    let stats = tokio::task::spawn_blocking(move || worker_state.service.index(&raw))
        .await
        .map_err(|err| ApiError::Internal(format!("indexing task failed: {err}")))??;

    Ok(Json(UploadResponse {
        status: "success",
        message: format!("catalog uploaded with {} assessments", stats.count),
        count: stats.count,
        generation_id: stats.generation_id,
        scoring_mode: stats.scoring_mode,
    }))
}

pub async fn list_catalog(
    State(state): State<SharedState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogListing>, ApiError> {
    let limit = validate_limit(query.limit)?;
    let generation = state.service.current()?;

    let assessments = generation.items().iter().take(limit).cloned().collect::<Vec<_>>();

    Ok(Json(CatalogListing {
        total: generation.len(),
        showing: assessments.len(),
        generation_id: generation.id().to_string(),
        assessments,
    }))
}

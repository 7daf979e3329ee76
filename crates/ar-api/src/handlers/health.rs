use std::sync::atomic::Ordering;

use axum::{Json, extract::State};
use serde_json::json;

use crate::SharedState;
use crate::error::ApiError;

pub async fn livez() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Ready once a catalog generation is installed, until shutdown begins.
pub async fn readyz(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.readiness.load(Ordering::SeqCst) {
        return Err(ApiError::ServiceUnavailable("shutting_down".into()));
    }

    let generation = state.service.current()?;

    Ok(Json(json!({
        "status": "ok",
        "application": env!("CARGO_PKG_NAME"),
        "catalog_size": generation.len(),
        "generation_id": generation.id(),
        "scoring_mode": generation.scoring_mode(),
        "embedder": state.service.embedder_name(),
    })))
}

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{borrow::Cow, future::Future};
use thiserror::Error;
use tracing::{error, warn};

use ar_common::ServiceError;

tokio::task_local! {
    static REQUEST_ID: String;
}

fn sanitize_message(message: &str) -> String {
    const MAX_LEN: usize = 240;

    let mut cleaned = message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .map(|token| {
            if token.contains("://") {
                "[redacted-url]"
            } else if token.starts_with('/') || token.contains('\\') {
                "[redacted-path]"
            } else {
                token
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.chars().count() > MAX_LEN {
        cleaned = cleaned.chars().take(MAX_LEN).collect();
        cleaned.push('…');
    }

    if cleaned.trim().is_empty() {
        "unexpected error".to_string()
    } else {
        cleaned
    }
}

pub async fn with_request_id<Fut, T>(request_id: Option<String>, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    if let Some(request_id) = request_id {
        REQUEST_ID.scope(request_id, fut).await
    } else {
        fut.await
    }
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|value| value.clone()).ok()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    request_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let code = self.code();
        let request_id = current_request_id();

        if status.is_server_error() {
            error!(
                code,
                status = %status,
                request_id = request_id.as_deref().unwrap_or(""),
                error = %self,
                "api_error"
            );
        } else {
            warn!(
                code,
                status = %status,
                request_id = request_id.as_deref().unwrap_or(""),
                error = %self,
                "api_error"
            );
        }

        let body = Json(ErrorResponse {
            code,
            message: self.public_message().into_owned(),
            request_id,
        });

        (status, body).into_response()
    }
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn public_message(&self) -> Cow<'static, str> {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::ServiceUnavailable(msg) => {
                Cow::Owned(sanitize_message(msg))
            }
            ApiError::Internal(_) => Cow::Borrowed("internal server error"),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Validation(err) => ApiError::BadRequest(err.to_string()),
            ServiceError::NotReady => ApiError::ServiceUnavailable(ServiceError::NotReady.to_string()),
            ServiceError::Encoding(err) => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use ar_common::{EncodingError, ValidationError};
    use http_body_util::BodyExt;
    use serde_json::Value;

    use super::*;

    async fn body_json(response: axum::response::Response) -> (StatusCode, Value) {
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        (parts.status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn includes_request_id_in_response_body_when_present() {
        let err = ApiError::Internal("boom".into());
        let response = with_request_id(Some("req-123".into()), async { err.into_response() }).await;

        let (status, json) = body_json(response).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["request_id"], "req-123");
        assert_eq!(json["message"], "internal server error");
    }

    #[tokio::test]
    async fn validation_errors_map_to_bad_request_with_reason() {
        let err: ApiError = ServiceError::from(ValidationError::EmptyQuery).into();

        let (status, json) = body_json(err.into_response()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "bad_request");
        assert_eq!(json["message"], "empty query");
    }

    #[test]
    fn service_errors_map_to_status_codes() {
        assert_eq!(
            ApiError::from(ServiceError::NotReady).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(ServiceError::Encoding(EncodingError::ZeroNorm)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::PayloadTooLarge("limit".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn sanitize_redacts_urls_and_paths() {
        let cleaned = sanitize_message("failed at /srv/data/catalog.json via https://x.y\nretry");
        assert_eq!(cleaned, "failed at [redacted-path] via [redacted-url] retry");
    }
}

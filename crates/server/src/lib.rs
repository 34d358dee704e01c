//! LC Voice Server
//!
//! HTTP server tying the crates together: session endpoints for the web
//! form, the platform webhook, and the operational surface (health,
//! readiness, metrics).

pub mod auth;
pub mod http;
pub mod metrics;
pub mod state;
pub mod webhook;

pub use http::create_router;
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use lc_voice_core::Error;

/// Handler error that renders the core taxonomy as an HTTP response.
///
/// The body is `{"error": kind, "message": ..., "retryable": bool}` so the
/// form frontend can decide whether a retry is worth offering.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    /// Status code for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::SchemaViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotReady(_) => StatusCode::CONFLICT,
            Error::UpstreamUnavailable(_) | Error::ExtractionFailed(_) => StatusCode::BAD_GATEWAY,
            Error::Configuration(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        metrics::record_error(self.0.kind());

        let body = serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
            "retryable": self.0.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_violation_returns_422() {
        let err = ApiError(Error::SchemaViolation("bad enum value".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn not_found_returns_404() {
        let err = ApiError(Error::NotFound("session abc".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn not_ready_returns_409() {
        let err = ApiError(Error::NotReady("call still running".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn upstream_unavailable_returns_502() {
        let err = ApiError(Error::UpstreamUnavailable("connect timeout".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn extraction_failure_returns_502() {
        let err = ApiError(Error::ExtractionFailed("no JSON in reply".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn internal_returns_500() {
        let err = ApiError(Error::Internal("something broke".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn platform_errors_convert_through_core() {
        let err: ApiError = lc_voice_platform::PlatformError::NotFound("call c-1".to_string()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = lc_voice_platform::PlatformError::Api("HTTP 500".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}

//! Bearer token authentication
//!
//! Optional shared-key auth for the session API. Public paths (health,
//! readiness, metrics, the signature-checked webhook) bypass it. Token
//! comparison is constant-time.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;

use lc_voice_config::Settings;

/// Middleware enforcing bearer auth when enabled in settings.
///
/// Reads the settings from the request extensions; the router installs them
/// through an `Extension` layer.
pub async fn auth_middleware(req: Request, next: Next) -> Response {
    let Some(config) = req.extensions().get::<Arc<Settings>>().cloned() else {
        tracing::error!("Settings extension missing; rejecting request");
        return unauthorized("Authentication is not configured");
    };

    let auth = &config.server.auth;
    if !auth.enabled || is_public(&auth.public_paths, req.uri().path()) {
        return next.run(req).await;
    }

    let Some(expected) = auth.api_key.as_deref().filter(|key| !key.is_empty()) else {
        // Enabled without a key: fail closed rather than open.
        tracing::error!("Authentication enabled but no API key is configured");
        return unauthorized("Authentication is not configured");
    };

    match bearer_token(req.headers()) {
        Some(token) if token_matches(token, expected) => next.run(req).await,
        Some(_) => unauthorized("Invalid API key"),
        None => unauthorized("Missing bearer token"),
    }
}

fn is_public(public_paths: &[String], path: &str) -> bool {
    public_paths.iter().any(|public| public == path)
}

/// Token from an `Authorization: Bearer ...` header, if present.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn token_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn unauthorized(message: &str) -> Response {
    crate::metrics::record_error("unauthorized");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": message,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_auth(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        let headers = headers_with_auth("Bearer secret-key");
        assert_eq!(bearer_token(&headers), Some("secret-key"));
    }

    #[test]
    fn test_bearer_token_missing_header() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_bearer_token_wrong_scheme() {
        let headers = headers_with_auth("Basic dXNlcjpwYXNz");
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_bearer_token_empty_value() {
        let headers = headers_with_auth("Bearer  ");
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches("secret", "secret"));
        assert!(!token_matches("secret", "other"));
        assert!(!token_matches("secret", "secret-but-longer"));
        assert!(!token_matches("", "secret"));
    }

    #[test]
    fn test_public_path_matching() {
        let public = vec!["/health".to_string(), "/webhook/voice".to_string()];
        assert!(is_public(&public, "/health"));
        assert!(is_public(&public, "/webhook/voice"));
        assert!(!is_public(&public, "/api/lc/sessions"));
        assert!(!is_public(&public, "/health/deep"));
    }

    #[test]
    fn test_unauthorized_response_status() {
        let response = unauthorized("Invalid API key");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

//! HTTP API
//!
//! Router assembly and the session endpoints the LC form frontend calls.
//! One session wraps one web call: the form posts its partial data, hands
//! the returned join URL to the platform SDK, and collects the completed
//! record from the data endpoint once the call has ended.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use lc_voice_agent::{build_assistant, merge_record};
use lc_voice_core::{flatten, nest, CallStatus, Error};
use lc_voice_platform::{CallSession, PlatformError};

use crate::state::AppState;
use crate::{auth, metrics, webhook, ApiError};

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.config.server.cors_origins,
        state.config.server.cors_enabled,
    );

    Router::new()
        // Session endpoints
        .route("/api/lc/sessions", post(create_session))
        .route("/api/lc/sessions/:id/status", get(session_status))
        .route("/api/lc/sessions/:id/transcript", get(session_transcript))
        .route("/api/lc/sessions/:id/end", post(end_session))
        .route("/api/lc/sessions/:id/recording", get(session_recording))
        .route("/api/lc/sessions/:id/data", get(session_data))
        // Platform webhook
        .route("/webhook/voice", post(webhook::handle_webhook))
        // Operational surface
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics::metrics_handler))
        // Middleware (order matters - auth runs after CORS but before handlers)
        .layer(axum::middleware::from_fn(
            |req: axum::extract::Request, next: axum::middleware::Next| async move {
                auth::auth_middleware(req, next).await
            },
        ))
        .layer(Extension(state.config.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns permissive layer (for dev)
/// - If cors_origins is empty, defaults to localhost:3000 for safety
/// - Invalid origins are skipped with a warning
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        // CORS disabled - allow all (only for development!)
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    if origins.is_empty() {
        // No origins configured - default to localhost for safety
        tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    // Parse configured origins
    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("All configured CORS origins are invalid, falling back to localhost");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Create a session and start the web call.
///
/// The body is the provided form data, nested or flat. Unknown fields and
/// schema-violating values are rejected outright so bad data never reaches
/// the call.
async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if !body.is_object() {
        return Err(ApiError(Error::SchemaViolation(
            "Request body must be a JSON object of form fields".to_string(),
        )));
    }

    let provided = flatten(&body);
    let built = build_assistant(&state.schema, &state.config.assistant, &provided)?;

    let session = state.sessions.create(built.provided.clone())?;
    metrics::record_session_created();

    let call = match state.voice.start_call(&built.request).await {
        Ok(call) => call,
        Err(err) => {
            // A session without its call is useless; do not leak it.
            state.sessions.remove(&session.id);
            return Err(err.into());
        }
    };

    state.sessions.bind_call(&session, &call.id);
    session.set_status(call.status);
    metrics::record_call_started();
    metrics::set_sessions_active(state.sessions.count());

    tracing::info!(
        session_id = %session.id,
        call_id = %call.id,
        provided = built.provided.len(),
        missing = built.missing.len(),
        "Session created and call started"
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session_id": session.id,
            "call_id": call.id,
            "status": session.status().as_str(),
            "web_call_url": call.web_call_url,
            "missing_fields": built.missing,
        })),
    ))
}

/// Current call status for a session.
///
/// Refreshes from the platform when possible; falls back to the cached
/// status when the platform cannot be reached, so polling keeps working.
async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = lookup(&state, &id)?;
    let call_id = session.call_id();

    if let Some(call_id) = &call_id {
        match state.voice.call(call_id).await {
            Ok(details) => session.set_status(CallStatus::from_platform(&details.status)),
            Err(err) => {
                tracing::warn!(
                    call_id = %call_id,
                    error = %err,
                    "Status refresh failed; serving cached status"
                );
            }
        }
    }

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "call_id": call_id,
        "status": session.status().as_str(),
    })))
}

/// Transcript of the session's call. 409 until the call has ended.
async fn session_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = lookup(&state, &id)?;
    let call_id = required_call(&session)?;

    let transcript = state.voice.transcript(&call_id).await?;

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "call_id": call_id,
        "turns": transcript.turns,
        "transcript": transcript.to_plain_text(),
    })))
}

/// End an in-progress call. Ending an already-ended call succeeds.
async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = lookup(&state, &id)?;
    let call_id = required_call(&session)?;

    state.voice.end_call(&call_id).await?;
    session.set_status(CallStatus::Ended);

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "call_id": call_id,
        "status": session.status().as_str(),
    })))
}

/// Recording URL for an ended call. 404 until the platform has one.
async fn session_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = lookup(&state, &id)?;
    let call_id = required_call(&session)?;

    let recording_url = state.voice.recording_url(&call_id).await?;

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "call_id": call_id,
        "recording_url": recording_url,
    })))
}

/// Complete form data for a finished session.
///
/// Fetches the transcript, extracts the newly collected fields, and merges
/// them under the provided fields. The session is removed once its data has
/// been handed out; retrying after that returns 404.
async fn session_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let session = lookup(&state, &id)?;
    let call_id = required_call(&session)?;

    let transcript = state.voice.transcript(&call_id).await?;

    let started = Instant::now();
    let collected = match state
        .extractor
        .extract(&state.schema, &session.provided, &transcript)
        .await
    {
        Ok(collected) => {
            metrics::record_extraction(started.elapsed(), "ok");
            collected
        }
        Err(err) => {
            metrics::record_extraction(started.elapsed(), "failed");
            if !matches!(err, Error::ExtractionFailed(_)) {
                return Err(err.into());
            }
            // The conversation still has value; hand the transcript back so
            // the caller can fall back to manual entry.
            metrics::record_error(err.kind());
            tracing::error!(
                session_id = %session.id,
                error = %err,
                "Extraction failed; returning transcript only"
            );
            return Ok((
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": err.kind(),
                    "message": err.to_string(),
                    "retryable": err.is_retryable(),
                    "session_id": session.id,
                    "call_id": call_id,
                    "transcript": transcript.to_plain_text(),
                })),
            ));
        }
    };

    let record = merge_record(&state.schema, &session.provided, &collected);

    // The session is finished; drop it so its id cannot be replayed.
    state.sessions.remove(&session.id);
    metrics::set_sessions_active(state.sessions.count());

    tracing::info!(
        session_id = %session.id,
        provided = record.provided_paths.len(),
        collected = record.collected_paths.len(),
        missing = record.missing.len(),
        confidence = ?record.confidence,
        "Complete data retrieved"
    );

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "session_id": session.id,
            "call_id": call_id,
            "complete_lc_data": nest(&record.complete),
            "provided_fields": record.provided_paths,
            "collected_fields": record.collected_paths,
            "missing_fields": record.missing,
            "confidence": record.confidence,
            "transcript": transcript.to_plain_text(),
        })),
    ))
}

/// Liveness and configuration sanity.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut checks = serde_json::Map::new();
    let mut all_healthy = true;

    let voice_ok = !state.config.voice.api_key.is_empty();
    checks.insert(
        "voice_platform".to_string(),
        serde_json::json!({
            "status": if voice_ok { "ok" } else { "missing_api_key" },
            "endpoint": state.config.voice.endpoint,
        }),
    );
    if !voice_ok {
        all_healthy = false;
    }

    let extraction_ok = !state.config.extraction.api_key.is_empty();
    checks.insert(
        "extraction".to_string(),
        serde_json::json!({
            "status": if extraction_ok { "ok" } else { "missing_api_key" },
            "model": state.config.extraction.model,
        }),
    );
    if !extraction_ok {
        all_healthy = false;
    }

    checks.insert(
        "webhook_signature".to_string(),
        serde_json::json!({
            "status": if state.webhook_verifier.is_some() { "enabled" } else { "disabled" },
        }),
    );

    checks.insert(
        "schema".to_string(),
        serde_json::json!({
            "status": "ok",
            "name": state.schema.name,
            "sections": state.schema.sections.len(),
            "fields": state.schema.fields().count(),
        }),
    );

    let status = if all_healthy { "healthy" } else { "degraded" };
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "version": env!("CARGO_PKG_VERSION"),
            "checks": checks
        })),
    )
}

/// Readiness check with voice platform connectivity.
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut checks = serde_json::Map::new();
    let mut ready = true;

    checks.insert(
        "sessions".to_string(),
        serde_json::json!({
            "status": "ok",
            "count": state.sessions.count(),
            "max": state.config.server.max_sessions,
        }),
    );

    let voice_status = match tokio::time::timeout(
        std::time::Duration::from_secs(2),
        state.voice.ping(),
    )
    .await
    {
        Ok(Ok(())) => "ok",
        Ok(Err(PlatformError::Network(_))) => {
            ready = false;
            "unreachable"
        }
        Ok(Err(_)) => {
            ready = false;
            "error"
        }
        Err(_) => {
            ready = false;
            "timeout"
        }
    };

    checks.insert(
        "voice_platform".to_string(),
        serde_json::json!({
            "status": voice_status,
            "endpoint": state.config.voice.endpoint,
        }),
    );

    let status = if ready { "ready" } else { "not_ready" };
    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "checks": checks
        })),
    )
}

fn lookup(state: &AppState, id: &str) -> Result<Arc<CallSession>, ApiError> {
    state
        .sessions
        .get(id)
        .ok_or_else(|| ApiError(Error::NotFound(format!("Session {} not found", id))))
}

fn required_call(session: &CallSession) -> Result<String, ApiError> {
    session
        .call_id()
        .ok_or_else(|| ApiError(Error::Internal(format!("Session {} has no call", session.id))))
}

//! Platform webhook endpoint
//!
//! Receives call lifecycle events from the voice platform. The signature is
//! verified over the raw body bytes before any JSON parsing; when a webhook
//! secret is configured, unsigned deliveries are rejected. Processing
//! problems after that point still return 200 so the platform does not
//! retry deliveries we cannot use.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use lc_voice_core::CallStatus;
use lc_voice_platform::WebhookEvent;

use crate::metrics;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-vapi-signature";

/// Handle one webhook delivery.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(verifier) = &state.webhook_verifier {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());

        let Some(signature) = signature else {
            tracing::warn!("Webhook rejected: missing signature header");
            return reject(StatusCode::UNAUTHORIZED, "Missing webhook signature");
        };

        if !verifier.verify(&body, signature) {
            tracing::warn!("Webhook rejected: invalid signature");
            return reject(StatusCode::UNAUTHORIZED, "Invalid webhook signature");
        }
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "Webhook body is not valid JSON");
            return reject(StatusCode::BAD_REQUEST, "Body is not valid JSON");
        }
    };

    let Some(kind) = event.kind() else {
        tracing::warn!("Webhook event carries no type");
        return reject(StatusCode::BAD_REQUEST, "Event type not found");
    };

    process_event(&state, kind, &event);

    (StatusCode::OK, Json(serde_json::json!({"success": true}))).into_response()
}

/// Apply one event to the session it refers to.
///
/// Events for calls we do not know (already evicted, or started elsewhere)
/// are logged and dropped.
fn process_event(state: &AppState, kind: &str, event: &WebhookEvent) {
    let session = event
        .call_id()
        .and_then(|call_id| state.sessions.get_by_call(call_id));

    match kind {
        "call.started" => {
            metrics::record_webhook_event("call.started");
            match session {
                Some(session) => {
                    session.set_status(CallStatus::Active);
                    tracing::info!(session_id = %session.id, "Call started");
                }
                None => tracing::warn!(call_id = ?event.call_id(), "call.started for unknown call"),
            }
        }
        "call.ended" => {
            metrics::record_webhook_event("call.ended");
            match session {
                Some(session) => {
                    session.set_status(CallStatus::Ended);
                    tracing::info!(session_id = %session.id, "Call ended");
                }
                None => tracing::warn!(call_id = ?event.call_id(), "call.ended for unknown call"),
            }
        }
        "transcript.update" => {
            metrics::record_webhook_event("transcript.update");
            if let Some(session) = session {
                session.touch();
            }
        }
        other => {
            metrics::record_webhook_event("ignored");
            tracing::debug!(kind = %other, "Ignoring webhook event");
        }
    }
}

fn reject(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({"success": false, "error": message})),
    )
        .into_response()
}

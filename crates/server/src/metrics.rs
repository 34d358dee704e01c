//! Prometheus metrics
//!
//! A process-global recorder installed at startup, a render handler for the
//! `/metrics` route, and small helpers the handlers call so metric names
//! stay in one place.

use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder and keep a render handle.
///
/// Returns `None` when a recorder is already installed; recording macros
/// keep working against whichever recorder won.
pub fn init_metrics() -> Option<PrometheusHandle> {
    let handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to install Prometheus recorder; metrics disabled");
            return None;
        }
    };

    describe_metrics();

    let _ = PROMETHEUS_HANDLE.set(handle.clone());
    Some(handle)
}

fn describe_metrics() {
    metrics::describe_counter!(
        "lc_voice_sessions_created_total",
        "Sessions created via the intake API"
    );
    metrics::describe_counter!(
        "lc_voice_calls_started_total",
        "Web calls started on the voice platform"
    );
    metrics::describe_counter!(
        "lc_voice_webhook_events_total",
        "Webhook events received, by kind"
    );
    metrics::describe_counter!(
        "lc_voice_extractions_total",
        "Transcript extraction attempts, by outcome"
    );
    metrics::describe_counter!("lc_voice_errors_total", "Request errors, by error kind");
    metrics::describe_histogram!(
        "lc_voice_extraction_duration_seconds",
        "Transcript extraction latency in seconds"
    );
    metrics::describe_gauge!(
        "lc_voice_sessions_active",
        "Sessions currently held in the registry"
    );
}

/// Render the Prometheus exposition text.
pub async fn metrics_handler() -> String {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}

pub fn record_session_created() {
    metrics::counter!("lc_voice_sessions_created_total").increment(1);
}

pub fn record_call_started() {
    metrics::counter!("lc_voice_calls_started_total").increment(1);
}

pub fn record_webhook_event(kind: &'static str) {
    metrics::counter!("lc_voice_webhook_events_total", "kind" => kind).increment(1);
}

pub fn record_extraction(duration: Duration, outcome: &'static str) {
    metrics::counter!("lc_voice_extractions_total", "outcome" => outcome).increment(1);
    metrics::histogram!("lc_voice_extraction_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_error(kind: &'static str) {
    metrics::counter!("lc_voice_errors_total", "kind" => kind).increment(1);
}

pub fn set_sessions_active(count: usize) {
    metrics::gauge!("lc_voice_sessions_active").set(count as f64);
}

//! Voice platform REST client
//!
//! Starts web calls with an inline assistant definition and reads call state
//! back: status, transcript, recording. The platform returns the assistant
//! a one-time join URL; the browser talks audio to the platform directly and
//! this service only ever sees the REST surface.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use lc_voice_core::{CallStatus, SpeakerRole, Transcript};

use crate::PlatformError;

/// Configuration for the voice platform client
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Platform base URL
    pub endpoint: String,
    /// API key (from VAPI_API_KEY or direct)
    pub api_key: String,
    /// Timeout for call control requests
    pub request_timeout: Duration,
    /// Timeout for transcript fetches. Longer: ended calls can carry large
    /// transcripts and the platform is slower to assemble them.
    pub transcript_timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.vapi.ai".to_string(),
            api_key: std::env::var("VAPI_API_KEY").unwrap_or_default(),
            request_timeout: Duration::from_secs(10),
            transcript_timeout: Duration::from_secs(30),
        }
    }
}

impl PlatformConfig {
    /// Create config with API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Set endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set call control timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set transcript fetch timeout
    pub fn with_transcript_timeout(mut self, timeout: Duration) -> Self {
        self.transcript_timeout = timeout;
        self
    }
}

/// Client for the hosted voice platform REST API
pub struct VoiceClient {
    config: PlatformConfig,
    client: Client,
}

impl VoiceClient {
    /// Create a new client
    pub fn new(config: PlatformConfig) -> Result<Self, PlatformError> {
        if config.api_key.is_empty() {
            return Err(PlatformError::Configuration(
                "VAPI_API_KEY not set. Set it via environment or config.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    /// Start a web call with an inline assistant definition.
    pub async fn start_call(&self, assistant: &AssistantRequest) -> Result<CallInfo, PlatformError> {
        let request = StartCallRequest { assistant };

        let response = self
            .client
            .post(self.url("/call"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let details: CallDetails = response
            .json()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;

        tracing::info!(call_id = %details.id, status = %details.status, "Started web call");

        Ok(CallInfo {
            status: CallStatus::from_platform(&details.status),
            web_call_url: details.web_call_url.clone(),
            id: details.id,
        })
    }

    /// Fetch full call details.
    pub async fn call(&self, call_id: &str) -> Result<CallDetails, PlatformError> {
        let response = self
            .client
            .get(self.url(&format!("/call/{}", call_id)))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound(format!("Call {} not found", call_id)));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))
    }

    /// Fetch the transcript of an ended call.
    pub async fn transcript(&self, call_id: &str) -> Result<Transcript, PlatformError> {
        let response = self
            .client
            .get(self.url(&format!("/call/{}", call_id)))
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.transcript_timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound(format!("Call {} not found", call_id)));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let details: CallDetails = response
            .json()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;

        transcript_from_call(&details)
    }

    /// End an in-progress call.
    ///
    /// Ending is idempotent: a call that already ended reports a client
    /// error, which counts as done.
    pub async fn end_call(&self, call_id: &str) -> Result<(), PlatformError> {
        let response = self
            .client
            .delete(self.url(&format!("/call/{}", call_id)))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status.is_client_error() {
            tracing::info!(call_id = %call_id, "Ended call");
            return Ok(());
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(PlatformError::Api(format!("HTTP {}: {}", status, error_text)))
    }

    /// Recording URL of an ended call, when the platform has one.
    pub async fn recording_url(&self, call_id: &str) -> Result<String, PlatformError> {
        let details = self.call(call_id).await?;
        details
            .recording_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                PlatformError::NotFound(format!("No recording available for call {}", call_id))
            })
    }

    /// Cheap authenticated request used by the readiness probe.
    pub async fn ping(&self) -> Result<(), PlatformError> {
        let response = self
            .client
            .get(self.url("/call"))
            .query(&[("limit", "1")])
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Api(format!("HTTP {}", status)));
        }
        Ok(())
    }
}

/// Turn call details into a transcript.
///
/// Structured messages are preferred; the flat transcript string is a
/// fallback. A call that has not ended, or ended without anyone speaking,
/// is not ready.
pub fn transcript_from_call(details: &CallDetails) -> Result<Transcript, PlatformError> {
    let status = CallStatus::from_platform(&details.status);
    if !status.is_terminal() {
        return Err(PlatformError::NotReady(format!(
            "Call {} has not ended yet",
            details.id
        )));
    }

    let mut transcript = Transcript::default();

    if !details.messages.is_empty() {
        for message in &details.messages {
            let Some(role) = speaker_role(&message.role) else {
                continue;
            };
            let text = message
                .message
                .as_deref()
                .or(message.content.as_deref())
                .unwrap_or_default()
                .trim();
            if text.is_empty() {
                continue;
            }
            transcript.push(role, text);
        }
    } else if let Some(flat) = details.transcript.as_deref() {
        transcript = parse_flat_transcript(flat);
    }

    if transcript.is_empty() {
        return Err(PlatformError::NotReady(format!(
            "Transcript for call {} is not available yet",
            details.id
        )));
    }

    Ok(transcript)
}

/// Parse the flat `Role: text` transcript string.
///
/// Lines without a recognized role prefix continue the previous turn.
fn parse_flat_transcript(text: &str) -> Transcript {
    let mut transcript = Transcript::default();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let turn = trimmed.split_once(':').and_then(|(prefix, rest)| {
            speaker_role(prefix.trim()).map(|role| (role, rest.trim().to_string()))
        });

        match turn {
            Some((role, text)) => transcript.push(role, text),
            None => {
                if let Some(last) = transcript.turns.last_mut() {
                    if !last.text.is_empty() {
                        last.text.push(' ');
                    }
                    last.text.push_str(trimmed);
                }
            }
        }
    }

    transcript
}

fn speaker_role(label: &str) -> Option<SpeakerRole> {
    match label.to_ascii_lowercase().as_str() {
        "assistant" | "bot" | "agent" | "ai" => Some(SpeakerRole::Agent),
        "user" | "customer" | "human" | "caller" => Some(SpeakerRole::User),
        _ => None,
    }
}

// =============================================================================
// Platform API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct StartCallRequest<'a> {
    assistant: &'a AssistantRequest,
}

/// Inline assistant definition sent when starting a call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantRequest {
    pub first_message: String,
    pub model: AssistantModel,
    pub voice: AssistantVoice,
    pub silence_timeout_seconds: u32,
    pub max_duration_seconds: u32,
    pub end_call_message: String,
    pub end_call_phrases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Conversation model section of an assistant definition
#[derive(Debug, Clone, Serialize)]
pub struct AssistantModel {
    pub provider: String,
    pub model: String,
    pub messages: Vec<AssistantPrompt>,
    pub temperature: f32,
}

/// One prompt message inside the model section
#[derive(Debug, Clone, Serialize)]
pub struct AssistantPrompt {
    pub role: String,
    pub content: String,
}

/// Voice section of an assistant definition
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantVoice {
    pub provider: String,
    pub voice_id: String,
}

/// Result of starting a call
#[derive(Debug, Clone)]
pub struct CallInfo {
    pub id: String,
    pub status: CallStatus,
    pub web_call_url: Option<String>,
}

/// Call details as the platform reports them
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDetails {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub messages: Vec<PlatformMessage>,
    #[serde(default)]
    pub recording_url: Option<String>,
    #[serde(default)]
    pub web_call_url: Option<String>,
    #[serde(default)]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub ended_reason: Option<String>,
}

/// One structured transcript message
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformMessage {
    #[serde(default)]
    pub role: String,
    /// Platform transcript messages carry the text here.
    #[serde(default)]
    pub message: Option<String>,
    /// Chat-shaped exports carry it here instead.
    #[serde(default)]
    pub content: Option<String>,
}

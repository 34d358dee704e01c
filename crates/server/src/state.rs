//! Application State
//!
//! Shared state across all handlers. Built once at startup from the loaded
//! settings; everything in it is cheap to clone.

use std::sync::Arc;
use std::time::Duration;

use lc_voice_agent::TranscriptExtractor;
use lc_voice_config::{FormSchema, Settings};
use lc_voice_llm::{LlmClient, LlmConfig};
use lc_voice_platform::{PlatformConfig, SessionRegistry, VoiceClient, WebhookVerifier};

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Loaded settings
    pub config: Arc<Settings>,
    /// Active form schema
    pub schema: Arc<FormSchema>,
    /// Voice platform client
    pub voice: Arc<VoiceClient>,
    /// Transcript extractor
    pub extractor: Arc<TranscriptExtractor>,
    /// In-flight session registry
    pub sessions: Arc<SessionRegistry>,
    /// Webhook signature verifier, present when a secret is configured
    pub webhook_verifier: Option<Arc<WebhookVerifier>>,
}

impl AppState {
    /// Build the application state from settings.
    ///
    /// Fails when a client cannot be constructed (missing API keys) or the
    /// configured schema file does not parse.
    pub fn new(config: Settings) -> lc_voice_core::Result<Self> {
        let schema = match &config.schema.path {
            Some(path) => {
                tracing::info!(path = %path, "Loading form schema from file");
                FormSchema::load(path)?
            }
            None => FormSchema::letter_of_credit(),
        };

        let platform_config = PlatformConfig::new(config.voice.api_key.clone())
            .with_endpoint(config.voice.endpoint.clone())
            .with_request_timeout(Duration::from_secs(config.voice.request_timeout_seconds))
            .with_transcript_timeout(Duration::from_secs(config.voice.transcript_timeout_seconds));
        let voice = VoiceClient::new(platform_config)?;

        let llm_config = LlmConfig::new(config.extraction.api_key.clone())
            .with_endpoint(config.extraction.endpoint.clone())
            .with_model(config.extraction.model.clone())
            .with_temperature(config.extraction.temperature)
            .with_max_tokens(config.extraction.max_tokens)
            .with_timeout(Duration::from_secs(config.extraction.timeout_seconds));
        let extractor = TranscriptExtractor::new(LlmClient::new(llm_config)?);

        let sessions = SessionRegistry::with_config(
            config.server.max_sessions,
            Duration::from_secs(config.server.session_timeout_seconds),
            Duration::from_secs(config.server.cleanup_interval_seconds),
        );

        let webhook_verifier = config
            .voice
            .webhook_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .map(|secret| Arc::new(WebhookVerifier::new(secret)));

        Ok(Self {
            config: Arc::new(config),
            schema: Arc::new(schema),
            voice: Arc::new(voice),
            extractor: Arc::new(extractor),
            sessions: Arc::new(sessions),
            webhook_verifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        let mut settings = Settings::default();
        settings.voice.api_key = "test-voice-key".to_string();
        settings.voice.webhook_secret = None;
        settings.extraction.api_key = "test-extraction-key".to_string();
        settings
    }

    #[test]
    fn test_builtin_schema_by_default() {
        let state = AppState::new(test_settings()).unwrap();
        assert_eq!(state.schema.name, "letter_of_credit");
        assert!(state.webhook_verifier.is_none());
        assert_eq!(state.sessions.count(), 0);
    }

    #[test]
    fn test_missing_voice_key_fails() {
        let mut settings = test_settings();
        settings.voice.api_key = String::new();
        assert!(AppState::new(settings).is_err());
    }

    #[test]
    fn test_missing_extraction_key_fails() {
        let mut settings = test_settings();
        settings.extraction.api_key = String::new();
        assert!(AppState::new(settings).is_err());
    }

    #[test]
    fn test_webhook_verifier_from_secret() {
        let mut settings = test_settings();
        settings.voice.webhook_secret = Some("whsec_test".to_string());
        let state = AppState::new(settings).unwrap();
        assert!(state.webhook_verifier.is_some());
    }

    #[test]
    fn test_empty_webhook_secret_disables_verification() {
        let mut settings = test_settings();
        settings.voice.webhook_secret = Some(String::new());
        let state = AppState::new(settings).unwrap();
        assert!(state.webhook_verifier.is_none());
    }

    #[test]
    fn test_missing_schema_file_fails() {
        let mut settings = test_settings();
        settings.schema.path = Some("/nonexistent/schema.yaml".to_string());
        assert!(AppState::new(settings).is_err());
    }
}

//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Voice platform API configuration
    #[serde(default)]
    pub voice: VoicePlatformConfig,

    /// Defaults for the generated voice assistant
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Transcript extraction LLM configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Form schema source
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings with environment-aware strictness.
    ///
    /// Development tolerates missing credentials so the service can boot
    /// against local stubs; staging and production do not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_voice()?;
        self.validate_assistant()?;
        self.validate_extraction()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if server.max_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_sessions".to_string(),
                message: "Max sessions must be at least 1".to_string(),
            });
        }

        if server.session_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.session_timeout_seconds".to_string(),
                message: "Session timeout must be at least 1 second".to_string(),
            });
        }

        if server.cleanup_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.cleanup_interval_seconds".to_string(),
                message: "Cleanup interval must be at least 1 second".to_string(),
            });
        }

        // Auth validation in production
        if self.environment.is_production() && server.auth.enabled && server.auth.api_key.is_none()
        {
            return Err(ConfigError::InvalidValue {
                field: "server.auth.api_key".to_string(),
                message: "API key must be set when auth is enabled in production".to_string(),
            });
        }

        // CORS validation in production
        if self.environment.is_production() && server.cors_enabled && server.cors_origins.is_empty()
        {
            tracing::warn!(
                "CORS is enabled in production but no origins are configured. \
                 This may block legitimate requests."
            );
        }

        Ok(())
    }

    fn validate_voice(&self) -> Result<(), ConfigError> {
        let voice = &self.voice;

        if voice.endpoint.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "voice.endpoint".to_string(),
                message: "Voice platform endpoint cannot be empty".to_string(),
            });
        }

        if voice.request_timeout_seconds == 0 || voice.transcript_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "voice.request_timeout_seconds".to_string(),
                message: "Timeouts must be at least 1 second".to_string(),
            });
        }

        if voice.api_key.is_empty() {
            if self.environment.is_strict() {
                return Err(ConfigError::InvalidValue {
                    field: "voice.api_key".to_string(),
                    message: "Voice platform API key is required outside development".to_string(),
                });
            }
            tracing::warn!("voice.api_key is not set; platform calls will fail");
        }

        if voice.webhook_secret.as_deref().map_or(true, str::is_empty) {
            if self.environment.is_production() {
                return Err(ConfigError::InvalidValue {
                    field: "voice.webhook_secret".to_string(),
                    message: "Webhook secret is required in production".to_string(),
                });
            }
            tracing::warn!("voice.webhook_secret is not set; webhook signatures will not be checked");
        }

        Ok(())
    }

    fn validate_assistant(&self) -> Result<(), ConfigError> {
        let assistant = &self.assistant;

        if !(0.0..=2.0).contains(&assistant.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "assistant.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", assistant.temperature),
            });
        }

        if assistant.silence_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "assistant.silence_timeout_seconds".to_string(),
                message: "Must be at least 1 second".to_string(),
            });
        }

        if assistant.max_duration_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "assistant.max_duration_seconds".to_string(),
                message: "Must be at least 1 second".to_string(),
            });
        }

        Ok(())
    }

    fn validate_extraction(&self) -> Result<(), ConfigError> {
        let extraction = &self.extraction;

        if extraction.endpoint.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "extraction.endpoint".to_string(),
                message: "Extraction endpoint cannot be empty".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&extraction.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "extraction.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", extraction.temperature),
            });
        }

        if extraction.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "extraction.max_tokens".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if extraction.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "extraction.timeout_seconds".to_string(),
                message: "Must be at least 1 second".to_string(),
            });
        }

        if extraction.api_key.is_empty() {
            if self.environment.is_strict() {
                return Err(ConfigError::InvalidValue {
                    field: "extraction.api_key".to_string(),
                    message: "Extraction API key is required outside development".to_string(),
                });
            }
            tracing::warn!("extraction.api_key is not set; transcript extraction will fail");
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent call sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle session expiry in seconds
    #[serde(default = "default_session_timeout")]
    pub session_timeout_seconds: u64,

    /// Expired-session sweep interval in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_port() -> u16 {
    8080
}
fn default_max_sessions() -> usize {
    100
}
fn default_session_timeout() -> u64 {
    3600
}
fn default_cleanup_interval() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_sessions: default_max_sessions(),
            session_timeout_seconds: default_session_timeout(),
            cleanup_interval_seconds: default_cleanup_interval(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            auth: AuthConfig::default(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Enable authentication (set to false for development)
    #[serde(default)]
    pub enabled: bool,

    /// API key for simple bearer authentication (set via
    /// LC_VOICE__SERVER__AUTH__API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Paths that bypass authentication. The webhook stays public; it is
    /// signature-checked instead.
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/health".to_string(),
        "/ready".to_string(),
        "/metrics".to_string(),
        "/webhook/voice".to_string(),
    ]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false, // Disabled by default for development
            api_key: None,
            public_paths: default_public_paths(),
        }
    }
}

/// Voice platform API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoicePlatformConfig {
    /// Platform base URL
    #[serde(default = "default_voice_endpoint")]
    pub endpoint: String,

    /// Platform API key (set via LC_VOICE__VOICE__API_KEY or VAPI_API_KEY)
    #[serde(default = "default_voice_api_key")]
    pub api_key: String,

    /// Shared secret for webhook signatures (VAPI_WEBHOOK_SECRET)
    #[serde(default = "default_webhook_secret")]
    pub webhook_secret: Option<String>,

    /// Timeout for configuration and status calls, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Timeout for transcript fetches, in seconds
    #[serde(default = "default_transcript_timeout")]
    pub transcript_timeout_seconds: u64,
}

fn default_voice_endpoint() -> String {
    "https://api.vapi.ai".to_string()
}
fn default_voice_api_key() -> String {
    std::env::var("VAPI_API_KEY").unwrap_or_default()
}
fn default_webhook_secret() -> Option<String> {
    std::env::var("VAPI_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty())
}
fn default_request_timeout() -> u64 {
    10
}
fn default_transcript_timeout() -> u64 {
    30
}

impl Default for VoicePlatformConfig {
    fn default() -> Self {
        Self {
            endpoint: default_voice_endpoint(),
            api_key: default_voice_api_key(),
            webhook_secret: default_webhook_secret(),
            request_timeout_seconds: default_request_timeout(),
            transcript_timeout_seconds: default_transcript_timeout(),
        }
    }
}

/// Defaults for the generated voice assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Company name used in greetings
    #[serde(default = "default_company_name")]
    pub company_name: String,

    /// Override for the generated first message
    #[serde(default)]
    pub first_message: Option<String>,

    /// Conversation model provider
    #[serde(default = "default_model_provider")]
    pub model_provider: String,

    /// Conversation model
    #[serde(default = "default_model")]
    pub model: String,

    /// Conversation temperature
    #[serde(default = "default_assistant_temperature")]
    pub temperature: f32,

    /// Voice provider
    #[serde(default = "default_voice_provider")]
    pub voice_provider: String,

    /// Voice id
    #[serde(default = "default_voice_id")]
    pub voice_id: String,

    /// How long to wait for the caller before giving up, in seconds
    #[serde(default = "default_silence_timeout")]
    pub silence_timeout_seconds: u32,

    /// Maximum call duration, in seconds
    #[serde(default = "default_max_duration")]
    pub max_duration_seconds: u32,

    /// Message spoken before hanging up
    #[serde(default = "default_end_call_message")]
    pub end_call_message: String,

    /// Phrases that end the call
    #[serde(default = "default_end_call_phrases")]
    pub end_call_phrases: Vec<String>,

    /// Public base URL of this service, used for webhook delivery.
    /// No webhooks are registered when unset.
    #[serde(default)]
    pub server_url: Option<String>,
}

fn default_company_name() -> String {
    "Trade Origin".to_string()
}
fn default_model_provider() -> String {
    "google".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_assistant_temperature() -> f32 {
    0.7
}
fn default_voice_provider() -> String {
    "playht".to_string()
}
fn default_voice_id() -> String {
    "jennifer".to_string()
}
fn default_silence_timeout() -> u32 {
    30
}
fn default_max_duration() -> u32 {
    600
}
fn default_end_call_message() -> String {
    "Thank you for providing your information. We'll process your LC application shortly. Goodbye!"
        .to_string()
}
fn default_end_call_phrases() -> Vec<String> {
    vec![
        "goodbye".to_string(),
        "that's all".to_string(),
        "end call".to_string(),
        "thank you goodbye".to_string(),
    ]
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            company_name: default_company_name(),
            first_message: None,
            model_provider: default_model_provider(),
            model: default_model(),
            temperature: default_assistant_temperature(),
            voice_provider: default_voice_provider(),
            voice_id: default_voice_id(),
            silence_timeout_seconds: default_silence_timeout(),
            max_duration_seconds: default_max_duration(),
            end_call_message: default_end_call_message(),
            end_call_phrases: default_end_call_phrases(),
            server_url: None,
        }
    }
}

/// Transcript extraction LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Chat-completions base URL
    #[serde(default = "default_extraction_endpoint")]
    pub endpoint: String,

    /// API key (set via LC_VOICE__EXTRACTION__API_KEY or OPENAI_API_KEY)
    #[serde(default = "default_extraction_api_key")]
    pub api_key: String,

    /// Extraction model
    #[serde(default = "default_extraction_model")]
    pub model: String,

    /// Extraction temperature. Low: we want transcription into the schema,
    /// not creativity.
    #[serde(default = "default_extraction_temperature")]
    pub temperature: f32,

    /// Reply token budget
    #[serde(default = "default_extraction_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_extraction_timeout")]
    pub timeout_seconds: u64,
}

fn default_extraction_endpoint() -> String {
    "https://api.openai.com".to_string()
}
fn default_extraction_api_key() -> String {
    std::env::var("OPENAI_API_KEY").unwrap_or_default()
}
fn default_extraction_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_extraction_temperature() -> f32 {
    0.1
}
fn default_extraction_max_tokens() -> u32 {
    2048
}
fn default_extraction_timeout() -> u64 {
    30
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_extraction_endpoint(),
            api_key: default_extraction_api_key(),
            model: default_extraction_model(),
            temperature: default_extraction_temperature(),
            max_tokens: default_extraction_max_tokens(),
            timeout_seconds: default_extraction_timeout(),
        }
    }
}

/// Form schema source
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchemaConfig {
    /// Path to a YAML schema file. The built-in Letter of Credit schema is
    /// used when unset.
    #[serde(default)]
    pub path: Option<String>,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable the Prometheus exporter
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment.
///
/// Sources, later overriding earlier: `config/default`, `config/{env}`,
/// then `LC_VOICE__*` environment variables ("__" separates nesting).
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("LC_VOICE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

//! Voice Platform Integration
//!
//! Everything that touches the hosted voice platform lives here: the REST
//! client that starts and inspects calls, the in-memory registry that maps
//! our session ids to platform call ids, and the HMAC verifier for inbound
//! webhooks.

pub mod client;
pub mod registry;
pub mod webhook;

pub use client::{
    transcript_from_call, AssistantModel, AssistantPrompt, AssistantRequest, AssistantVoice,
    CallDetails, CallInfo, PlatformConfig, VoiceClient,
};
pub use registry::{CallSession, SessionRegistry};
pub use webhook::{WebhookCall, WebhookEvent, WebhookVerifier};

use thiserror::Error;

/// Voice platform errors
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Session error: {0}")]
    Session(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        PlatformError::Network(err.to_string())
    }
}

impl From<PlatformError> for lc_voice_core::Error {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound(msg) => lc_voice_core::Error::NotFound(msg),
            PlatformError::NotReady(msg) => lc_voice_core::Error::NotReady(msg),
            PlatformError::Configuration(msg) => lc_voice_core::Error::Configuration(msg),
            PlatformError::Session(msg) => lc_voice_core::Error::Internal(msg),
            other => lc_voice_core::Error::UpstreamUnavailable(other.to_string()),
        }
    }
}

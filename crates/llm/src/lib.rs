//! LLM Integration
//!
//! A thin client for OpenAI-compatible chat-completions endpoints, plus the
//! tolerant JSON parsing used on model replies. Models wrap JSON in markdown
//! fences or chatter around it; the parser recovers the object, and nothing
//! downstream ever trusts it without validation.

pub mod client;
pub mod parse;

pub use client::{LlmClient, LlmConfig};
pub use parse::parse_json_object;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for lc_voice_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Configuration(msg) => lc_voice_core::Error::Configuration(msg),
            other => lc_voice_core::Error::UpstreamUnavailable(other.to_string()),
        }
    }
}

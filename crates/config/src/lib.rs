//! Configuration for the LC voice intake service.
//!
//! Settings load from layered files plus `LC_VOICE__*` environment
//! variables. The form schema registry lives here too and ships with the
//! built-in Letter of Credit schema.

pub mod schema;
pub mod settings;

pub use schema::{
    FieldDefinition, FieldRef, FieldType, FormSchema, SchemaError, SectionDefinition,
    SpecialMapping,
};
pub use settings::{
    load_settings, AssistantConfig, AuthConfig, ExtractionConfig, ObservabilityConfig,
    RuntimeEnvironment, SchemaConfig, ServerConfig, Settings, VoicePlatformConfig,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for lc_voice_core::Error {
    fn from(err: ConfigError) -> Self {
        lc_voice_core::Error::Configuration(err.to_string())
    }
}

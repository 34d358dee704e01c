//! Service-wide error taxonomy.
//!
//! Subsystem crates keep their own error enums and convert into this one at
//! the boundary, so every failure reaching a handler carries a response
//! class and a retry hint.

use thiserror::Error;

/// Errors surfaced by the service.
#[derive(Error, Debug)]
pub enum Error {
    /// A provided or extracted value breaks the form schema.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// The voice platform or the LLM is unreachable, timing out, or failing.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Unknown session, call, or recording.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The resource exists but is not available yet.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// The LLM reply could not be turned into usable fields.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UpstreamUnavailable(_) | Error::NotReady(_))
    }

    /// Stable machine-readable kind for API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SchemaViolation(_) => "schema_violation",
            Error::UpstreamUnavailable(_) => "upstream_unavailable",
            Error::NotFound(_) => "not_found",
            Error::NotReady(_) => "not_ready",
            Error::ExtractionFailed(_) => "extraction_failed",
            Error::Configuration(_) => "configuration",
            Error::Internal(_) => "internal",
        }
    }
}

/// Convenience alias used across the service.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::UpstreamUnavailable("down".into()).is_retryable());
        assert!(Error::NotReady("call running".into()).is_retryable());
        assert!(!Error::SchemaViolation("bad enum".into()).is_retryable());
        assert!(!Error::NotFound("session".into()).is_retryable());
        assert!(!Error::ExtractionFailed("garbage".into()).is_retryable());
    }

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(Error::SchemaViolation(String::new()).kind(), "schema_violation");
        assert_eq!(Error::UpstreamUnavailable(String::new()).kind(), "upstream_unavailable");
        assert_eq!(Error::NotFound(String::new()).kind(), "not_found");
        assert_eq!(Error::NotReady(String::new()).kind(), "not_ready");
        assert_eq!(Error::ExtractionFailed(String::new()).kind(), "extraction_failed");
        assert_eq!(Error::Configuration(String::new()).kind(), "configuration");
        assert_eq!(Error::Internal(String::new()).kind(), "internal");
    }
}

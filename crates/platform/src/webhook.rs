//! Webhook signature verification and event parsing
//!
//! The platform signs each webhook delivery with HMAC-SHA256 over the raw
//! body, hex-encoded in the `x-vapi-signature` header. Verification must
//! run on the exact bytes received, before any JSON parsing.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Verifier for platform webhook signatures
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    /// Creates a new verifier with the given webhook secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verify a hex-encoded signature against the raw payload.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let provided = match hex::decode(signature.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let expected = self.compute(payload);
        constant_time_compare(&provided, &expected)
    }

    /// Hex signature for a payload. Tests use this to build valid requests.
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.compute(payload))
    }

    fn compute(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts any key");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Performs constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// A webhook delivery from the platform.
///
/// Newer deliveries carry the event name in `type`, older ones in `event`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub call: Option<WebhookCall>,
}

impl WebhookEvent {
    /// Event name, whichever key carried it.
    pub fn kind(&self) -> Option<&str> {
        self.event_type.as_deref().or(self.event.as_deref())
    }

    /// Platform call id the event refers to.
    pub fn call_id(&self) -> Option<&str> {
        self.call.as_ref().map(|call| call.id.as_str())
    }
}

/// Call reference inside a webhook event
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookCall {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";

    #[test]
    fn test_valid_signature_verifies() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = br#"{"type":"call.ended","call":{"id":"c-1"}}"#;
        let signature = verifier.sign(payload);

        assert!(verifier.verify(payload, &signature));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let signature = verifier.sign(br#"{"type":"call.ended"}"#);

        assert!(!verifier.verify(br#"{"type":"call.started"}"#, &signature));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let payload = br#"{"type":"call.ended"}"#;
        let signature = WebhookVerifier::new("other-secret").sign(payload);

        assert!(!WebhookVerifier::new(TEST_SECRET).verify(payload, &signature));
    }

    #[test]
    fn test_invalid_hex_fails() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        assert!(!verifier.verify(b"{}", "not hex at all"));
        assert!(!verifier.verify(b"{}", ""));
    }

    #[test]
    fn test_truncated_signature_fails() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = br#"{"type":"call.ended"}"#;
        let signature = verifier.sign(payload);

        assert!(!verifier.verify(payload, &signature[..32]));
    }

    #[test]
    fn test_signature_whitespace_is_tolerated() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = br#"{"type":"call.ended"}"#;
        let signature = format!(" {} ", verifier.sign(payload));

        assert!(verifier.verify(payload, &signature));
    }

    #[test]
    fn test_event_parsing_with_type_key() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"type": "call.started", "call": {"id": "c-9", "status": "in-progress"}}"#,
        )
        .unwrap();

        assert_eq!(event.kind(), Some("call.started"));
        assert_eq!(event.call_id(), Some("c-9"));
        assert_eq!(
            event.call.as_ref().and_then(|c| c.status.as_deref()),
            Some("in-progress")
        );
    }

    #[test]
    fn test_event_parsing_with_legacy_event_key() {
        let event: WebhookEvent =
            serde_json::from_str(r#"{"event": "call.ended", "call": {"id": "c-9"}}"#).unwrap();

        assert_eq!(event.kind(), Some("call.ended"));
    }

    #[test]
    fn test_event_without_kind() {
        let event: WebhookEvent = serde_json::from_str(r#"{"call": {"id": "c-9"}}"#).unwrap();
        assert_eq!(event.kind(), None);
        assert_eq!(event.call_id(), Some("c-9"));
    }

    #[test]
    fn test_event_without_call() {
        let event: WebhookEvent = serde_json::from_str(r#"{"type": "ping"}"#).unwrap();
        assert_eq!(event.kind(), Some("ping"));
        assert_eq!(event.call_id(), None);
    }
}

//! Tolerant JSON recovery for model replies
//!
//! Replies are asked for as bare JSON, but models still wrap them in
//! markdown fences or add prose around them. Recovery tries three shapes in
//! order: the whole reply, a fenced block, then the widest brace span.
//! Anything that does not yield a JSON object is a failed extraction; the
//! caller decides what that means.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));

static BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// Extract a JSON object from a model reply.
///
/// Returns `None` when no parseable object is present, including when the
/// reply is valid JSON of some other type.
pub fn parse_json_object(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if value.is_object() {
            return Some(value);
        }
    }

    if let Some(captures) = FENCED.captures(text) {
        if let Ok(value) = serde_json::from_str::<Value>(&captures[1]) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    if let Some(found) = BARE.find(text) {
        if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_object() {
        let parsed = parse_json_object(r#" {"amount_usd": 50000} "#);
        assert_eq!(parsed, Some(json!({"amount_usd": 50000})));
    }

    #[test]
    fn test_fenced_with_tag() {
        let reply = "Here is the extracted data:\n```json\n{\"lc_type\": \"Sight LC\"}\n```\nLet me know if you need more.";
        let parsed = parse_json_object(reply);
        assert_eq!(parsed, Some(json!({"lc_type": "Sight LC"})));
    }

    #[test]
    fn test_fenced_without_tag() {
        let reply = "```\n{\"is_lc_issued\": false}\n```";
        let parsed = parse_json_object(reply);
        assert_eq!(parsed, Some(json!({"is_lc_issued": false})));
    }

    #[test]
    fn test_nested_object_in_fence() {
        let reply = "```json\n{\"shipment_details\": {\"shipment_type\": \"Port\"}}\n```";
        let parsed = parse_json_object(reply);
        assert_eq!(
            parsed,
            Some(json!({"shipment_details": {"shipment_type": "Port"}}))
        );
    }

    #[test]
    fn test_bare_object_in_chatter() {
        let reply = "Sure! Based on the transcript: {\"beneficiary_name\": \"Acme Exports\"} Is there anything else?";
        let parsed = parse_json_object(reply);
        assert_eq!(parsed, Some(json!({"beneficiary_name": "Acme Exports"})));
    }

    #[test]
    fn test_garbage_returns_none() {
        assert_eq!(parse_json_object("I could not find any fields."), None);
        assert_eq!(parse_json_object(""), None);
    }

    #[test]
    fn test_array_is_not_an_object() {
        assert_eq!(parse_json_object("[1, 2, 3]"), None);
        assert_eq!(parse_json_object("```json\n[\"a\"]\n```"), None);
    }

    #[test]
    fn test_unbalanced_braces() {
        assert_eq!(parse_json_object("{\"amount_usd\": "), None);
    }
}

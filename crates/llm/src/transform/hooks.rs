//! Named per-provider pre/post-dispatch transformer hooks (spec §4.3): a configured provider's
//! `transformers.request`/`.response` name selects a pure function run on the outbound
//! OpenAI-shape request payload (after the generic Anthropic→OpenAI step) or the inbound
//! OpenAI-shape response payload (before the generic OpenAI→Anthropic step). Names are validated
//! against [`config::KNOWN_TRANSFORMERS`] at config load; this module is where they actually run.

use serde_json::Value;

/// Canonical top-level keys of the outbound Chat Completions request this proxy emits.
const REQUEST_FIELDS: &[&str] = &["model", "messages", "tools", "tool_choice", "max_tokens", "temperature", "stream", "stop"];

/// Canonical top-level keys of the inbound Chat Completions response this proxy expects.
const RESPONSE_FIELDS: &[&str] = &["id", "model", "choices", "usage"];

/// Run the named pre-dispatch transformer over the outbound request payload. `None` and
/// `"passthrough"` both leave `payload` untouched.
pub fn apply_request(name: Option<&str>, mut payload: Value) -> Value {
    if name == Some("strip_unknown_fields") {
        strip_to(&mut payload, REQUEST_FIELDS);
    }
    payload
}

/// Run the named post-dispatch transformer over an inbound response payload (a buffered body or
/// a single streamed chunk). `None` and `"passthrough"` both leave `payload` untouched.
pub fn apply_response(name: Option<&str>, mut payload: Value) -> Value {
    if name == Some("strip_unknown_fields") {
        strip_to(&mut payload, RESPONSE_FIELDS);
    }
    payload
}

fn strip_to(value: &mut Value, allowed: &[&str]) {
    if let Value::Object(map) = value {
        map.retain(|key, _| allowed.contains(&key.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn passthrough_and_unnamed_leave_payload_untouched() {
        let payload = json!({"model": "gpt-4o", "vendor_extension": true});
        assert_eq!(apply_request(Some("passthrough"), payload.clone()), payload);
        assert_eq!(apply_request(None, payload.clone()), payload);
    }

    #[test]
    fn strip_unknown_fields_drops_non_canonical_request_keys() {
        let payload = json!({"model": "gpt-4o", "messages": [], "vendor_extension": true});
        let stripped = apply_request(Some("strip_unknown_fields"), payload);
        assert_eq!(stripped, json!({"model": "gpt-4o", "messages": []}));
    }

    #[test]
    fn strip_unknown_fields_drops_non_canonical_response_keys() {
        let payload = json!({"id": "cmpl-x", "choices": [], "usage": {}, "system_fingerprint": "xyz"});
        let stripped = apply_response(Some("strip_unknown_fields"), payload);
        assert_eq!(stripped, json!({"id": "cmpl-x", "choices": [], "usage": {}}));
    }
}

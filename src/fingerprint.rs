//! Deterministic request fingerprinting.
//!
//! A cache key is the SHA-256 digest of a canonical JSON form of the
//! request's semantic payload: the ordered message sequence, the model
//! identifier, and the output-affecting parameters. Canonicalization rules:
//!
//! - messages keep their given order (order is semantically significant)
//! - parameters are keyed by name in a sorted map, so insertion order never
//!   affects the digest
//! - numbers are normalized to a fixed textual form (`0.70` and `0.7` hash
//!   identically, as do `100` and `100.0`)
//! - unset parameters are always omitted; explicit `null` counts as unset
//!
//! The fingerprinted subset is an explicit allowlist rather than every field
//! the caller sends, and the schema version is folded into the digest, so
//! widening the subset later is a deliberate [`FINGERPRINT_VERSION`] bump
//! that invalidates old keys instead of silently colliding with them.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

/// Version of the canonicalization schema, folded into every digest.
pub const FINGERPRINT_VERSION: u32 = 1;

/// Request parameters that affect output and therefore enter the digest.
/// Everything else (request IDs, `stream`, `user`, `metadata`, timestamps)
/// is excluded by construction.
const CACHED_PARAMS: &[&str] = &[
    "frequency_penalty",
    "logit_bias",
    "max_tokens",
    "n",
    "presence_penalty",
    "response_format",
    "seed",
    "stop",
    "temperature",
    "tool_choice",
    "tools",
    "top_k",
    "top_p",
];

/// Message fields preserved in the canonical form when present.
const MESSAGE_FIELDS: &[&str] = &["name", "tool_calls", "tool_call_id"];

/// Derive the cache key for a chat request.
///
/// Pure and deterministic: identical semantic requests always produce the
/// identical key, and any difference in an included field changes it.
pub fn derive(messages: &[Value], model: &str, params: &Map<String, Value>) -> Result<String> {
    let canonical = json!({
        "v": FINGERPRINT_VERSION,
        "model": model,
        "messages": normalize_messages(messages)?,
        "params": normalize_params(params),
    });
    Ok(digest(&canonical))
}

/// Derive the cache key for a non-chat completion request (prompt-based).
pub fn derive_for_prompt(prompt: &str, model: &str, params: &Map<String, Value>) -> Result<String> {
    let canonical = json!({
        "v": FINGERPRINT_VERSION,
        "model": model,
        "prompt": prompt,
        "params": normalize_params(params),
    });
    Ok(digest(&canonical))
}

/// Derive the cache key for a raw inbound request body, as received by the
/// proxy. Expects an object with a `messages` array and a `model` string.
pub fn derive_request(body: &Value) -> Result<String> {
    let obj = body
        .as_object()
        .ok_or_else(|| CacheError::InvalidRequest("request body must be a JSON object".into()))?;
    let messages = obj
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| CacheError::InvalidRequest("'messages' must be an array".into()))?;
    let model = obj.get("model").and_then(Value::as_str).unwrap_or("unknown");
    derive(messages, model, obj)
}

fn digest(canonical: &Value) -> String {
    // serde_json's default map is ordered by key, so serializing the
    // canonical value yields a stable byte sequence.
    let bytes = canonical.to_string();
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Reduce messages to their semantic fields, preserving order.
fn normalize_messages(messages: &[Value]) -> Result<Vec<Value>> {
    messages
        .iter()
        .map(|msg| {
            let obj = msg.as_object().ok_or_else(|| {
                CacheError::InvalidRequest("each message must be a JSON object".into())
            })?;
            let mut norm = Map::new();
            norm.insert(
                "role".into(),
                Value::String(
                    obj.get("role")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                ),
            );
            norm.insert(
                "content".into(),
                canonicalize_value(obj.get("content").unwrap_or(&Value::String(String::new()))),
            );
            for field in MESSAGE_FIELDS {
                if let Some(v) = obj.get(*field) {
                    if !v.is_null() {
                        norm.insert((*field).into(), canonicalize_value(v));
                    }
                }
            }
            Ok(Value::Object(norm))
        })
        .collect()
}

/// Filter params down to the allowlisted output-affecting subset, dropping
/// nulls. The resulting map serializes with sorted keys.
fn normalize_params(params: &Map<String, Value>) -> Value {
    let mut norm = Map::new();
    for name in CACHED_PARAMS {
        if let Some(v) = params.get(*name) {
            if !v.is_null() {
                norm.insert((*name).to_string(), canonicalize_value(v));
            }
        }
    }
    Value::Object(norm)
}

/// Recursively normalize numbers so float-formatting drift cannot change
/// the digest. Integral floats collapse to integers (`0.70` parses to the
/// same f64 as `0.7`; `100.0` renders as `100`).
fn canonicalize_value(v: &Value) -> Value {
    match v {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if n.as_i64().is_none() && n.as_u64().is_none() {
                    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                        return Value::from(f as i64);
                    }
                }
            }
            v.clone()
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize_value).collect()),
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), canonicalize_value(v)))
                .collect(),
        ),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_body(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_identical_requests_hash_identically() {
        let body = chat_body(
            r#"{"model":"gpt-4","messages":[{"role":"user","content":"hi"}],"temperature":0.7}"#,
        );
        assert_eq!(
            derive_request(&body).unwrap(),
            derive_request(&body).unwrap()
        );
    }

    #[test]
    fn test_param_key_order_does_not_matter() {
        let a = chat_body(
            r#"{"model":"gpt-4","messages":[{"role":"user","content":"hi"}],"temperature":0.7,"max_tokens":100}"#,
        );
        let b = chat_body(
            r#"{"max_tokens":100,"temperature":0.7,"messages":[{"role":"user","content":"hi"}],"model":"gpt-4"}"#,
        );
        assert_eq!(derive_request(&a).unwrap(), derive_request(&b).unwrap());
    }

    #[test]
    fn test_float_formatting_does_not_matter() {
        let a = chat_body(
            r#"{"model":"m","messages":[{"role":"user","content":"x"}],"temperature":0.7}"#,
        );
        let b = chat_body(
            r#"{"model":"m","messages":[{"role":"user","content":"x"}],"temperature":0.70}"#,
        );
        assert_eq!(derive_request(&a).unwrap(), derive_request(&b).unwrap());
    }

    #[test]
    fn test_integral_float_collapses_to_integer() {
        let a = chat_body(
            r#"{"model":"m","messages":[{"role":"user","content":"x"}],"max_tokens":100}"#,
        );
        let b = chat_body(
            r#"{"model":"m","messages":[{"role":"user","content":"x"}],"max_tokens":100.0}"#,
        );
        assert_eq!(derive_request(&a).unwrap(), derive_request(&b).unwrap());
    }

    #[test]
    fn test_temperature_change_changes_key() {
        let a = chat_body(
            r#"{"model":"m","messages":[{"role":"user","content":"x"}],"temperature":0.7}"#,
        );
        let b = chat_body(
            r#"{"model":"m","messages":[{"role":"user","content":"x"}],"temperature":0.8}"#,
        );
        assert_ne!(derive_request(&a).unwrap(), derive_request(&b).unwrap());
    }

    #[test]
    fn test_model_change_changes_key() {
        let msgs = vec![json!({"role":"user","content":"x"})];
        let params = Map::new();
        let a = derive(&msgs, "gpt-4", &params).unwrap();
        let b = derive(&msgs, "claude-sonnet", &params).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_message_order_is_significant() {
        let params = Map::new();
        let ab = vec![
            json!({"role":"user","content":"a"}),
            json!({"role":"user","content":"b"}),
        ];
        let ba = vec![
            json!({"role":"user","content":"b"}),
            json!({"role":"user","content":"a"}),
        ];
        assert_ne!(
            derive(&ab, "m", &params).unwrap(),
            derive(&ba, "m", &params).unwrap()
        );
    }

    #[test]
    fn test_null_param_equals_omitted() {
        let a = chat_body(
            r#"{"model":"m","messages":[{"role":"user","content":"x"}],"temperature":null}"#,
        );
        let b = chat_body(r#"{"model":"m","messages":[{"role":"user","content":"x"}]}"#);
        assert_eq!(derive_request(&a).unwrap(), derive_request(&b).unwrap());
    }

    #[test]
    fn test_non_semantic_fields_are_excluded() {
        let a = chat_body(
            r#"{"model":"m","messages":[{"role":"user","content":"x"}],"user":"alice","stream":false}"#,
        );
        let b = chat_body(r#"{"model":"m","messages":[{"role":"user","content":"x"}]}"#);
        assert_eq!(derive_request(&a).unwrap(), derive_request(&b).unwrap());
    }

    #[test]
    fn test_tools_enter_the_digest() {
        let a = chat_body(
            r#"{"model":"m","messages":[{"role":"user","content":"x"}],"tools":[{"type":"function","function":{"name":"f"}}]}"#,
        );
        let b = chat_body(r#"{"model":"m","messages":[{"role":"user","content":"x"}]}"#);
        assert_ne!(derive_request(&a).unwrap(), derive_request(&b).unwrap());
    }

    #[test]
    fn test_tool_call_id_is_preserved() {
        let a = chat_body(
            r#"{"model":"m","messages":[{"role":"tool","content":"ok","tool_call_id":"call_1"}]}"#,
        );
        let b = chat_body(
            r#"{"model":"m","messages":[{"role":"tool","content":"ok","tool_call_id":"call_2"}]}"#,
        );
        assert_ne!(derive_request(&a).unwrap(), derive_request(&b).unwrap());
    }

    #[test]
    fn test_malformed_body_is_invalid_request() {
        let not_object = json!([1, 2, 3]);
        assert!(matches!(
            derive_request(&not_object),
            Err(CacheError::InvalidRequest(_))
        ));
        let bad_messages = chat_body(r#"{"model":"m","messages":"nope"}"#);
        assert!(matches!(
            derive_request(&bad_messages),
            Err(CacheError::InvalidRequest(_))
        ));
        let bad_message_item = chat_body(r#"{"model":"m","messages":[42]}"#);
        assert!(matches!(
            derive_request(&bad_message_item),
            Err(CacheError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_prompt_fingerprint_differs_from_chat() {
        let params = Map::new();
        let chat = derive(&[json!({"role":"user","content":"x"})], "m", &params).unwrap();
        let prompt = derive_for_prompt("x", "m", &params).unwrap();
        assert_ne!(chat, prompt);
    }

    #[test]
    fn test_key_is_64_hex_chars() {
        let key = derive_for_prompt("x", "m", &Map::new()).unwrap();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

//! PII redaction and audit hashes.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const REDACTED: &str = "[REDACTED]";

/// Keys whose values never reach the audit file verbatim.
pub const PII_KEYS: [&str; 4] = ["email", "name", "ip", "password"];

/// `jo****@example.com`: the first two characters of the local part and
/// the full domain. Anything that does not look like an address is fully
/// redacted.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let visible: String = local.chars().take(2).collect();
            format!("{visible}****@{domain}")
        }
        _ => REDACTED.to_string(),
    }
}

/// Redact PII keys at every nesting level, inside arrays included.
pub fn redact_map(data: Map<String, Value>) -> Map<String, Value> {
    data.into_iter()
        .map(|(key, value)| {
            let value = match (key.as_str(), value) {
                ("email", Value::String(email)) => Value::String(mask_email(&email)),
                (k, _) if PII_KEYS.contains(&k) => Value::String(REDACTED.to_string()),
                (_, other) => redact_value(other),
            };
            (key, value)
        })
        .collect()
}

fn redact_value(value: Value) -> Value {
    match value {
        Value::Object(nested) => Value::Object(redact_map(nested)),
        Value::Array(items) => Value::Array(items.into_iter().map(redact_value).collect()),
        other => other,
    }
}

/// Normalize arbitrary audit data into a redacted object.
pub fn redact(data: Value) -> Map<String, Value> {
    match data {
        Value::Object(map) => redact_map(map),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), redact_value(other));
            map
        }
    }
}

fn sha256_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

/// First 12 hex characters of SHA-256 over `{action, ...data, timestamp}`.
pub fn action_hash(action: &str, data: &Map<String, Value>, timestamp_ms: u64) -> String {
    let mut material = Map::new();
    material.insert("action".to_string(), Value::String(action.to_string()));
    for (key, value) in data {
        material.insert(key.clone(), value.clone());
    }
    material.insert("timestamp".to_string(), Value::from(timestamp_ms));

    let mut hash = sha256_hex(Value::Object(material).to_string().as_bytes());
    hash.truncate(12);
    hash
}

/// First 16 hex characters of SHA-256 over `ip ‖ salt`.
pub fn ip_hash(ip: &str, salt: &str) -> String {
    let mut hash = sha256_hex(format!("{ip}{salt}").as_bytes());
    hash.truncate(16);
    hash
}

//! The message envelope exchanged for every procedure call and acknowledgment.
//!
//! ```text
//! { "meta": {}, "payload": { ... }, "type": "<procedure>", "status": "success" | "error" }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TruenoError};

/// Outcome tag carried by every envelope.
///
/// Only these two values are legal; an acknowledgment carrying anything else
/// fails to decode and is treated as a protocol violation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Success,
    Error,
}

/// A request or response document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(default)]
    meta: Map<String, Value>,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "type", default)]
    kind: String,
    status: Status,
}

impl Envelope {
    /// An empty envelope: no metadata, an empty payload object, no type,
    /// status `success`.
    pub fn new() -> Self {
        Self {
            meta: Map::new(),
            payload: Value::Object(Map::new()),
            kind: String::new(),
            status: Status::Success,
        }
    }

    /// Shorthand for `Envelope::new()` followed by `set_payload`.
    pub fn with_payload(payload: Value) -> Self {
        let mut envelope = Self::new();
        envelope.set_payload(payload);
        envelope
    }

    /// Decode a raw acknowledgment document.
    pub fn decode(raw: Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(TruenoError::MalformedEnvelope(format!(
                "expected an object, got {raw}"
            )));
        }
        serde_json::from_value(raw).map_err(|e| TruenoError::MalformedEnvelope(e.to_string()))
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: Value) {
        self.payload = payload;
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn set_kind(&mut self, kind: impl Into<String>) {
        self.kind = kind.into();
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: Value) {
        self.meta.insert(key.into(), value);
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_envelope_shape() {
        let env = Envelope::new();
        let doc = serde_json::to_value(&env).unwrap();
        assert_eq!(
            doc,
            json!({"meta": {}, "payload": {}, "type": "", "status": "success"})
        );
    }

    #[test]
    fn test_setters() {
        let mut env = Envelope::with_payload(json!({"graph": "citations"}));
        env.set_kind("ex_fetch");
        env.set_status(Status::Error);
        env.set_meta("client", json!("rust"));

        assert_eq!(env.kind(), "ex_fetch");
        assert_eq!(env.status(), Status::Error);
        assert_eq!(env.payload()["graph"], "citations");
        assert_eq!(env.meta()["client"], "rust");
    }

    #[test]
    fn test_decode_tolerates_missing_optional_slots() {
        let env = Envelope::decode(json!({"status": "error", "payload": {"code": 7}})).unwrap();
        assert_eq!(env.status(), Status::Error);
        assert_eq!(env.payload()["code"], 7);
        assert!(env.meta().is_empty());
    }

    #[test]
    fn test_decode_rejects_unknown_status() {
        let err = Envelope::decode(json!({"status": "pending", "payload": {}})).unwrap_err();
        assert!(matches!(err, TruenoError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_decode_rejects_missing_status_and_non_objects() {
        assert!(Envelope::decode(json!({"payload": {}})).is_err());
        assert!(Envelope::decode(json!([1, 2, 3])).is_err());
        assert!(Envelope::decode(Value::Null).is_err());
    }
}

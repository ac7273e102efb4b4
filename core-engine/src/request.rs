use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};

/// A named operation plus its optional JSON parameters, as received from the
/// host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRequest {
    pub name: String,
    pub params: Option<String>,
}

impl NamedRequest {
    pub fn new(name: impl Into<String>, params: Option<&str>) -> Self {
        Self {
            name: name.into(),
            params: params.map(str::to_string),
        }
    }
}

/// Successful outcome of a request: the JSON payload and, when the operation
/// attests its results, a proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpacityPayload {
    pub json: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
}

impl OpacityPayload {
    pub fn new(json: impl Into<String>) -> Self {
        Self {
            json: json.into(),
            proof: None,
        }
    }

    pub fn with_proof(mut self, proof: impl Into<String>) -> Self {
        self.proof = Some(proof.into());
        self
    }

    /// The payload parsed back into a JSON value.
    pub fn value(&self) -> Result<Value> {
        serde_json::from_str(&self.json)
            .map_err(|e| EngineError::Internal(format!("Payload is not JSON: {}", e)))
    }
}

/// Outcome of [`RequestEngine::get`](crate::RequestEngine::get). Exactly one
/// of payload or error.
pub type OpacityResult = std::result::Result<OpacityPayload, EngineError>;

/// Decoded request parameters: always a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, Value>);

impl Params {
    /// Absent, empty, whitespace-only and `null` input all mean "no params".
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Ok(Self::default());
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(Value::Null) => Ok(Self::default()),
            Ok(other) => Err(EngineError::InvalidParams(format!(
                "params must be a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(EngineError::InvalidParams(format!(
                "params are not valid JSON: {}",
                e
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    #[cfg(test)]
    pub(crate) fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_params_are_empty() {
        for raw in [None, Some(""), Some("   "), Some("null")] {
            assert!(Params::parse(raw).unwrap().is_empty(), "{:?}", raw);
        }
    }

    #[test]
    fn test_object_params() {
        let params = Params::parse(Some(r#"{"id": "abc", "lat": 1.5, "skip": null}"#)).unwrap();

        assert_eq!(params.str("id"), Some("abc"));
        assert_eq!(params.f64("lat"), Some(1.5));
        assert_eq!(params.get("skip"), None);
    }

    #[test]
    fn test_non_object_params_rejected() {
        let err = Params::parse(Some("[1, 2]")).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidParams("params must be a JSON object, got an array".into())
        );

        let err = Params::parse(Some("{not json")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParams(_)));
    }

    #[test]
    fn test_payload_helpers() {
        let payload = OpacityPayload::new(json!({"a": 1}).to_string()).with_proof("p");

        assert_eq!(payload.value().unwrap(), json!({"a": 1}));
        assert_eq!(payload.proof.as_deref(), Some("p"));
    }
}

//! Result attestation.
//!
//! A proof binds what was asked (operation, environment, params) to what was
//! returned (payload) under the caller's key fingerprint at a point in time.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

/// Everything a proof covers.
#[derive(Debug, Clone)]
pub struct ProofClaim<'a> {
    pub operation: &'a str,
    pub environment: &'a str,
    pub params: &'a Value,
    pub payload: &'a Value,
    pub key_fingerprint: &'a str,
    pub issued_at: DateTime<Utc>,
}

/// Produces the `proof` string for attested results.
pub trait ProofGenerator: Send + Sync {
    fn attest(&self, claim: &ProofClaim<'_>) -> Result<String>;
}

#[derive(Serialize)]
struct Attestation<'a> {
    version: u8,
    algorithm: &'static str,
    operation: &'a str,
    environment: &'a str,
    params_digest: String,
    payload_digest: String,
    key_fingerprint: &'a str,
    issued_at: String,
    binding: String,
}

/// SHA-256 attestation rendered as JSON. Output is a pure function of the
/// claim.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Attestor;

impl Sha256Attestor {
    fn digest(value: &Value) -> Result<String> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| EngineError::Internal(format!("Failed to encode claim: {}", e)))?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

impl ProofGenerator for Sha256Attestor {
    fn attest(&self, claim: &ProofClaim<'_>) -> Result<String> {
        let params_digest = Self::digest(claim.params)?;
        let payload_digest = Self::digest(claim.payload)?;
        let issued_at = claim.issued_at.to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut hasher = Sha256::new();
        for part in [
            claim.operation,
            claim.environment,
            params_digest.as_str(),
            payload_digest.as_str(),
            claim.key_fingerprint,
            issued_at.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update(b"\n");
        }
        let binding = hex::encode(hasher.finalize());

        let attestation = Attestation {
            version: 1,
            algorithm: "sha256",
            operation: claim.operation,
            environment: claim.environment,
            params_digest,
            payload_digest,
            key_fingerprint: claim.key_fingerprint,
            issued_at,
            binding,
        };

        serde_json::to_string(&attestation)
            .map_err(|e| EngineError::Internal(format!("Failed to encode proof: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn claim<'a>(params: &'a Value, payload: &'a Value) -> ProofClaim<'a> {
        ProofClaim {
            operation: "github:profile",
            environment: "sandbox",
            params,
            payload,
            key_fingerprint: "0011223344556677",
            issued_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_attestation_is_deterministic() {
        let params = json!({});
        let payload = json!({"login": "octocat"});

        let a = Sha256Attestor.attest(&claim(&params, &payload)).unwrap();
        let b = Sha256Attestor.attest(&claim(&params, &payload)).unwrap();
        assert_eq!(a, b);

        let parsed: Value = serde_json::from_str(&a).unwrap();
        assert_eq!(parsed["operation"], "github:profile");
        assert_eq!(parsed["issued_at"], "2023-11-14T22:13:20.000Z");
        assert_eq!(parsed["binding"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_payload_change_changes_binding() {
        let params = json!({});
        let a = Sha256Attestor
            .attest(&claim(&params, &json!({"login": "octocat"})))
            .unwrap();
        let b = Sha256Attestor
            .attest(&claim(&params, &json!({"login": "hubot"})))
            .unwrap();

        let a: Value = serde_json::from_str(&a).unwrap();
        let b: Value = serde_json::from_str(&b).unwrap();
        assert_ne!(a["payload_digest"], b["payload_digest"]);
        assert_ne!(a["binding"], b["binding"]);
        assert_eq!(a["params_digest"], b["params_digest"]);
    }
}

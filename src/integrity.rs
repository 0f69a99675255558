//! Payload integrity verification
//!
//! SHA-256 checksums over the canonical serialization of a payload.
//! A packet whose checksum does not match is rejected outright; there is
//! no partial application.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonical serialization of a JSON value.
///
/// Object keys serialize in sorted order (serde_json's default map is
/// ordered by key), so two structurally equal values always produce the
/// same string.
pub fn canonical_json(value: &Value) -> String {
    value.to_string()
}

/// Hex-encoded SHA-256 digest of the payload's canonical serialization
pub fn checksum(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(payload).as_bytes());
    hex::encode(hasher.finalize())
}

/// Recompute the digest and compare
pub fn verify(payload: &Value, digest: &str) -> bool {
    checksum(payload) == digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_roundtrip() {
        let payload = json!({"name": "Al", "age": 30});
        let digest = checksum(&payload);
        assert!(verify(&payload, &digest));
    }

    #[test]
    fn test_checksum_mismatch() {
        let payload = json!({"name": "Al"});
        let other = json!({"name": "Bo"});
        assert!(!verify(&payload, &checksum(&other)));
    }

    #[test]
    fn test_checksum_key_order_independent() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        assert_eq!(checksum(&a), checksum(&b));
    }

    #[test]
    fn test_checksum_covers_nested_values() {
        let a = json!({"outer": {"inner": 1}});
        let b = json!({"outer": {"inner": 2}});
        assert_ne!(checksum(&a), checksum(&b));
    }

    #[test]
    fn test_checksum_of_arrays_and_scalars() {
        let digest = checksum(&json!([1, 2, 3]));
        assert_eq!(digest.len(), 64);
        assert!(verify(&json!([1, 2, 3]), &digest));
        assert!(!verify(&json!([3, 2, 1]), &digest));

        assert!(verify(&json!("scalar"), &checksum(&json!("scalar"))));
    }
}

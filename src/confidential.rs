//! Field-level confidentiality wrapping
//!
//! Opportunistically replaces selected field values with opaque tokens
//! from the token-service boundary. Wrapping is strict (a boundary
//! failure is an error, since the caller asked for protection);
//! unwrapping is best-effort (a field that fails to unwrap is left
//! as-is).

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::token::TokenService;
use crate::types::EncryptedPayload;

/// Wraps and unwraps named payload fields via the token boundary
#[derive(Clone)]
pub struct FieldGuard {
    tokens: Arc<dyn TokenService>,
    wrap_ttl_seconds: u64,
}

impl FieldGuard {
    pub fn new(tokens: Arc<dyn TokenService>, wrap_ttl_seconds: u64) -> Self {
        Self {
            tokens,
            wrap_ttl_seconds,
        }
    }

    /// Replace each named field present in the payload with an opaque
    /// wrap token. Fields absent from the payload are skipped.
    pub async fn wrap_fields(
        &self,
        payload: &Value,
        field_names: &[String],
    ) -> Result<EncryptedPayload> {
        let Value::Object(map) = payload else {
            // Only keyed records carry named fields
            return Ok(EncryptedPayload {
                payload: payload.clone(),
                encrypted_fields: Vec::new(),
            });
        };

        let mut out = map.clone();
        let mut wrapped = Vec::new();

        for name in field_names {
            if let Some(value) = map.get(name) {
                let token = self.tokens.wrap_value(value, self.wrap_ttl_seconds).await?;
                out.insert(name.clone(), Value::String(token));
                wrapped.push(name.clone());
            }
        }

        tracing::debug!(fields = wrapped.len(), "Wrapped payload fields");

        Ok(EncryptedPayload {
            payload: Value::Object(out),
            encrypted_fields: wrapped,
        })
    }

    /// Substitute each named wrap token back with its recovered value.
    /// A field that is missing, not a token string, or rejected by the
    /// boundary is left unchanged.
    pub async fn unwrap_fields(&self, payload: &Value, field_names: &[String]) -> Value {
        let Value::Object(map) = payload else {
            return payload.clone();
        };

        let mut out = map.clone();

        for name in field_names {
            let Some(Value::String(token)) = map.get(name) else {
                continue;
            };

            match self.tokens.unwrap_value(token).await {
                Ok(value) => {
                    out.insert(name.clone(), value);
                }
                Err(e) => {
                    tracing::warn!(field = %name, error = %e, "Failed to unwrap field, leaving as-is");
                }
            }
        }

        Value::Object(out)
    }
}

//! Token-service boundary
//!
//! The engine consumes an external credential service for two things:
//! session-scoped tokens and opaque value wrapping for field-level
//! confidentiality. Both are behind the `TokenService` trait so the
//! engine never depends on a concrete token format.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the token-service boundary
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token expired")]
    Expired,
}

/// A credential issued for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    /// Opaque token string
    pub token: String,
    /// When the token stops being valid
    pub expires_at: DateTime<Utc>,
}

/// Claims recovered from a verified token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Subject the token was issued to
    pub subject: String,
    /// Granted permissions
    pub permissions: Vec<String>,
    /// Service the token was issued for
    pub service_name: String,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

/// External token-issuance and value-wrapping capability
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Issue a scoped credential for a subject
    async fn issue_token(
        &self,
        subject: &str,
        permissions: &[String],
        ttl_seconds: u64,
    ) -> Result<IssuedToken, TokenError>;

    /// Verify a token and recover its claims
    async fn verify_token(&self, token: &str) -> Result<TokenClaims, TokenError>;

    /// Wrap a value into an opaque token (at-rest confidentiality)
    async fn wrap_value(&self, value: &Value, ttl_seconds: u64) -> Result<String, TokenError>;

    /// Recover the value from a wrap token
    async fn unwrap_value(&self, token: &str) -> Result<Value, TokenError>;
}

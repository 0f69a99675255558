//! Core sync engine types
//!
//! Defines types for cross-device synchronization including:
//! - Sessions and their lifecycle status
//! - Sync operations with change/conflict counters
//! - Data packets and field-level conflicts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Permissions granted to a session credential
pub const SYNC_PERMISSIONS: [&str; 3] = ["sync:read", "sync:write", "sync:manage"];

/// How many recent operations a status report includes
pub const STATUS_HISTORY_LIMIT: usize = 10;

// ============================================================================
// Sessions
// ============================================================================

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Ready to accept operations
    Active,
    /// Temporarily suspended by the client
    Paused,
    /// An operation is in flight
    Syncing,
    /// Last operation failed in a way the client must inspect
    Error,
}

/// A per-device synchronization session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSession {
    /// Unique session ID
    pub id: Uuid,

    /// Owning user identity
    pub user_id: String,

    /// Device this session belongs to
    pub device_id: String,

    /// Platform label (e.g. "ios", "android", "web")
    pub platform: String,

    /// Current status
    pub status: SessionStatus,

    /// Session creation time
    pub created_at: DateTime<Utc>,

    /// Session expiry time
    pub expires_at: DateTime<Utc>,

    /// Time of the last completed operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,

    /// Version counter value known at the last successful sync
    pub sync_version: u64,

    /// Free-form client metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl SyncSession {
    /// Create a new active session
    pub fn new(
        user_id: &str,
        device_id: &str,
        platform: &str,
        metadata: Option<Value>,
        sync_version: u64,
        ttl_hours: i64,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            platform: platform.to_string(),
            status: SessionStatus::Active,
            created_at: now,
            expires_at: now + chrono::Duration::hours(ttl_hours),
            last_sync_at: None,
            sync_version,
            metadata,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Kind of sync operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Push,
    Pull,
    Merge,
}

/// Operation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Created, no packet processed yet
    Pending,
    /// A packet is being (or has been partially) processed
    InProgress,
    /// Changes applied and version counter bumped
    Completed,
    /// Processing failed
    Failed,
}

/// One push/pull/merge attempt within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    /// Unique operation ID
    pub id: Uuid,

    /// Owning session
    pub session_id: Uuid,

    /// Operation kind
    pub kind: OperationKind,

    /// Caller-defined namespace for the records being synchronized
    pub data_type: String,

    /// Current status
    pub status: OperationStatus,

    /// Operation creation time
    pub created_at: DateTime<Utc>,

    /// Number of changes applied on completion
    pub changes_applied: usize,

    /// Number of conflicts detected by the last processing pass
    pub conflicts_detected: usize,

    /// Number of conflicts auto-resolved by the last processing pass
    pub conflicts_auto_resolved: usize,
}

impl SyncOperation {
    /// Create a new pending operation
    pub fn new(session_id: Uuid, kind: OperationKind, data_type: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            kind,
            data_type: data_type.to_string(),
            status: OperationStatus::Pending,
            created_at: Utc::now(),
            changes_applied: 0,
            conflicts_detected: 0,
            conflicts_auto_resolved: 0,
        }
    }
}

// ============================================================================
// Data Packets
// ============================================================================

/// One payload submission for an operation (transient, never stored)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDataPacket {
    /// Session this packet belongs to
    pub session_id: Uuid,

    /// Operation this packet belongs to
    pub operation_id: Uuid,

    /// Data-type label, matching the operation's
    pub data_type: String,

    /// Version the client built this packet against
    pub version: u64,

    /// The payload itself
    pub payload: Value,

    /// Hex SHA-256 of the payload's canonical serialization
    pub checksum: String,

    /// Names of fields whose values are confidentiality-wrapped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_fields: Option<Vec<String>>,

    /// Submission time
    pub submitted_at: DateTime<Utc>,
}

// ============================================================================
// Conflicts
// ============================================================================

/// How a conflict was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    /// Keep the local (existing) value
    Local,
    /// Keep the remote (incoming) value
    Remote,
    /// Use a caller-supplied merged value
    Merged,
}

/// A single-field disagreement between an existing snapshot and an
/// incoming payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    /// Unique conflict ID
    pub id: Uuid,

    /// Owning operation
    pub operation_id: Uuid,

    /// Field name in conflict
    pub field: String,

    /// Existing (local) value
    pub local_value: Value,

    /// Incoming (remote) value
    pub remote_value: Value,

    /// Resolution, immutable once set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ConflictResolution>,

    /// The value chosen by the resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_value: Option<Value>,

    /// When the resolution was set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SyncConflict {
    /// Create a new unresolved conflict
    pub fn new(operation_id: Uuid, field: &str, local_value: Value, remote_value: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_id,
            field: field.to_string(),
            local_value,
            remote_value,
            resolution: None,
            resolved_value: None,
            resolved_at: None,
        }
    }

    /// Whether a resolution has been set
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Settle the conflict with the given resolution and winning value
    pub fn resolve(&mut self, resolution: ConflictResolution, resolved_value: Value) {
        self.resolution = Some(resolution);
        self.resolved_value = Some(resolved_value);
        self.resolved_at = Some(Utc::now());
    }
}

// ============================================================================
// Results
// ============================================================================

/// Successful outcome of processing a data packet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Operation that completed
    pub operation_id: Uuid,

    /// Number of changes applied
    pub changes_applied: usize,

    /// Conflicts remaining (always empty on success)
    pub conflicts: Vec<SyncConflict>,

    /// The user's version counter after the increment
    pub new_version: u64,
}

/// A session plus its recent operation history, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusReport {
    pub session: SyncSession,
    pub recent_operations: Vec<SyncOperation>,
}

/// Result of initializing a session: the session and its scoped credential
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub session: SyncSession,
    pub token: String,
    pub token_expires_at: DateTime<Utc>,
}

/// Result of wrapping selected payload fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    /// Payload with named fields replaced by opaque tokens
    pub payload: Value,

    /// Names of the fields that were actually wrapped
    pub encrypted_fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_starts_active() {
        let session = SyncSession::new("user-1", "dev-1", "ios", None, 0, 24);
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.sync_version, 0);
        assert!(!session.is_expired());
        assert!(session.last_sync_at.is_none());
    }

    #[test]
    fn test_session_expiry() {
        let session = SyncSession::new("user-1", "dev-1", "ios", None, 0, -1);
        assert!(session.is_expired());
    }

    #[test]
    fn test_conflict_resolution_stamps() {
        let mut conflict =
            SyncConflict::new(Uuid::new_v4(), "note", json!("a"), json!("b"));
        assert!(!conflict.is_resolved());

        conflict.resolve(ConflictResolution::Remote, json!("b"));
        assert!(conflict.is_resolved());
        assert_eq!(conflict.resolved_value, Some(json!("b")));
        assert!(conflict.resolved_at.is_some());
    }

    #[test]
    fn test_operation_serialization() {
        let op = SyncOperation::new(Uuid::new_v4(), OperationKind::Push, "notes");
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("sessionId"));
        assert!(json.contains("dataType"));
        assert!(json.contains("\"pending\""));
    }
}

//! Sync engine facade
//!
//! Composes the session manager, operation coordinator, version tracker
//! and field guard behind the boundary operations the routing layer
//! consumes. One `SyncEngine` value owns all engine state; tests build
//! isolated instances.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::confidential::FieldGuard;
use crate::config::SyncConfig;
use crate::conflict;
use crate::coordinator::OperationCoordinator;
use crate::error::{Result, SyncError};
use crate::integrity;
use crate::session::SessionManager;
use crate::token::{TokenClaims, TokenService};
use crate::types::{
    ConflictResolution, EncryptedPayload, OperationKind, OperationStatus, SessionGrant,
    SessionStatus, SyncConflict, SyncDataPacket, SyncOperation, SyncReport, SyncStatusReport,
    STATUS_HISTORY_LIMIT, SYNC_PERMISSIONS,
};
use crate::version::VersionTracker;

/// The synchronization engine
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: SyncConfig,
    sessions: SessionManager,
    operations: OperationCoordinator,
    versions: VersionTracker,
    fields: FieldGuard,
    tokens: Arc<dyn TokenService>,
}

impl SyncEngine {
    /// Create an engine with default configuration
    pub fn new(tokens: Arc<dyn TokenService>) -> Self {
        Self::with_config(tokens, SyncConfig::default())
    }

    /// Create an engine with explicit configuration
    pub fn with_config(tokens: Arc<dyn TokenService>, config: SyncConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                sessions: SessionManager::new(config.session_ttl_hours),
                operations: OperationCoordinator::new(),
                versions: VersionTracker::new(),
                fields: FieldGuard::new(Arc::clone(&tokens), config.field_wrap_ttl_seconds),
                tokens,
                config,
            }),
        }
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Open a session for a device and issue its scoped credential.
    ///
    /// The session starts active with its version cursor set to the
    /// user's current counter value. Fails if the token service cannot
    /// issue a credential; no session is created in that case.
    pub async fn initialize_session(
        &self,
        user_id: &str,
        device_id: &str,
        platform: &str,
        metadata: Option<Value>,
    ) -> Result<SessionGrant> {
        let permissions: Vec<String> = SYNC_PERMISSIONS.iter().map(|p| p.to_string()).collect();
        let issued = self
            .inner
            .tokens
            .issue_token(user_id, &permissions, self.inner.config.session_token_ttl_seconds)
            .await?;

        let sync_version = self.inner.versions.current(user_id).await;
        let session = self
            .inner
            .sessions
            .create(user_id, device_id, platform, metadata, sync_version)
            .await;

        Ok(SessionGrant {
            session,
            token: issued.token,
            token_expires_at: issued.expires_at,
        })
    }

    /// A session plus its most recent operations, newest first
    pub async fn get_sync_status(&self, session_id: Uuid) -> Result<SyncStatusReport> {
        let session = self.inner.sessions.get(session_id).await?;
        let recent_operations = self
            .inner
            .operations
            .recent_for_session(session_id, STATUS_HISTORY_LIMIT)
            .await;

        Ok(SyncStatusReport {
            session,
            recent_operations,
        })
    }

    /// Hard-delete a session and cascade its operations and conflicts.
    /// The user's version counter is untouched.
    pub async fn end_session(&self, session_id: Uuid) -> Result<()> {
        self.inner.sessions.remove(session_id).await?;
        let removed = self.inner.operations.remove_for_session(session_id).await;

        tracing::info!(
            session_id = %session_id,
            operations_removed = removed,
            "Cascaded session deletion"
        );

        Ok(())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Start a push/pull/merge operation within a session. The session
    /// moves to `Syncing` until a packet completes the operation.
    pub async fn start_sync(
        &self,
        session_id: Uuid,
        kind: OperationKind,
        data_type: &str,
    ) -> Result<SyncOperation> {
        self.inner.sessions.get(session_id).await?;

        let operation = self.inner.operations.create(session_id, kind, data_type).await;
        self.inner
            .sessions
            .set_status(session_id, SessionStatus::Syncing)
            .await?;

        Ok(operation)
    }

    /// Process one data packet for an operation.
    ///
    /// Verifies integrity, detects conflicts against the caller-supplied
    /// snapshot, attempts automatic resolution, and either completes the
    /// operation (bumping the user's version counter by exactly 1) or
    /// returns the unresolved conflicts. On `UnresolvedConflicts` the
    /// operation stays `in_progress`; resolve the conflicts and resubmit
    /// the packet to finish it.
    ///
    /// Not idempotent: a packet resubmitted after a successful return
    /// increments the version counter again.
    pub async fn process_sync(
        &self,
        packet: &SyncDataPacket,
        existing_data: Option<&Value>,
    ) -> Result<SyncReport> {
        let session = self.inner.sessions.get(packet.session_id).await?;
        let guard = self.inner.operations.guard(packet.operation_id).await?;

        // Serialize the whole check/detect/resolve/apply sequence per
        // operation id so concurrent packets cannot double-increment the
        // version counter or drop a resolution.
        let _processing = guard.lock().await;

        let actual = integrity::checksum(&packet.payload);
        if actual != packet.checksum {
            tracing::warn!(
                operation_id = %packet.operation_id,
                "Rejected packet with checksum mismatch"
            );
            return Err(SyncError::IntegrityCheckFailed {
                expected: packet.checksum.clone(),
                actual,
            });
        }

        self.inner
            .operations
            .set_status(packet.operation_id, OperationStatus::InProgress)
            .await?;

        let mut unresolved = Vec::new();
        if let Some(existing) = existing_data {
            unresolved = self
                .detect_and_resolve(packet.operation_id, existing, &packet.payload)
                .await?;
        }

        if !unresolved.is_empty() {
            tracing::info!(
                operation_id = %packet.operation_id,
                unresolved = unresolved.len(),
                "Sync blocked on unresolved conflicts"
            );
            return Err(SyncError::UnresolvedConflicts(unresolved));
        }

        let changes_applied = count_changes(&packet.payload);
        let operation = self
            .inner
            .operations
            .complete(packet.operation_id, changes_applied)
            .await?;
        let new_version = self.inner.versions.increment(&session.user_id).await;
        self.inner
            .sessions
            .complete_sync(packet.session_id, new_version)
            .await?;

        tracing::info!(
            operation_id = %operation.id,
            session_id = %packet.session_id,
            user_id = %session.user_id,
            changes_applied = changes_applied,
            new_version = new_version,
            "Completed sync operation"
        );

        Ok(SyncReport {
            operation_id: operation.id,
            changes_applied,
            conflicts: Vec::new(),
            new_version,
        })
    }

    /// Run detection against the stored conflict records, attempt the
    /// automatic pass, and return what is still unresolved.
    ///
    /// A field that already carries a resolved record (from a manual
    /// `resolve_conflict` or an earlier pass) is settled; a field with a
    /// pending record keeps its id so earlier references stay valid.
    async fn detect_and_resolve(
        &self,
        operation_id: Uuid,
        existing: &Value,
        payload: &Value,
    ) -> Result<Vec<SyncConflict>> {
        let detected = conflict::detect_conflicts(operation_id, existing, payload);
        let detected_count = detected.len();
        let mut stored = self.inner.operations.conflicts_for(operation_id).await;

        let mut unresolved = Vec::new();
        let mut auto_resolved = 0;

        for mut candidate in detected {
            if let Some(record) = stored.iter().find(|c| c.field == candidate.field) {
                if record.is_resolved() {
                    continue;
                }
                candidate = record.clone();
            }

            if conflict::auto_resolve(&mut candidate) {
                auto_resolved += 1;
            } else {
                unresolved.push(candidate.clone());
            }
            upsert_conflict(&mut stored, candidate);
        }

        self.inner
            .operations
            .record_conflict_counts(operation_id, detected_count, auto_resolved)
            .await?;
        self.inner
            .operations
            .store_conflicts(operation_id, stored)
            .await;

        if detected_count > 0 {
            tracing::debug!(
                operation_id = %operation_id,
                detected = detected_count,
                auto_resolved = auto_resolved,
                "Conflict detection pass"
            );
        }

        Ok(unresolved)
    }

    /// Manually settle one conflict. Does not re-run processing; the
    /// caller resubmits the packet once all conflicts are resolved.
    pub async fn resolve_conflict(
        &self,
        operation_id: Uuid,
        conflict_id: Uuid,
        resolution: ConflictResolution,
        merged_value: Option<Value>,
    ) -> Result<SyncConflict> {
        self.inner
            .operations
            .resolve_conflict(operation_id, conflict_id, resolution, merged_value)
            .await
    }

    // ========================================================================
    // Field Confidentiality
    // ========================================================================

    /// Replace named payload fields with opaque wrap tokens
    pub async fn encrypt_sync_data(
        &self,
        payload: &Value,
        field_names: &[String],
    ) -> Result<EncryptedPayload> {
        self.inner.fields.wrap_fields(payload, field_names).await
    }

    /// Best-effort recovery of wrapped payload fields
    pub async fn decrypt_sync_data(&self, payload: &Value, field_names: &[String]) -> Value {
        self.inner.fields.unwrap_fields(payload, field_names).await
    }

    // ========================================================================
    // Token Passthrough
    // ========================================================================

    /// Verify a token and require that it was issued for this engine's
    /// service name
    pub async fn verify_token(&self, token: &str) -> Result<TokenClaims> {
        let claims = self.inner.tokens.verify_token(token).await?;

        if claims.service_name != self.inner.config.service_name {
            return Err(SyncError::ForeignToken(claims.service_name));
        }

        Ok(claims)
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Sweep expired sessions and cascade their operations and
    /// conflicts. Returns the number of sessions removed.
    pub async fn cleanup_expired(&self) -> usize {
        let expired = self.inner.sessions.cleanup_expired().await;
        for session_id in &expired {
            self.inner.operations.remove_for_session(*session_id).await;
        }
        expired.len()
    }

    /// Spawn the periodic expired-session sweep
    pub fn start_cleanup_task(&self) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        let interval = std::time::Duration::from_secs(self.inner.config.cleanup_interval_seconds);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;
                engine.cleanup_expired().await;
            }
        })
    }
}

/// Number of changes a payload carries: list length for arrays, key
/// count for keyed records, 1 for anything else
fn count_changes(payload: &Value) -> usize {
    match payload {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 1,
    }
}

fn upsert_conflict(stored: &mut Vec<SyncConflict>, record: SyncConflict) {
    if let Some(slot) = stored.iter_mut().find(|c| c.field == record.field) {
        *slot = record;
    } else {
        stored.push(record);
    }
}

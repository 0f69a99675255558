//! Operation coordination state
//!
//! Stores sync operations and their conflict records. Every operation
//! entry carries its own mutex so one packet at a time runs the
//! integrity-check / detect / resolve / apply sequence for a given
//! operation id.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::types::{
    ConflictResolution, OperationKind, OperationStatus, SyncConflict, SyncOperation,
};

/// Stores operations and conflicts for the engine
#[derive(Clone)]
pub struct OperationCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    /// Operations indexed by ID
    operations: RwLock<HashMap<Uuid, OperationEntry>>,

    /// Conflict records indexed by owning operation ID
    conflicts: RwLock<HashMap<Uuid, Vec<SyncConflict>>>,
}

#[derive(Clone)]
struct OperationEntry {
    operation: SyncOperation,
    /// Serializes packet processing for this operation id
    guard: Arc<Mutex<()>>,
}

impl OperationCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                operations: RwLock::new(HashMap::new()),
                conflicts: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Create a pending operation with an empty conflict list
    pub async fn create(
        &self,
        session_id: Uuid,
        kind: OperationKind,
        data_type: &str,
    ) -> SyncOperation {
        let operation = SyncOperation::new(session_id, kind, data_type);

        self.inner.operations.write().await.insert(
            operation.id,
            OperationEntry {
                operation: operation.clone(),
                guard: Arc::new(Mutex::new(())),
            },
        );
        self.inner
            .conflicts
            .write()
            .await
            .insert(operation.id, Vec::new());

        tracing::info!(
            operation_id = %operation.id,
            session_id = %session_id,
            kind = ?kind,
            data_type = %data_type,
            "Started sync operation"
        );

        operation
    }

    /// Get an operation by ID
    pub async fn get(&self, id: Uuid) -> Result<SyncOperation> {
        let operations = self.inner.operations.read().await;
        operations
            .get(&id)
            .map(|entry| entry.operation.clone())
            .ok_or_else(|| SyncError::OperationNotFound(id.to_string()))
    }

    /// Get the per-operation processing guard
    pub async fn guard(&self, id: Uuid) -> Result<Arc<Mutex<()>>> {
        let operations = self.inner.operations.read().await;
        operations
            .get(&id)
            .map(|entry| Arc::clone(&entry.guard))
            .ok_or_else(|| SyncError::OperationNotFound(id.to_string()))
    }

    /// Set an operation's status
    pub async fn set_status(&self, id: Uuid, status: OperationStatus) -> Result<()> {
        let mut operations = self.inner.operations.write().await;
        let entry = operations
            .get_mut(&id)
            .ok_or_else(|| SyncError::OperationNotFound(id.to_string()))?;

        entry.operation.status = status;
        Ok(())
    }

    /// Record the conflict counters for the latest processing pass
    pub async fn record_conflict_counts(
        &self,
        id: Uuid,
        detected: usize,
        auto_resolved: usize,
    ) -> Result<()> {
        let mut operations = self.inner.operations.write().await;
        let entry = operations
            .get_mut(&id)
            .ok_or_else(|| SyncError::OperationNotFound(id.to_string()))?;

        entry.operation.conflicts_detected = detected;
        entry.operation.conflicts_auto_resolved = auto_resolved;
        Ok(())
    }

    /// Mark an operation completed with its applied-change count
    pub async fn complete(&self, id: Uuid, changes_applied: usize) -> Result<SyncOperation> {
        let mut operations = self.inner.operations.write().await;
        let entry = operations
            .get_mut(&id)
            .ok_or_else(|| SyncError::OperationNotFound(id.to_string()))?;

        entry.operation.status = OperationStatus::Completed;
        entry.operation.changes_applied = changes_applied;
        Ok(entry.operation.clone())
    }

    /// All conflict records for an operation
    pub async fn conflicts_for(&self, id: Uuid) -> Vec<SyncConflict> {
        self.inner
            .conflicts
            .read()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the conflict records for an operation
    pub async fn store_conflicts(&self, id: Uuid, conflicts: Vec<SyncConflict>) {
        self.inner.conflicts.write().await.insert(id, conflicts);
    }

    /// Manually settle one conflict. Rejected if the operation already
    /// completed or the conflict already carries a resolution.
    pub async fn resolve_conflict(
        &self,
        operation_id: Uuid,
        conflict_id: Uuid,
        resolution: ConflictResolution,
        merged_value: Option<Value>,
    ) -> Result<SyncConflict> {
        let operation = self.get(operation_id).await?;
        if operation.status == OperationStatus::Completed {
            return Err(SyncError::OperationAlreadyCompleted(
                operation_id.to_string(),
            ));
        }

        let mut conflicts = self.inner.conflicts.write().await;
        let records = conflicts
            .get_mut(&operation_id)
            .ok_or_else(|| SyncError::OperationNotFound(operation_id.to_string()))?;

        let conflict = records
            .iter_mut()
            .find(|c| c.id == conflict_id)
            .ok_or_else(|| SyncError::ConflictNotFound(conflict_id.to_string()))?;

        if conflict.is_resolved() {
            return Err(SyncError::ConflictAlreadyResolved(conflict_id.to_string()));
        }

        let resolved_value = match resolution {
            ConflictResolution::Local => conflict.local_value.clone(),
            ConflictResolution::Remote => conflict.remote_value.clone(),
            ConflictResolution::Merged => merged_value.ok_or(SyncError::MissingMergedValue)?,
        };

        conflict.resolve(resolution, resolved_value);

        tracing::info!(
            operation_id = %operation_id,
            conflict_id = %conflict_id,
            field = %conflict.field,
            resolution = ?resolution,
            "Resolved sync conflict"
        );

        Ok(conflict.clone())
    }

    /// Most recent operations for a session, newest first
    pub async fn recent_for_session(&self, session_id: Uuid, limit: usize) -> Vec<SyncOperation> {
        let operations = self.inner.operations.read().await;

        let mut recent: Vec<SyncOperation> = operations
            .values()
            .filter(|entry| entry.operation.session_id == session_id)
            .map(|entry| entry.operation.clone())
            .collect();

        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        recent
    }

    /// Cascade-delete all operations and conflicts for a session,
    /// returning how many operations were removed
    pub async fn remove_for_session(&self, session_id: Uuid) -> usize {
        let removed: Vec<Uuid> = {
            let mut operations = self.inner.operations.write().await;
            let ids: Vec<Uuid> = operations
                .iter()
                .filter(|(_, entry)| entry.operation.session_id == session_id)
                .map(|(id, _)| *id)
                .collect();

            for id in &ids {
                operations.remove(id);
            }
            ids
        };

        let mut conflicts = self.inner.conflicts.write().await;
        for id in &removed {
            conflicts.remove(id);
        }

        removed.len()
    }
}

impl Default for OperationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get() {
        let coordinator = OperationCoordinator::new();
        let session_id = Uuid::new_v4();

        let op = coordinator
            .create(session_id, OperationKind::Push, "notes")
            .await;

        let fetched = coordinator.get(op.id).await.unwrap();
        assert_eq!(fetched.status, OperationStatus::Pending);
        assert_eq!(fetched.session_id, session_id);
        assert!(coordinator.conflicts_for(op.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_requires_pending_record() {
        let coordinator = OperationCoordinator::new();
        let op = coordinator
            .create(Uuid::new_v4(), OperationKind::Push, "notes")
            .await;

        let result = coordinator
            .resolve_conflict(op.id, Uuid::new_v4(), ConflictResolution::Local, None)
            .await;
        assert!(matches!(result, Err(SyncError::ConflictNotFound(_))));
    }

    #[tokio::test]
    async fn test_double_resolution_rejected() {
        let coordinator = OperationCoordinator::new();
        let op = coordinator
            .create(Uuid::new_v4(), OperationKind::Push, "notes")
            .await;

        let conflict = SyncConflict::new(op.id, "note", json!("x"), json!("y"));
        let conflict_id = conflict.id;
        coordinator.store_conflicts(op.id, vec![conflict]).await;

        let resolved = coordinator
            .resolve_conflict(op.id, conflict_id, ConflictResolution::Remote, None)
            .await
            .unwrap();
        assert_eq!(resolved.resolved_value, Some(json!("y")));

        let again = coordinator
            .resolve_conflict(op.id, conflict_id, ConflictResolution::Local, None)
            .await;
        assert!(matches!(again, Err(SyncError::ConflictAlreadyResolved(_))));
    }

    #[tokio::test]
    async fn test_resolve_after_completion_rejected() {
        let coordinator = OperationCoordinator::new();
        let op = coordinator
            .create(Uuid::new_v4(), OperationKind::Push, "notes")
            .await;

        let conflict = SyncConflict::new(op.id, "note", json!("x"), json!("y"));
        let conflict_id = conflict.id;
        coordinator.store_conflicts(op.id, vec![conflict]).await;
        coordinator.complete(op.id, 1).await.unwrap();

        let result = coordinator
            .resolve_conflict(op.id, conflict_id, ConflictResolution::Local, None)
            .await;
        assert!(matches!(
            result,
            Err(SyncError::OperationAlreadyCompleted(_))
        ));
    }

    #[tokio::test]
    async fn test_merged_resolution_requires_value() {
        let coordinator = OperationCoordinator::new();
        let op = coordinator
            .create(Uuid::new_v4(), OperationKind::Merge, "notes")
            .await;

        let conflict = SyncConflict::new(op.id, "note", json!("x"), json!("y"));
        let conflict_id = conflict.id;
        coordinator.store_conflicts(op.id, vec![conflict]).await;

        let missing = coordinator
            .resolve_conflict(op.id, conflict_id, ConflictResolution::Merged, None)
            .await;
        assert!(matches!(missing, Err(SyncError::MissingMergedValue)));

        let resolved = coordinator
            .resolve_conflict(
                op.id,
                conflict_id,
                ConflictResolution::Merged,
                Some(json!("xy")),
            )
            .await
            .unwrap();
        assert_eq!(resolved.resolved_value, Some(json!("xy")));
    }

    #[tokio::test]
    async fn test_recent_for_session_newest_first() {
        let coordinator = OperationCoordinator::new();
        let session_id = Uuid::new_v4();

        let mut ids = Vec::new();
        for _ in 0..12 {
            let op = coordinator
                .create(session_id, OperationKind::Push, "notes")
                .await;
            ids.push(op.id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let recent = coordinator.recent_for_session(session_id, 10).await;
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].id, ids[11]);
        assert_eq!(recent[9].id, ids[2]);
    }

    #[tokio::test]
    async fn test_remove_for_session_cascades() {
        let coordinator = OperationCoordinator::new();
        let session_id = Uuid::new_v4();

        let op = coordinator
            .create(session_id, OperationKind::Push, "notes")
            .await;
        let other = coordinator
            .create(Uuid::new_v4(), OperationKind::Push, "notes")
            .await;
        coordinator
            .store_conflicts(op.id, vec![SyncConflict::new(op.id, "f", json!(1), json!(2))])
            .await;

        let removed = coordinator.remove_for_session(session_id).await;
        assert_eq!(removed, 1);
        assert!(coordinator.get(op.id).await.is_err());
        assert!(coordinator.conflicts_for(op.id).await.is_empty());
        assert!(coordinator.get(other.id).await.is_ok());
    }
}

//! Session management
//!
//! Owns the lifecycle of per-device sync sessions:
//! - In-memory session storage with rwlock protection
//! - Lazy expiry checks on access
//! - Periodic expired-session cleanup

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::types::{SessionStatus, SyncSession};

/// Manages sync sessions
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    /// Sessions indexed by ID
    sessions: RwLock<HashMap<Uuid, SyncSession>>,

    /// Session lifetime in hours
    ttl_hours: i64,
}

impl SessionManager {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                sessions: RwLock::new(HashMap::new()),
                ttl_hours,
            }),
        }
    }

    /// Create a new active session seeded with the user's current version
    pub async fn create(
        &self,
        user_id: &str,
        device_id: &str,
        platform: &str,
        metadata: Option<Value>,
        sync_version: u64,
    ) -> SyncSession {
        let session = SyncSession::new(
            user_id,
            device_id,
            platform,
            metadata,
            sync_version,
            self.inner.ttl_hours,
        );

        self.inner
            .sessions
            .write()
            .await
            .insert(session.id, session.clone());

        tracing::info!(
            session_id = %session.id,
            user_id = %user_id,
            device_id = %device_id,
            platform = %platform,
            sync_version = sync_version,
            "Created sync session"
        );

        session
    }

    /// Get a session by ID, rejecting expired sessions
    pub async fn get(&self, id: Uuid) -> Result<SyncSession> {
        let sessions = self.inner.sessions.read().await;
        let session = sessions
            .get(&id)
            .ok_or_else(|| SyncError::SessionNotFound(id.to_string()))?;

        if session.is_expired() {
            return Err(SyncError::SessionExpired(id.to_string()));
        }

        Ok(session.clone())
    }

    /// Set a session's status
    pub async fn set_status(&self, id: Uuid, status: SessionStatus) -> Result<()> {
        let mut sessions = self.inner.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| SyncError::SessionNotFound(id.to_string()))?;

        session.status = status;
        Ok(())
    }

    /// Record a completed sync: back to active, stamp last-sync time,
    /// advance the session's version cursor
    pub async fn complete_sync(&self, id: Uuid, new_version: u64) -> Result<SyncSession> {
        let mut sessions = self.inner.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| SyncError::SessionNotFound(id.to_string()))?;

        session.status = SessionStatus::Active;
        session.last_sync_at = Some(chrono::Utc::now());
        session.sync_version = new_version;

        Ok(session.clone())
    }

    /// Hard-delete a session
    pub async fn remove(&self, id: Uuid) -> Result<SyncSession> {
        let session = self
            .inner
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| SyncError::SessionNotFound(id.to_string()))?;

        tracing::info!(
            session_id = %id,
            user_id = %session.user_id,
            "Ended sync session"
        );

        Ok(session)
    }

    /// Remove expired sessions, returning their IDs so owners can
    /// cascade-delete dependent state
    pub async fn cleanup_expired(&self) -> Vec<Uuid> {
        let expired: Vec<Uuid> = {
            let sessions = self.inner.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, s)| s.is_expired())
                .map(|(id, _)| *id)
                .collect()
        };

        if !expired.is_empty() {
            let mut sessions = self.inner.sessions.write().await;
            for id in &expired {
                sessions.remove(id);
            }
            tracing::info!(count = expired.len(), "Cleaned up expired sync sessions");
        }

        expired
    }

    /// Number of stored sessions
    pub async fn count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }
}

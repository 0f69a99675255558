//! Per-user version tracking
//!
//! One monotonically increasing counter per user identity. Clients use
//! it as the cursor for "what changed since version N".

use std::collections::HashMap;

use tokio::sync::RwLock;

/// Tracks per-user sync version counters
pub struct VersionTracker {
    versions: RwLock<HashMap<String, u64>>,
}

impl VersionTracker {
    pub fn new() -> Self {
        Self {
            versions: RwLock::new(HashMap::new()),
        }
    }

    /// Current version for a user (0 if the user has never synced)
    pub async fn current(&self, user_id: &str) -> u64 {
        self.versions.read().await.get(user_id).copied().unwrap_or(0)
    }

    /// Increment the user's version by exactly 1 and return the new value
    pub async fn increment(&self, user_id: &str) -> u64 {
        let mut versions = self.versions.write().await;
        let version = versions.entry(user_id.to_string()).or_insert(0);
        *version += 1;

        tracing::debug!(user_id = %user_id, version = *version, "Incremented sync version");

        *version
    }
}

impl Default for VersionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_at_zero() {
        let tracker = VersionTracker::new();
        assert_eq!(tracker.current("user-1").await, 0);
    }

    #[tokio::test]
    async fn test_increments_by_one() {
        let tracker = VersionTracker::new();

        assert_eq!(tracker.increment("user-1").await, 1);
        assert_eq!(tracker.increment("user-1").await, 2);
        assert_eq!(tracker.current("user-1").await, 2);

        // Independent per user
        assert_eq!(tracker.current("user-2").await, 0);
        assert_eq!(tracker.increment("user-2").await, 1);
        assert_eq!(tracker.current("user-1").await, 2);
    }
}

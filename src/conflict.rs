//! Conflict detection and resolution
//!
//! Detection compares an existing snapshot and an incoming payload
//! field by field. Automatic resolution applies a small last-writer
//! style heuristic set; whatever it cannot settle goes back to the
//! caller for manual resolution.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::integrity::canonical_json;
use crate::types::{ConflictResolution, SyncConflict};

/// Detect field-level conflicts between a local snapshot and a remote
/// payload.
///
/// Only applies when both sides are keyed records. A key is in conflict
/// only if both sides define it and the canonical serializations differ;
/// a key present on one side only is an addition, not a conflict.
pub fn detect_conflicts(operation_id: Uuid, local: &Value, remote: &Value) -> Vec<SyncConflict> {
    let (Value::Object(local_map), Value::Object(remote_map)) = (local, remote) else {
        return Vec::new();
    };

    let keys: BTreeSet<&String> = local_map.keys().chain(remote_map.keys()).collect();
    let mut conflicts = Vec::new();

    for key in keys {
        if let (Some(local_value), Some(remote_value)) = (local_map.get(key), remote_map.get(key))
        {
            if canonical_json(local_value) != canonical_json(remote_value) {
                conflicts.push(SyncConflict::new(
                    operation_id,
                    key,
                    local_value.clone(),
                    remote_value.clone(),
                ));
            }
        }
    }

    conflicts
}

/// Attempt automatic resolution of a single conflict, first match wins:
///
/// 1. Timestamp-like field and the remote value parses as a strictly
///    later date than the local value: remote wins.
/// 2. Local is null, remote is not: remote wins.
/// 3. Remote is null, local is not: local wins.
///
/// Returns true if the conflict was resolved.
pub fn auto_resolve(conflict: &mut SyncConflict) -> bool {
    if is_timestamp_field(&conflict.field) {
        if let (Some(local), Some(remote)) = (
            parse_datetime(&conflict.local_value),
            parse_datetime(&conflict.remote_value),
        ) {
            if remote > local {
                let winner = conflict.remote_value.clone();
                conflict.resolve(ConflictResolution::Remote, winner);
                return true;
            }
        }
    }

    if conflict.local_value.is_null() && !conflict.remote_value.is_null() {
        let winner = conflict.remote_value.clone();
        conflict.resolve(ConflictResolution::Remote, winner);
        return true;
    }

    if conflict.remote_value.is_null() && !conflict.local_value.is_null() {
        let winner = conflict.local_value.clone();
        conflict.resolve(ConflictResolution::Local, winner);
        return true;
    }

    false
}

/// Case-sensitive match for fields carrying modification times
fn is_timestamp_field(name: &str) -> bool {
    name.contains("timestamp") || name.ends_with("updatedAt")
}

/// Parse a JSON string value as an RFC 3339 date
fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detect(local: &Value, remote: &Value) -> Vec<SyncConflict> {
        detect_conflicts(Uuid::new_v4(), local, remote)
    }

    #[test]
    fn test_additions_are_not_conflicts() {
        let local = json!({"name": "Al"});
        let remote = json!({"name": "Al", "age": 30});

        assert!(detect(&local, &remote).is_empty());
    }

    #[test]
    fn test_differing_values_conflict() {
        let local = json!({"note": "x", "color": "red"});
        let remote = json!({"note": "y", "color": "red"});

        let conflicts = detect(&local, &remote);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "note");
        assert_eq!(conflicts[0].local_value, json!("x"));
        assert_eq!(conflicts[0].remote_value, json!("y"));
    }

    #[test]
    fn test_detection_is_symmetric() {
        let a = json!({"note": "x", "shared": 1, "only_a": true});
        let b = json!({"note": "y", "shared": 1, "only_b": true});

        let forward = detect(&a, &b);
        let backward = detect(&b, &a);

        let forward_fields: Vec<&str> = forward.iter().map(|c| c.field.as_str()).collect();
        let backward_fields: Vec<&str> = backward.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(forward_fields, backward_fields);

        assert_eq!(forward[0].local_value, backward[0].remote_value);
        assert_eq!(forward[0].remote_value, backward[0].local_value);
    }

    #[test]
    fn test_non_objects_never_conflict() {
        assert!(detect(&json!([1, 2]), &json!([3, 4])).is_empty());
        assert!(detect(&json!("a"), &json!("b")).is_empty());
        assert!(detect(&json!({"k": 1}), &json!([1])).is_empty());
    }

    #[test]
    fn test_auto_resolve_later_timestamp_wins() {
        let mut conflict = SyncConflict::new(
            Uuid::new_v4(),
            "updatedAt",
            json!("2024-01-01T00:00:00Z"),
            json!("2024-06-01T00:00:00Z"),
        );

        assert!(auto_resolve(&mut conflict));
        assert_eq!(conflict.resolution, Some(ConflictResolution::Remote));
        assert_eq!(conflict.resolved_value, Some(json!("2024-06-01T00:00:00Z")));
    }

    #[test]
    fn test_auto_resolve_earlier_remote_timestamp_stays_unresolved() {
        let mut conflict = SyncConflict::new(
            Uuid::new_v4(),
            "lastTimestamp",
            json!("2024-06-01T00:00:00Z"),
            json!("2024-01-01T00:00:00Z"),
        );

        assert!(!auto_resolve(&mut conflict));
        assert!(!conflict.is_resolved());
    }

    #[test]
    fn test_auto_resolve_null_rules() {
        let mut local_null =
            SyncConflict::new(Uuid::new_v4(), "note", json!(null), json!("remote"));
        assert!(auto_resolve(&mut local_null));
        assert_eq!(local_null.resolution, Some(ConflictResolution::Remote));

        let mut remote_null =
            SyncConflict::new(Uuid::new_v4(), "note", json!("local"), json!(null));
        assert!(auto_resolve(&mut remote_null));
        assert_eq!(remote_null.resolution, Some(ConflictResolution::Local));
    }

    #[test]
    fn test_auto_resolve_leaves_plain_disagreement() {
        let mut conflict =
            SyncConflict::new(Uuid::new_v4(), "note", json!("x"), json!("y"));
        assert!(!auto_resolve(&mut conflict));
    }

    #[test]
    fn test_timestamp_field_matching_is_case_sensitive() {
        assert!(is_timestamp_field("timestamp"));
        assert!(is_timestamp_field("server_timestamp_ms"));
        assert!(is_timestamp_field("updatedAt"));
        assert!(is_timestamp_field("recordUpdatedAt"));
        assert!(!is_timestamp_field("Timestamp"));
        assert!(!is_timestamp_field("updated_at"));
    }
}

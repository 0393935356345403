//! Record stamping shared by the document stores
//!
//! Stores own `createdAt` and `updatedAt`: whatever the caller sent under
//! those keys is replaced by the store's clock.

use chrono::{DateTime, Utc};
use curate_core::{CREATED_AT, Fields, UPDATED_AT, timestamp_value};

/// Fields of a new record: caller data plus a store-assigned `createdAt`
pub fn stamp_created(mut fields: Fields, now: DateTime<Utc>) -> Fields {
    fields.remove(UPDATED_AT);
    fields.insert(CREATED_AT.to_string(), timestamp_value(now));
    fields
}

/// Merge `changes` into `existing`, keeping `createdAt` and stamping
/// `updatedAt`. Keys absent from `changes` are untouched.
pub fn merge_update(existing: &mut Fields, mut changes: Fields, now: DateTime<Utc>) {
    changes.remove(CREATED_AT);
    changes.remove(UPDATED_AT);
    for (key, value) in changes {
        existing.insert(key, value);
    }
    existing.insert(UPDATED_AT.to_string(), timestamp_value(now));
}

/// Fresh opaque record id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[test]
    fn test_created_at_is_store_assigned() {
        let now = Utc::now();
        let stamped = stamp_created(
            fields(json!({"name": "Alice", "createdAt": "1999-01-01T00:00:00Z", "updatedAt": 5})),
            now,
        );
        assert_eq!(stamped["createdAt"], timestamp_value(now));
        assert!(!stamped.contains_key("updatedAt"));
        assert_eq!(stamped["name"], "Alice");
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let created = Utc::now();
        let mut record = stamp_created(fields(json!({"name": "Alice", "message": "hi"})), created);

        let later = created + chrono::Duration::seconds(3);
        merge_update(
            &mut record,
            fields(json!({"message": "hello", "createdAt": "2000-01-01T00:00:00Z"})),
            later,
        );

        assert_eq!(record["name"], "Alice");
        assert_eq!(record["message"], "hello");
        assert_eq!(record["createdAt"], timestamp_value(created));
        assert_eq!(record["updatedAt"], timestamp_value(later));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}

//! Raw document shapes pushed by a document store
//!
//! A [`Document`] is whatever the backend holds: the user's fields plus the
//! record-level metadata keys [`CREATED_AT`], [`UPDATED_AT`] and [`ORDER`].
//! Normalization into [`ContentItem`](crate::ContentItem) happens in the sync
//! layer; this module only provides the accessors it needs.

use std::cmp::Ordering;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::ContentType;

/// Creation timestamp key, assigned by the store
pub const CREATED_AT: &str = "createdAt";
/// Last-update timestamp key, assigned by the store on merge
pub const UPDATED_AT: &str = "updatedAt";
/// Manual ordering key
pub const ORDER: &str = "order";

/// Keys that are record metadata, never user data
pub const METADATA_KEYS: [&str; 3] = [CREATED_AT, UPDATED_AT, ORDER];

/// Field map of a stored document
pub type Fields = Map<String, Value>;

/// A stored record: opaque id plus its raw field map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Parsed creation timestamp, if present and well formed
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.get(CREATED_AT).and_then(parse_timestamp)
    }

    /// Parsed update timestamp, if present and well formed
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.get(UPDATED_AT).and_then(parse_timestamp)
    }

    /// Manual order, only when it is a positive integer
    pub fn order(&self) -> Option<u32> {
        self.get(ORDER).and_then(parse_order)
    }
}

/// Full current record set of one collection, in backend sort order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub content_type: ContentType,
    pub documents: Vec<Document>,
}

impl Snapshot {
    pub fn new(content_type: ContentType, documents: Vec<Document>) -> Self {
        Self {
            content_type,
            documents,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Backend ordering of a collection subscription.
///
/// A store instance uses exactly one policy; the two are never mixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPolicy {
    /// `order` ascending, unordered records last (newest first among them)
    #[default]
    OrderAsc,
    /// `createdAt` descending
    CreatedAtDesc,
}

impl SortPolicy {
    /// Stable sort of documents according to this policy
    pub fn sort(&self, documents: &mut [Document]) {
        match self {
            SortPolicy::OrderAsc => documents.sort_by(|a, b| {
                compare_order(a.order(), b.order())
                    .then_with(|| compare_newest_first(a.created_at(), b.created_at()))
            }),
            SortPolicy::CreatedAtDesc => {
                documents.sort_by(|a, b| compare_newest_first(a.created_at(), b.created_at()))
            }
        }
    }

    /// Whether the sync layer should re-sort the merged collection globally
    pub fn is_global_order(&self) -> bool {
        matches!(self, SortPolicy::OrderAsc)
    }
}

/// Order comparison where an absent order counts as +infinity
pub fn compare_order(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Parse a stored timestamp: RFC 3339 string or epoch milliseconds
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Encode a timestamp the way stores persist it
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

/// Parse a manual order; zero, negative, fractional or non-numeric is unordered
pub fn parse_order(value: &Value) -> Option<u32> {
    let n = value.as_f64()?;
    if n >= 1.0 && n.fract() == 0.0 && n <= u32::MAX as f64 {
        Some(n as u32)
    } else {
        None
    }
}

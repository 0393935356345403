//! Canonical content item model

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::ContentType;
use crate::value::FieldValue;

/// A normalized record as the view layer sees it.
///
/// `data` never contains the metadata keys; those live in `created_at`,
/// `updated_at` and `order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Store-assigned id, unique within its type's collection
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub data: BTreeMap<String, FieldValue>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Positive manual order; `None` sorts after every ordered item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, content_type: ContentType, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            content_type,
            data: BTreeMap::new(),
            created_at,
            updated_at: None,
            order: None,
        }
    }

    /// Add a data field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    /// Set the manual order; zero is treated as unordered
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = (order > 0).then_some(order);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.data.get(name)
    }

    /// Text value of a field, if it is text
    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_str)
    }

    pub fn is_ordered(&self) -> bool {
        self.order.is_some()
    }
}

//! Schema/Field Registry
//!
//! Maps each content type to the ordered fields its form shows and its list
//! view renders. Types without a registered schema fall back to fields
//! discovered from the first item of that type, so ad-hoc shapes written by
//! other tools still render.

use std::collections::{BTreeMap, HashSet};

use curate_core::{
    ContentItem, ContentType, FieldDescriptor, FieldKind, FieldValue, format_label,
    is_image_field, is_web_url,
};
use serde::Serialize;
use tracing::warn;

/// Field list of a content type, tagged with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "fields", rename_all = "lowercase")]
pub enum Schema {
    /// Registered for the type
    Declared(Vec<FieldDescriptor>),
    /// Derived from the data keys of an existing item
    Discovered(Vec<FieldDescriptor>),
}

impl Schema {
    pub fn fields(&self) -> &[FieldDescriptor] {
        match self {
            Schema::Declared(fields) | Schema::Discovered(fields) => fields,
        }
    }

    pub fn into_fields(self) -> Vec<FieldDescriptor> {
        match self {
            Schema::Declared(fields) | Schema::Discovered(fields) => fields,
        }
    }

    pub fn is_declared(&self) -> bool {
        matches!(self, Schema::Declared(_))
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields().iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// Static content type → field list mapping
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<ContentType, Vec<FieldDescriptor>>,
}

impl SchemaRegistry {
    /// Registry with nothing declared; every lookup is discovered
    pub fn new() -> Self {
        Self::default()
    }

    /// The dashboard's built-in schemas
    pub fn builtin() -> Self {
        let mut screenshots = vec![FieldDescriptor::text("name", "Name")];
        screenshots.extend(
            (1..=5).map(|n| FieldDescriptor::file(format!("screenshot{n}"), format!("Screenshot {n}"))),
        );

        Self::new()
            .with_schema(
                ContentType::Reels,
                vec![
                    FieldDescriptor::text("name", "Name"),
                    FieldDescriptor::url("reelsUrl", "Reels URL"),
                    FieldDescriptor::file("thumbnail", "Thumbnail"),
                ],
            )
            .with_schema(ContentType::Screenshots, screenshots)
            .with_schema(
                ContentType::Greetings,
                vec![
                    FieldDescriptor::text("name", "Name"),
                    FieldDescriptor::text("message", "Message"),
                    FieldDescriptor::file("imageUrl", "Image"),
                ],
            )
    }

    /// Register (or replace) the fields of a type
    pub fn with_schema(mut self, content_type: ContentType, fields: Vec<FieldDescriptor>) -> Self {
        self.register(content_type, fields);
        self
    }

    pub fn register(&mut self, content_type: ContentType, fields: Vec<FieldDescriptor>) {
        self.schemas.insert(content_type, fields);
    }

    /// Registered fields, if any
    pub fn declared(&self, content_type: ContentType) -> Option<&[FieldDescriptor]> {
        self.schemas.get(&content_type).map(Vec::as_slice)
    }

    /// Fields for `content_type`: declared when registered, otherwise
    /// discovered from the first item of that type in `items`.
    pub fn fields_for(&self, content_type: ContentType, items: &[ContentItem]) -> Schema {
        match self.declared(content_type) {
            Some(fields) => Schema::Declared(fields.to_vec()),
            None => Schema::Discovered(discover_fields(
                items.iter().find(|item| item.content_type == content_type),
            )),
        }
    }
}

/// Descriptors inferred from an item's data keys, in key order
pub fn discover_fields(item: Option<&ContentItem>) -> Vec<FieldDescriptor> {
    let Some(item) = item else {
        return Vec::new();
    };

    item.data
        .iter()
        .map(|(key, value)| FieldDescriptor::new(key.clone(), format_label(key), infer_kind(key, value)))
        .collect()
}

fn infer_kind(key: &str, value: &FieldValue) -> FieldKind {
    if is_image_field(key, FieldKind::Text) {
        FieldKind::File
    } else if value.as_str().is_some_and(is_web_url) {
        FieldKind::Url
    } else {
        FieldKind::Text
    }
}

/// A known field with its presentation hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

impl CatalogEntry {
    const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            placeholder: None,
            description: None,
        }
    }

    const fn placeholder(mut self, placeholder: &'static str) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    const fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn descriptor(&self) -> FieldDescriptor {
        FieldDescriptor::new(self.name, self.label, self.kind)
    }
}

/// Every field name a suggestion may use
pub const FIELD_CATALOG: [CatalogEntry; 11] = [
    CatalogEntry::new("name", "Name", FieldKind::Text),
    CatalogEntry::new("message", "Message", FieldKind::Text),
    CatalogEntry::new("youtubeUrl", "YouTube URL", FieldKind::Url)
        .placeholder("https://youtube.com/watch?v=..."),
    CatalogEntry::new("imageUrl", "Image", FieldKind::File).description("Upload a single image."),
    CatalogEntry::new("reelsUrl", "Reels URL", FieldKind::Url)
        .placeholder("https://instagram.com/reel/..."),
    CatalogEntry::new("thumbnail", "Thumbnail", FieldKind::File)
        .description("Upload a thumbnail for the Reel."),
    CatalogEntry::new("screenshot1", "Screenshot 1", FieldKind::File),
    CatalogEntry::new("screenshot2", "Screenshot 2", FieldKind::File),
    CatalogEntry::new("screenshot3", "Screenshot 3", FieldKind::File),
    CatalogEntry::new("screenshot4", "Screenshot 4", FieldKind::File),
    CatalogEntry::new("screenshot5", "Screenshot 5", FieldKind::File),
];

pub fn catalog_entry(name: &str) -> Option<&'static CatalogEntry> {
    FIELD_CATALOG.iter().find(|entry| entry.name == name)
}

/// Turn suggested field names into descriptors.
///
/// Unknown names are dropped with a warning; duplicates keep their first
/// position.
pub fn descriptors_from_names<S: AsRef<str>>(names: &[S]) -> Vec<FieldDescriptor> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| seen.insert(name.to_string()))
        .filter_map(|name| match catalog_entry(name) {
            Some(entry) => Some(entry.descriptor()),
            None => {
                warn!(field = name, "Dropping unknown suggested field");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn names(fields: &[FieldDescriptor]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_builtin_order() {
        let registry = SchemaRegistry::builtin();

        let reels = registry.fields_for(ContentType::Reels, &[]);
        assert!(reels.is_declared());
        assert_eq!(names(reels.fields()), vec!["name", "reelsUrl", "thumbnail"]);
        assert_eq!(reels.field("reelsUrl").unwrap().label, "Reels URL");

        let shots = registry.fields_for(ContentType::Screenshots, &[]);
        assert_eq!(
            names(shots.fields()),
            vec!["name", "screenshot1", "screenshot2", "screenshot3", "screenshot4", "screenshot5"]
        );
        assert!(shots.fields()[1..].iter().all(|f| f.kind == FieldKind::File));

        let greetings = registry.fields_for(ContentType::Greetings, &[]);
        assert_eq!(names(greetings.fields()), vec!["name", "message", "imageUrl"]);
        assert!(greetings.field("imageUrl").unwrap().is_image());
    }

    #[test]
    fn test_discovered_from_first_item_of_type() {
        let registry = SchemaRegistry::new();
        let items = vec![
            ContentItem::new("g1", ContentType::Greetings, Utc::now()).with_field("other", "x"),
            ContentItem::new("r1", ContentType::Reels, Utc::now())
                .with_field("title", "Hello")
                .with_field("coverPhoto", "https://cdn/x.png")
                .with_field("link", "https://example.com/v")
                .with_field("views", 12.0),
            ContentItem::new("r2", ContentType::Reels, Utc::now()).with_field("ignored", "y"),
        ];

        let schema = registry.fields_for(ContentType::Reels, &items);
        assert!(!schema.is_declared());
        let fields = schema.fields();
        assert_eq!(names(fields), vec!["coverPhoto", "link", "title", "views"]);
        assert_eq!(fields[0].kind, FieldKind::File);
        assert_eq!(fields[0].label, "Cover Photo");
        assert_eq!(fields[1].kind, FieldKind::Url);
        assert_eq!(fields[2].kind, FieldKind::Text);
        assert_eq!(fields[3].kind, FieldKind::Text);
    }

    #[test]
    fn test_discovered_empty_without_items() {
        let schema = SchemaRegistry::new().fields_for(ContentType::Screenshots, &[]);
        assert_eq!(schema, Schema::Discovered(Vec::new()));
    }

    #[test]
    fn test_descriptors_from_names() {
        let fields = descriptors_from_names(&["reelsUrl", "bogus", "thumbnail", "reelsUrl"]);
        assert_eq!(names(&fields), vec!["reelsUrl", "thumbnail"]);
        assert_eq!(fields[0].kind, FieldKind::Url);
        assert_eq!(fields[1].kind, FieldKind::File);
    }

    #[test]
    fn test_catalog_hints() {
        let entry = catalog_entry("youtubeUrl").unwrap();
        assert_eq!(entry.label, "YouTube URL");
        assert!(entry.placeholder.is_some());
        assert!(catalog_entry("nope").is_none());
    }

    #[test]
    fn test_schema_serializes_tagged() {
        let schema = Schema::Declared(vec![FieldDescriptor::text("name", "Name")]);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["source"], "declared");
        assert_eq!(json["fields"][0]["kind"], "text");
    }
}

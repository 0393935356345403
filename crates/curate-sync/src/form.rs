//! Form Builder
//!
//! A [`FormSchema`] carries the fields of one content type plus a
//! validation rule per field. [`FormSession`] runs the submit flow:
//! validate, collapse file selections to one upload each, persist, notify.
//! [`EditSession`] does the same for editing an existing item.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use curate_core::{
    ContentItem, ContentType, FieldDescriptor, FieldKind, FieldValue, ORDER, SuggestionError,
    SuggestionService, format_label, is_image_field,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::PersistenceError;
use crate::persistence::{FieldData, FieldPayload, FileUpload, PersistenceAdapter};
use crate::schema::{SchemaRegistry, catalog_entry, descriptors_from_names};

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_INVALID_URL: &str = "Please enter a valid URL.";
pub const MSG_FILE_REQUIRED: &str = "File is required.";

/// Raw value of one form control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormInput {
    Text(String),
    Files(Vec<FileUpload>),
}

/// Field name → input, as submitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    values: BTreeMap<String, FormInput>,
}

impl FormSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, FormInput::Text(value.into()));
        self
    }

    pub fn with_file(mut self, field: impl Into<String>, file: FileUpload) -> Self {
        let field = field.into();
        match self.values.get_mut(&field) {
            Some(FormInput::Files(files)) => files.push(file),
            _ => {
                self.values.insert(field, FormInput::Files(vec![file]));
            }
        }
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, input: FormInput) {
        self.values.insert(field.into(), input);
    }

    pub fn get(&self, field: &str) -> Option<&FormInput> {
        self.values.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FormInput)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Validation rule derived from a field's kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRule {
    /// Non-empty after trimming
    RequiredText,
    /// Non-empty and parses as an absolute URL
    Url,
    /// At least one file selected
    RequiredFile,
}

impl FieldRule {
    pub fn for_kind(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => FieldRule::RequiredText,
            FieldKind::Url => FieldRule::Url,
            FieldKind::File => FieldRule::RequiredFile,
        }
    }

    /// Error message for `input`, or `None` when it passes
    pub fn check(&self, input: Option<&FormInput>) -> Option<&'static str> {
        match self {
            FieldRule::RequiredText => match input {
                Some(FormInput::Text(text)) if !text.trim().is_empty() => None,
                _ => Some(MSG_REQUIRED),
            },
            FieldRule::Url => match input {
                Some(FormInput::Text(text)) if !text.trim().is_empty() => {
                    if url::Url::parse(text.trim()).is_ok() {
                        None
                    } else {
                        Some(MSG_INVALID_URL)
                    }
                }
                _ => Some(MSG_REQUIRED),
            },
            FieldRule::RequiredFile => match input {
                Some(FormInput::Files(files)) if !files.is_empty() => None,
                _ => Some(MSG_FILE_REQUIRED),
            },
        }
    }
}

/// A failed rule on one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Presentation hints for a form control
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldHint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Fields and validation rules for one content type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub content_type: ContentType,
    pub fields: Vec<FieldDescriptor>,
    pub rules: BTreeMap<String, FieldRule>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub hints: BTreeMap<String, FieldHint>,
}

impl FormSchema {
    pub fn new(content_type: ContentType, fields: Vec<FieldDescriptor>) -> Self {
        let rules = fields
            .iter()
            .map(|f| (f.name.clone(), FieldRule::for_kind(f.kind)))
            .collect();
        let hints = fields
            .iter()
            .filter_map(|f| {
                let entry = catalog_entry(&f.name)?;
                if entry.placeholder.is_none() && entry.description.is_none() {
                    return None;
                }
                Some((
                    f.name.clone(),
                    FieldHint {
                        placeholder: entry.placeholder.map(str::to_string),
                        description: entry.description.map(str::to_string),
                    },
                ))
            })
            .collect();

        Self {
            content_type,
            fields,
            rules,
            hints,
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Check every field; all failures are reported, in field order
    pub fn validate(&self, submission: &FormSubmission) -> Result<(), Vec<FieldError>> {
        let errors: Vec<FieldError> = self
            .fields
            .iter()
            .filter_map(|field| {
                let rule = self.rules.get(&field.name)?;
                rule.check(submission.get(&field.name)).map(|message| FieldError {
                    field: field.name.clone(),
                    message: message.to_string(),
                })
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Payload for the persistence adapter.
    ///
    /// Only schema fields are kept, each file field contributes its first
    /// selected file, and a positive integer `order` is passed through as a
    /// number.
    pub fn normalize(&self, submission: FormSubmission) -> FieldData {
        let mut data = FieldData::new();

        for (name, input) in submission.values {
            if name == ORDER {
                let order = match &input {
                    FormInput::Text(text) => parse_order_input(text),
                    FormInput::Files(_) => None,
                };
                if let Some(order) = order {
                    data.insert(name, FieldPayload::Value(Value::from(order)));
                }
                continue;
            }
            if !self.rules.contains_key(&name) {
                debug!(field = %name, "Ignoring field outside the form schema");
                continue;
            }
            match input {
                FormInput::Text(text) => {
                    data.insert(name, FieldPayload::Value(Value::String(text.trim().to_string())));
                }
                FormInput::Files(files) => {
                    if let Some(file) = files.into_iter().next() {
                        data.insert(name, FieldPayload::File(file));
                    }
                }
            }
        }

        data
    }
}

fn parse_order_input(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

/// Builds form schemas from the registry or a suggestion service
pub struct FormBuilder;

impl FormBuilder {
    /// Form for the registry's fields of `content_type`
    pub fn from_registry(registry: &SchemaRegistry, content_type: ContentType) -> FormSchema {
        let fields = registry.fields_for(content_type, &[]).into_fields();
        FormSchema::new(content_type, fields)
    }

    /// Form for the fields a suggestion service proposes
    #[instrument(skip(service))]
    pub async fn suggested(
        service: &dyn SuggestionService,
        content_type: ContentType,
    ) -> Result<FormSchema, SuggestionError> {
        let names = service.suggest_fields(content_type).await?;
        let fields = descriptors_from_names(&names);
        if fields.is_empty() {
            warn!(suggested = ?names, "No usable suggested fields");
        }
        Ok(FormSchema::new(content_type, fields))
    }
}

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A toast shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Delivers notifications to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            NotificationLevel::Success => tracing::info!(title = %n.title, "{}", n.description),
            NotificationLevel::Error => tracing::warn!(title = %n.title, "{}", n.description),
        }
    }
}

/// Keeps every notification for later inspection
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification);
    }
}

/// Result of a submit or save
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Created { id: String },
    Updated { id: String },
    /// Validation failed; nothing was written
    Invalid(Vec<FieldError>),
    /// Another submit on this session is still running
    Busy,
    /// The write failed; not retried
    Failed(PersistenceError),
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Created { .. } | SubmitOutcome::Updated { .. })
    }
}

/// Clears the in-progress flag when the submit finishes, however it ends
struct InProgress<'a>(&'a AtomicBool);

impl<'a> InProgress<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InProgress(flag))
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// An add-content form bound to one content type
pub struct FormSession {
    schema: FormSchema,
    adapter: Arc<PersistenceAdapter>,
    notifier: Arc<dyn Notifier>,
    in_progress: AtomicBool,
    draft: Mutex<FormSubmission>,
}

impl FormSession {
    pub fn new(
        schema: FormSchema,
        adapter: Arc<PersistenceAdapter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            schema,
            adapter,
            notifier,
            in_progress: AtomicBool::new(false),
            draft: Mutex::new(FormSubmission::new()),
        }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn is_submitting(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Set one control of the draft
    pub fn set_input(&self, field: impl Into<String>, input: FormInput) {
        self.draft
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(field, input);
    }

    pub fn draft(&self) -> FormSubmission {
        self.draft.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Submit the current draft
    pub async fn submit_draft(&self) -> SubmitOutcome {
        let draft = self.draft();
        self.submit(draft).await
    }

    /// Validate, upload and create. The draft is cleared on success.
    #[instrument(skip(self, submission), fields(content_type = %self.schema.content_type))]
    pub async fn submit(&self, submission: FormSubmission) -> SubmitOutcome {
        let Some(_guard) = InProgress::acquire(&self.in_progress) else {
            debug!("Submit already in progress");
            return SubmitOutcome::Busy;
        };

        if let Err(errors) = self.schema.validate(&submission) {
            debug!(errors = errors.len(), "Submission failed validation");
            return SubmitOutcome::Invalid(errors);
        }

        let content_type = self.schema.content_type;
        let data = self.schema.normalize(submission);

        match self.adapter.create(content_type, data).await {
            Ok(id) => {
                *self.draft.lock().unwrap_or_else(|e| e.into_inner()) = FormSubmission::new();
                self.notifier.notify(Notification::success(
                    "Success!",
                    format!("Your {} content has been added.", content_type),
                ));
                SubmitOutcome::Created { id }
            }
            Err(e) => {
                self.notifier.notify(Notification::error(
                    "Error",
                    format!("Could not save your {} content: {}", content_type, e),
                ));
                SubmitOutcome::Failed(e)
            }
        }
    }
}

/// One editable field of an existing item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditableField {
    pub name: String,
    pub label: String,
    pub value: FieldValue,
    /// Edited with a file picker rather than a text box
    pub is_image: bool,
}

/// Edit form for an existing item
pub struct EditSession {
    item: ContentItem,
    fields: Vec<EditableField>,
    adapter: Arc<PersistenceAdapter>,
    notifier: Arc<dyn Notifier>,
    in_progress: AtomicBool,
}

impl EditSession {
    pub fn new(
        item: ContentItem,
        adapter: Arc<PersistenceAdapter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let fields = editable_fields(&item);
        Self {
            item,
            fields,
            adapter,
            notifier,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn item(&self) -> &ContentItem {
        &self.item
    }

    pub fn fields(&self) -> &[EditableField] {
        &self.fields
    }

    pub fn is_saving(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Save changed fields. Image fields take a file, others text; keys the
    /// item does not have are ignored.
    #[instrument(skip(self, changes), fields(content_type = %self.item.content_type, id = %self.item.id))]
    pub async fn save(&self, changes: FormSubmission) -> SubmitOutcome {
        let Some(_guard) = InProgress::acquire(&self.in_progress) else {
            return SubmitOutcome::Busy;
        };

        let mut data = FieldData::new();
        let mut errors = Vec::new();
        for (name, input) in changes.values {
            let Some(field) = self.fields.iter().find(|f| f.name == name) else {
                debug!(field = %name, "Ignoring unknown field in edit");
                continue;
            };
            match (input, field.is_image) {
                (FormInput::Files(files), true) => {
                    if let Some(file) = files.into_iter().next() {
                        data.insert(name, FieldPayload::File(file));
                    }
                }
                (FormInput::Text(text), false) => {
                    data.insert(name, FieldPayload::Value(Value::String(text)));
                }
                (FormInput::Text(_), true) => errors.push(FieldError {
                    field: name,
                    message: MSG_FILE_REQUIRED.to_string(),
                }),
                (FormInput::Files(_), false) => errors.push(FieldError {
                    field: name,
                    message: MSG_REQUIRED.to_string(),
                }),
            }
        }
        if !errors.is_empty() {
            return SubmitOutcome::Invalid(errors);
        }

        let content_type = self.item.content_type;
        match self.adapter.update(content_type, &self.item.id, data).await {
            Ok(()) => {
                self.notifier.notify(Notification::success(
                    "Saved",
                    format!("Your {} content has been updated.", content_type),
                ));
                SubmitOutcome::Updated {
                    id: self.item.id.clone(),
                }
            }
            Err(e) => {
                self.notifier.notify(Notification::error(
                    "Error",
                    format!("Could not update your {} content: {}", content_type, e),
                ));
                SubmitOutcome::Failed(e)
            }
        }
    }
}

/// Data fields of an item as edit controls, in key order
pub fn editable_fields(item: &ContentItem) -> Vec<EditableField> {
    item.data
        .iter()
        .map(|(name, value)| EditableField {
            name: name.clone(),
            label: format_label(name),
            value: value.clone(),
            is_image: is_image_field(name, FieldKind::Text),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn reels_schema() -> FormSchema {
        FormBuilder::from_registry(&SchemaRegistry::builtin(), ContentType::Reels)
    }

    #[test]
    fn test_registry_form_is_deterministic() {
        for content_type in ContentType::ALL {
            let registry = SchemaRegistry::builtin();
            let a = FormBuilder::from_registry(&registry, content_type);
            let b = FormBuilder::from_registry(&registry, content_type);
            assert_eq!(a, b);

            let declared: Vec<&str> = registry
                .declared(content_type)
                .unwrap()
                .iter()
                .map(|f| f.name.as_str())
                .collect();
            assert_eq!(a.field_names(), declared);
        }
    }

    #[test]
    fn test_rules_and_messages() {
        let schema = reels_schema();
        assert_eq!(schema.rules["name"], FieldRule::RequiredText);
        assert_eq!(schema.rules["reelsUrl"], FieldRule::Url);
        assert_eq!(schema.rules["thumbnail"], FieldRule::RequiredFile);
        assert!(schema.hints["reelsUrl"].placeholder.is_some());

        let errors = schema
            .validate(
                &FormSubmission::new()
                    .with_text("name", "   ")
                    .with_text("reelsUrl", "not a url"),
            )
            .unwrap_err();
        assert_eq!(
            errors,
            vec![
                FieldError {
                    field: "name".into(),
                    message: MSG_REQUIRED.into()
                },
                FieldError {
                    field: "reelsUrl".into(),
                    message: MSG_INVALID_URL.into()
                },
                FieldError {
                    field: "thumbnail".into(),
                    message: MSG_FILE_REQUIRED.into()
                },
            ]
        );

        let errors = schema
            .validate(&FormSubmission::new().with_text("reelsUrl", ""))
            .unwrap_err();
        assert_eq!(errors[1].message, MSG_REQUIRED);
    }

    #[test]
    fn test_valid_submission() {
        let schema = reels_schema();
        let submission = FormSubmission::new()
            .with_text("name", "Alice")
            .with_text("reelsUrl", "https://instagram.com/reel/1")
            .with_file("thumbnail", FileUpload::new("t.png", &b"png"[..]));
        assert!(schema.validate(&submission).is_ok());
    }

    #[test]
    fn test_normalize_takes_first_file_and_order() {
        let schema = reels_schema();
        let submission = FormSubmission::new()
            .with_text("name", " Alice ")
            .with_text("order", "3")
            .with_text("stray", "ignored")
            .with_file("thumbnail", FileUpload::new("first.png", &b"1"[..]))
            .with_file("thumbnail", FileUpload::new("second.png", &b"2"[..]));

        let data = schema.normalize(submission);
        assert_eq!(data["name"], FieldPayload::Value(Value::from("Alice")));
        assert_eq!(data["order"], FieldPayload::Value(Value::from(3)));
        assert!(!data.contains_key("stray"));
        match &data["thumbnail"] {
            FieldPayload::File(file) => assert_eq!(file.filename, "first.png"),
            other => panic!("expected file, got {other:?}"),
        }

        let data = schema.normalize(FormSubmission::new().with_text("order", "0"));
        assert!(!data.contains_key("order"));
    }

    struct FixedSuggestions(Vec<String>);

    #[async_trait]
    impl SuggestionService for FixedSuggestions {
        async fn suggest_fields(
            &self,
            _content_type: ContentType,
        ) -> Result<Vec<String>, SuggestionError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_suggested_form_drops_unknown() {
        let service = FixedSuggestions(vec!["reelsUrl".into(), "mystery".into(), "thumbnail".into()]);
        let schema = FormBuilder::suggested(&service, ContentType::Reels).await.unwrap();
        assert_eq!(schema.field_names(), vec!["reelsUrl", "thumbnail"]);
    }

    #[test]
    fn test_editable_fields_mark_images() {
        let item = ContentItem::new("g1", ContentType::Greetings, chrono::Utc::now())
            .with_field("name", "Bo")
            .with_field("imageUrl", "https://cdn/x.png");
        let fields = editable_fields(&item);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "imageUrl");
        assert!(fields[0].is_image);
        assert_eq!(fields[0].label, "Image Url");
        assert!(!fields[1].is_image);
    }

    #[test]
    fn test_in_progress_guard_releases() {
        let flag = AtomicBool::new(false);
        {
            let _guard = InProgress::acquire(&flag).unwrap();
            assert!(InProgress::acquire(&flag).is_none());
        }
        assert!(InProgress::acquire(&flag).is_some());
    }
}

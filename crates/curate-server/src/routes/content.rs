//! Content routes: grid summary, paginated lists, forms, create/edit/delete

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json as ResponseJson;
use axum::Extension;
use chrono::Utc;
use curate_core::{ContentType, CurateError, Session};
use curate_sync::view::{EMPTY_LIST_HINT, EMPTY_LIST_TITLE};
use curate_sync::{
    CardView, EditSession, FileUpload, FormBuilder, FormInput, FormSchema, FormSubmission,
    GridSummary, PageView, Paginator, Schema, SubmitOutcome, normalize_document,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResponse};
use crate::state::AppState;

fn parse_type(raw: &str) -> Result<ContentType, ApiError> {
    Ok(raw.parse::<ContentType>().map_err(CurateError::from)?)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyState {
    pub title: &'static str,
    pub hint: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentList {
    pub content_type: ContentType,
    pub label: &'static str,
    pub schema: Schema,
    pub page: PageView<CardView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty: Option<EmptyState>,
}

#[derive(Debug, Serialize)]
pub struct ContentId {
    pub id: String,
}

/// GET /content/summary
pub async fn summary(State(state): State<AppState>) -> ResponseJson<ApiResponse<GridSummary>> {
    ResponseJson(ApiResponse::success(GridSummary::from_items(&state.live.items())))
}

/// GET /content/{type}?page=N
///
/// Out-of-range pages are clamped to the nearest valid one.
pub async fn list(
    State(state): State<AppState>,
    Path(content_type): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<ContentList>>, ApiError> {
    let content_type = parse_type(&content_type)?;
    let items = state.live.items_of(content_type);

    let mut pager = Paginator::new(state.config.page_size);
    pager.go_to(query.page.unwrap_or(1), items.len());

    let schema = state.registry.fields_for(content_type, &items);
    let page = pager.view(&items).map(|item| CardView::from_item(&item));
    let empty = items.is_empty().then_some(EmptyState {
        title: EMPTY_LIST_TITLE,
        hint: EMPTY_LIST_HINT,
    });

    Ok(ResponseJson(ApiResponse::success(ContentList {
        content_type,
        label: content_type.display_label(),
        schema,
        page,
        empty,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    #[serde(default)]
    pub suggest: bool,
}

/// GET /content/{type}/form
pub async fn form(
    State(state): State<AppState>,
    Path(content_type): Path<String>,
    Query(query): Query<FormQuery>,
) -> Result<ResponseJson<ApiResponse<FormSchema>>, ApiError> {
    let content_type = parse_type(&content_type)?;
    let schema = if query.suggest {
        FormBuilder::suggested(state.suggestions.as_ref(), content_type).await?
    } else {
        FormBuilder::from_registry(&state.registry, content_type)
    };
    Ok(ResponseJson(ApiResponse::success(schema)))
}

/// Collect multipart parts into a submission; parts with a filename are files
async fn read_submission(mut multipart: Multipart) -> Result<FormSubmission, ApiError> {
    let mut submission = FormSubmission::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                // an empty file input still sends a part
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                let mut upload = FileUpload::new(filename, bytes);
                if let Some(content_type) = content_type {
                    upload = upload.with_content_type(content_type);
                }
                submission = submission.with_file(name, upload);
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                submission.insert(name, FormInput::Text(text));
            }
        }
    }

    Ok(submission)
}

fn outcome_to_result(outcome: SubmitOutcome) -> Result<String, ApiError> {
    match outcome {
        SubmitOutcome::Created { id } | SubmitOutcome::Updated { id } => Ok(id),
        SubmitOutcome::Invalid(errors) => Err(ApiError::Validation(errors)),
        SubmitOutcome::Busy => Err(ApiError::Conflict(
            "A submission for this form is already in progress".into(),
        )),
        SubmitOutcome::Failed(e) => Err(e.into()),
    }
}

/// POST /content/{type}
pub async fn create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(content_type): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ContentId>>), ApiError> {
    let content_type = parse_type(&content_type)?;
    let submission = read_submission(multipart).await?;

    let form = state.form_session(&session.user.uid, content_type);
    let id = outcome_to_result(form.submit(submission).await)?;

    info!(uid = %session.user.uid, content_type = %content_type, id = %id, "Content created");
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(ContentId { id })),
    ))
}

/// PATCH /content/{type}/{id}
pub async fn update(
    State(state): State<AppState>,
    Path((content_type, id)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<ContentId>>, ApiError> {
    let content_type = parse_type(&content_type)?;
    let doc = state
        .documents
        .get(content_type, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No {content_type} content with id {id}")))?;
    let changes = read_submission(multipart).await?;

    let item = normalize_document(content_type, &doc, Utc::now());
    let edit = EditSession::new(item, state.adapter.clone(), state.notifier.clone());
    let id = outcome_to_result(edit.save(changes).await)?;

    Ok(ResponseJson(ApiResponse::success(ContentId { id })))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub confirm: bool,
}

/// DELETE /content/{type}/{id}?confirm=true
pub async fn delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((content_type, id)): Path<(String, String)>,
    Query(query): Query<DeleteQuery>,
) -> Result<ResponseJson<ApiResponse<ContentId>>, ApiError> {
    let content_type = parse_type(&content_type)?;
    if !query.confirm {
        return Err(ApiError::BadRequest(
            "Deleting content requires confirm=true".into(),
        ));
    }

    state.adapter.delete(content_type, &id).await?;
    info!(uid = %session.user.uid, content_type = %content_type, id = %id, "Content deleted");
    Ok(ResponseJson(ApiResponse::success(ContentId { id })))
}

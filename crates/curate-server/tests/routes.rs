//! Router tests against in-memory backends

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use curate_server::{AppState, Backends, ServerConfig, router};
use curate_storage::InMemoryBlobStore;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const WAIT: Duration = Duration::from_secs(2);
const BOUNDARY: &str = "curate-test-boundary";

async fn setup() -> (AppState, Router) {
    let backends = Backends::in_memory(Arc::new(InMemoryBlobStore::default()));
    let state = AppState::from_backends(ServerConfig::default(), backends)
        .await
        .unwrap();
    let app = router(state.clone());
    (state, app)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart(method: Method, uri: &str, token: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn sign_up(app: &Router) -> String {
    let (status, body) = send(
        app,
        json_post(
            "/auth/sign-up",
            json!({"email": "alice@example.com", "password": "hunter22"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn create_reel(app: &Router, token: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        multipart(
            Method::POST,
            "/content/Reels",
            token,
            &[
                Part::Text("name", name),
                Part::Text("reelsUrl", "https://example.com/r/1"),
                Part::File("thumbnail", "thumb.png", b"\x89PNG fake"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let (_state, app) = setup().await;
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": "ok"}));
}

#[tokio::test]
async fn test_protected_routes_need_a_token() {
    let (_state, app) = setup().await;

    let (status, body) = send(&app, get("/content/summary", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, get("/content/summary", Some("not-a-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/blobs/Reels/1-x.png", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sign_up_sign_in_and_out() {
    let (_state, app) = setup().await;
    let token = sign_up(&app).await;

    let (status, body) = send(&app, get("/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "alice@example.com");

    let (status, _) = send(
        &app,
        json_post(
            "/auth/sign-up",
            json!({"email": "alice@example.com", "password": "another1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        json_post(
            "/auth/sign-in",
            json!({"email": "alice@example.com", "password": "wrong-pass"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let sign_out = Request::builder()
        .method(Method::POST)
        .uri("/auth/sign-out")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, sign_out).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get("/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_then_list_and_fetch_thumbnail() {
    let (state, app) = setup().await;
    let token = sign_up(&app).await;

    let id = create_reel(&app, &token, "Alice").await;
    state
        .live
        .wait_for(WAIT, |items| items.len() == 1)
        .await
        .unwrap();

    let (status, body) = send(&app, get("/content/summary", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["contentType"], "Reels");
    assert_eq!(entries[0]["count"], 1);
    assert_eq!(entries[1]["count"], 0);

    let (status, body) = send(&app, get("/content/reels", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["data"]["page"];
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], id.as_str());
    assert!(body["data"].get("empty").is_none());

    let fields = page["items"][0]["fields"].as_array().unwrap();
    let thumb = fields
        .iter()
        .find(|f| f["name"] == "thumbnailUrl")
        .expect("thumbnail reference on card");
    assert_eq!(thumb["isImage"], true);
    let url = thumb["value"].as_str().unwrap();
    let path = url.strip_prefix("memory://blobs/").unwrap();
    assert!(path.starts_with("Reels/"));
    assert!(path.ends_with("-thumb.png"));

    let res = app
        .clone()
        .oneshot(get(&format!("/blobs/{path}"), Some(&token)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"\x89PNG fake");
}

#[tokio::test]
async fn test_empty_list_and_page_clamp() {
    let (state, app) = setup().await;
    let token = sign_up(&app).await;

    let (status, body) = send(&app, get("/content/Greetings", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["page"]["total"], 0);
    assert_eq!(
        body["data"]["empty"]["title"],
        "No content in this category yet"
    );

    for n in 0..7 {
        create_reel(&app, &token, &format!("Reel {n}")).await;
    }
    state
        .live
        .wait_for(WAIT, |items| items.len() == 7)
        .await
        .unwrap();

    let (_, body) = send(&app, get("/content/Reels?page=9", Some(&token))).await;
    let page = &body["data"]["page"];
    assert_eq!(page["page"], 2);
    assert_eq!(page["pageCount"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["hasNext"], false);
    assert_eq!(page["hasPrevious"], true);
}

#[tokio::test]
async fn test_unknown_type_is_bad_request() {
    let (_state, app) = setup().await;
    let token = sign_up(&app).await;
    let (status, _) = send(&app, get("/content/Podcasts", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_form_schema_and_suggestions() {
    let (_state, app) = setup().await;
    let token = sign_up(&app).await;

    let (status, body) = send(&app, get("/content/Reels/form", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["name", "reelsUrl", "thumbnail"]);

    let (status, body) = send(
        &app,
        get("/content/Greetings/form?suggest=true", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["contentType"], "Greetings");
    assert!(!body["data"]["fields"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_submission_reports_field_errors() {
    let (state, app) = setup().await;
    let token = sign_up(&app).await;

    let (status, body) = send(
        &app,
        multipart(
            Method::POST,
            "/content/Reels",
            &token,
            &[
                Part::Text("name", "Alice"),
                Part::Text("reelsUrl", "not a url"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);

    let errors = body["data"].as_array().unwrap();
    let fields: Vec<&str> = errors.iter().map(|e| e["field"].as_str().unwrap()).collect();
    assert!(fields.contains(&"reelsUrl"));
    assert!(fields.contains(&"thumbnail"));
    assert!(!fields.contains(&"name"));

    assert!(state.live.items().is_empty());
}

#[tokio::test]
async fn test_update_in_place() {
    let (state, app) = setup().await;
    let token = sign_up(&app).await;
    let id = create_reel(&app, &token, "Alice").await;
    state
        .live
        .wait_for(WAIT, |items| items.len() == 1)
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        multipart(
            Method::PATCH,
            &format!("/content/Reels/{id}"),
            &token,
            &[Part::Text("name", "Alice B")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["id"], id.as_str());

    let items = state
        .live
        .wait_for(WAIT, |items| {
            items
                .first()
                .and_then(|item| item.data.get("name"))
                .is_some_and(|v| v.as_str() == Some("Alice B"))
        })
        .await
        .unwrap();
    assert_eq!(items.len(), 1);

    let (status, _) = send(
        &app,
        multipart(
            Method::PATCH,
            "/content/Reels/missing",
            &token,
            &[Part::Text("name", "x")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_needs_confirmation() {
    let (state, app) = setup().await;
    let token = sign_up(&app).await;
    let id = create_reel(&app, &token, "Alice").await;
    state
        .live
        .wait_for(WAIT, |items| items.len() == 1)
        .await
        .unwrap();

    let delete = |uri: String| {
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, delete(format!("/content/Reels/{id}"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.live.items().len(), 1);

    let (status, _) = send(&app, delete(format!("/content/Reels/{id}?confirm=true"))).await;
    assert_eq!(status, StatusCode::OK);
    state
        .live
        .wait_for(WAIT, |items| items.is_empty())
        .await
        .unwrap();
}

//! End-to-end tests for the filter HTTP API.
//!
//! Each test builds the full router over a private in-memory SQLite pool and
//! drives it with `tower::ServiceExt::oneshot`, no network server involved.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use filterdesk::config::{AccessConfig, Config, DatabaseConfig, EditConfig, ServerConfig};
use filterdesk::server::create_app_with_pool;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn test_config(creators: &[&str], editors: &[&str]) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
        },
        edit: EditConfig {
            session_lifetime_secs: 900,
            ..EditConfig::default()
        },
        access: AccessConfig {
            creators: creators.iter().map(|s| s.to_string()).collect(),
            editors: editors.iter().map(|s| s.to_string()).collect(),
        },
    }
}

async fn test_app_with(config: Config) -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let (router, _state) = create_app_with_pool(config, pool).await.unwrap();
    router
}

async fn test_app() -> Router {
    test_app_with(test_config(&["*"], &["*"])).await
}

/// A user's session credentials
struct Client {
    session_id: String,
    token: String,
    user_id: String,
}

async fn open_session(app: &Router, user_id: &str) -> Client {
    let (status, body) = send(app, "POST", "/api/session", None, None).await;
    assert_eq!(status, StatusCode::OK);
    Client {
        session_id: body["session_id"].as_str().unwrap().to_string(),
        token: body["token"].as_str().unwrap().to_string(),
        user_id: user_id.to_string(),
    }
}

/// Sends a request, optionally as `client` and with a JSON body; returns (status, json).
async fn send(
    app: &Router,
    method: &str,
    path: &str,
    client: Option<&Client>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(client) = client {
        builder = builder
            .header("x-session-id", &client.session_id)
            .header("x-user-id", &client.user_id)
            .header("x-csrf-token", &client.token);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(json!(null));
    (status, json)
}

/// Opens a blank form and saves it with `task`; returns the response.
async fn create_filter(app: &Router, client: &Client, task: &str, form: Value, items: Value) -> (StatusCode, Value) {
    let (status, _) = send(app, "POST", "/api/filters/add", Some(client), None).await;
    assert_eq!(status, StatusCode::OK);
    send(
        app,
        "POST",
        &format!("/api/filters/save?task={}", task),
        Some(client),
        Some(json!({ "jform": form, "t": items })),
    )
    .await
}

// ---------------------------------------------------------------------------
// Health and sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_responds() {
    let app = test_app().await;
    let (status, _) = send(&app, "GET", "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn form_actions_require_session_headers() {
    let app = test_app().await;
    let (status, _) = send(&app, "POST", "/api/filters/add", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Save workflow over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn apply_then_save_and_close() {
    let app = test_app().await;
    let alice = open_session(&app, "1").await;

    let (status, body) = create_filter(
        &app,
        &alice,
        "apply",
        json!({ "title": "Recent news" }),
        json!([3, 3, 0, 5, 0]),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["outcome"], "saved");
    let id = body["record_id"].as_i64().unwrap();
    assert_eq!(
        body["redirect"],
        json!(format!("index.php?option=com_finder&view=filter&layout=edit&filter_id={}", id))
    );
    assert_eq!(body["messages"][0]["kind"], "message");
    assert_eq!(body["messages"][0]["text"], "Filter saved.");

    let (_, stored) = send(&app, "GET", &format!("/api/filters/{}", id), None, None).await;
    assert_eq!(stored["data"], json!([3, 5]));
    assert_eq!(stored["map_count"], 2);
    assert_eq!(stored["alias"], "recent-news");
    assert_eq!(stored["checked_out"], "1");

    let (_, active) = send(&app, "GET", "/api/filters/active", None, None).await;
    assert_eq!(active["filters"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/filters/save?task=save&filter_id={}", id),
        Some(&alice),
        Some(json!({ "jform": { "title": "Recent news", "state": 0 }, "t": [5] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["redirect"], "index.php?option=com_finder&view=filters");

    let (_, stored) = send(&app, "GET", &format!("/api/filters/{}", id), None, None).await;
    assert_eq!(stored["checked_out"], Value::Null);
    assert_eq!(stored["data"], json!([5]));

    // Unpublished filters leave the registry
    let (_, active) = send(&app, "GET", "/api/filters/active", None, None).await;
    assert!(active["filters"].as_array().unwrap().is_empty());

    // The permit was released with the close
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/filters/save?filter_id={}", id),
        Some(&alice),
        Some(json!({ "jform": { "title": "Again" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "edit_not_held");
}

#[tokio::test]
async fn unknown_task_saves_and_closes() {
    let app = test_app().await;
    let alice = open_session(&app, "1").await;

    let (status, body) = create_filter(&app, &alice, "publish", json!({ "title": "x" }), json!([])).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["outcome"], "saved");
    assert_eq!(body["redirect"], "index.php?option=com_finder&view=filters");

    let (_, stored) = send(&app, "GET", &format!("/api/filters/{}", body["record_id"]), None, None).await;
    assert_eq!(stored["checked_out"], Value::Null);
}

#[tokio::test]
async fn save_without_token_is_forbidden() {
    let app = test_app().await;
    let alice = open_session(&app, "1").await;
    send(&app, "POST", "/api/filters/add", Some(&alice), None).await;

    let forged = Client {
        token: "forged".into(),
        session_id: alice.session_id.clone(),
        user_id: alice.user_id.clone(),
    };
    let (status, body) = send(
        &app,
        "POST",
        "/api/filters/save",
        Some(&forged),
        Some(json!({ "jform": { "title": "Nope" } })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["outcome"], "rejected");
    assert_eq!(body["error"]["kind"], "forbidden");
    assert_eq!(body["redirect"], Value::Null);
}

#[tokio::test]
async fn malformed_form_is_a_client_error() {
    let app = test_app().await;
    let alice = open_session(&app, "1").await;

    for body in [json!({ "t": [1] }), json!({ "jform": "title=x" }), json!({ "jform": null })] {
        let (status, _) = send(&app, "POST", "/api/filters/save", Some(&alice), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (_, list) = send(&app, "GET", "/api/filters", None, None).await;
    assert!(list["filters"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn users_outside_creator_list_cannot_save_new_filters() {
    let app = test_app_with(test_config(&["7"], &["*"])).await;
    let bob = open_session(&app, "2").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/filters/save?task=apply",
        Some(&bob),
        Some(json!({ "jform": { "title": "Blocked" } })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["messages"][0]["text"], "Save not permitted.");
    assert_eq!(body["redirect"], "index.php?option=com_finder&view=filters");
}

#[tokio::test]
async fn validation_failure_keeps_draft_for_the_form() {
    let app = test_app().await;
    let alice = open_session(&app, "1").await;

    let submitted = json!({ "title": "", "notes": "typed" });
    let (status, body) = create_filter(&app, &alice, "apply", submitted.clone(), json!([1])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "validation_failed");
    assert_eq!(body["error"]["detail"], json!(["Field required: Title"]));
    assert_eq!(body["redirect"], "index.php?option=com_finder&view=filter&layout=edit");

    let (status, form) = send(&app, "GET", "/api/filters/form", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["jform"], submitted);
}

#[tokio::test]
async fn save_as_copy_creates_renamed_record() {
    let app = test_app().await;
    let alice = open_session(&app, "1").await;

    let (_, body) = create_filter(&app, &alice, "apply", json!({ "title": "News" }), json!([2])).await;
    let original = body["record_id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/filters/save?task=save2copy&filter_id={}", original),
        Some(&alice),
        Some(json!({ "jform": { "title": "News", "alias": "news" }, "t": [2, 4] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let copy = body["record_id"].as_i64().unwrap();
    assert_ne!(copy, original);

    let (_, stored) = send(&app, "GET", &format!("/api/filters/{}", copy), None, None).await;
    assert_eq!(stored["title"], "News (2)");
    assert_eq!(stored["alias"], "news-2");
    assert_eq!(stored["data"], json!([2, 4]));

    let (_, stored) = send(&app, "GET", &format!("/api/filters/{}", original), None, None).await;
    assert_eq!(stored["checked_out"], Value::Null);
    assert_eq!(stored["data"], json!([2]));
}

// ---------------------------------------------------------------------------
// Locks between users
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_editor_is_locked_out() {
    let app = test_app().await;
    let alice = open_session(&app, "1").await;
    let bob = open_session(&app, "2").await;

    let (_, body) = create_filter(&app, &alice, "apply", json!({ "title": "Shared" }), json!([])).await;
    let id = body["record_id"].as_i64().unwrap();

    let (status, body) = send(&app, "POST", &format!("/api/filters/{}/edit", id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "lock_conflict");

    let (status, _) = send(&app, "DELETE", &format!("/api/filters/{}", id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "POST", &format!("/api/filters/{}/cancel", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "accepted");

    let (status, _) = send(&app, "POST", &format!("/api/filters/{}/edit", id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, form) = send(&app, "GET", &format!("/api/filters/form?filter_id={}", id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["jform"]["title"], "Shared");
}

#[tokio::test]
async fn delete_removes_filter_and_registry_entry() {
    let app = test_app().await;
    let alice = open_session(&app, "1").await;

    let (_, body) = create_filter(&app, &alice, "save", json!({ "title": "Gone soon" }), json!([])).await;
    let id = body["record_id"].as_i64().unwrap();

    let (status, _) = send(&app, "DELETE", &format!("/api/filters/{}", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/api/filters/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, active) = send(&app, "GET", "/api/filters/active", None, None).await;
    assert!(active["filters"].as_array().unwrap().is_empty());
}

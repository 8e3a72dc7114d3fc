/// Filter REST API endpoints
///
/// Read endpoints go straight to storage or the published-filter registry.
/// Form actions (add, edit, save, cancel) go through the edit controller and
/// answer with the controller's outcome, redirect and messages.

use crate::{
    controller::{
        ActionReport, Client, FilterController, Message, RequestContext, SaveError, SaveOutcome, SaveReport,
        SaveRequest, Task, TokenValidator,
    },
    filter::{Filter, FilterRegistry, FilterStorage},
    session::SessionStore,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Edit controller wired to storage, sessions and access policy
    pub controller: FilterController,
    /// Filter storage for plain reads and deletes
    pub storage: FilterStorage,
    /// Published-filter registry
    pub registry: Arc<FilterRegistry>,
    /// Session store (tokens, permits, drafts)
    pub sessions: Arc<SessionStore>,
}

/// Query string of the save action
#[derive(Debug, Deserialize)]
pub struct SaveQuery {
    pub task: Option<String>,
    pub filter_id: Option<i64>,
}

/// Query string of the form endpoint
#[derive(Debug, Deserialize)]
pub struct FormQuery {
    pub filter_id: Option<i64>,
}

/// Submitted edit form
#[derive(Debug, Deserialize)]
pub struct SaveBody {
    /// Form fields; a missing form is rejected by the handler
    #[serde(default)]
    pub jform: Value,
    /// Selected taxonomy node ids
    #[serde(default)]
    pub t: Vec<Value>,
    /// Anti-forgery token, when not sent as a header
    pub token: Option<String>,
}

/// Response body for every form action
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SaveError>,
    pub redirect: Option<String>,
    pub messages: Vec<Message>,
}

/// Create filter routes
pub fn create_filter_routes() -> Router<AppState> {
    Router::new()
        .route("/api/filters", get(list_filters))
        .route("/api/filters/active", get(list_active_filters))
        .route("/api/filters/form", get(form_data))
        .route("/api/filters/add", post(add_filter))
        .route("/api/filters/save", post(save_filter))
        .route("/api/filters/{id}", get(get_filter).delete(delete_filter))
        .route("/api/filters/{id}/edit", post(edit_filter))
        .route("/api/filters/{id}/cancel", post(cancel_filter))
}

/// Build the request context from headers
///
/// `x-session-id` and `x-user-id` are required; `x-csrf-token` and
/// `x-client` are optional.
fn request_context(headers: &HeaderMap, body_token: Option<String>) -> Result<RequestContext, StatusCode> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);

    let session_id = header("x-session-id").ok_or(StatusCode::UNAUTHORIZED)?;
    let user_id = header("x-user-id").filter(|u| !u.is_empty()).ok_or(StatusCode::UNAUTHORIZED)?;
    let client = match header("x-client") {
        Some(raw) => raw.parse::<Client>().map_err(|e| {
            tracing::warn!("Rejected request: {}", e);
            StatusCode::BAD_REQUEST
        })?,
        None => Client::default(),
    };

    Ok(RequestContext {
        session_id,
        user_id,
        token: header("x-csrf-token").or(body_token),
        client,
    })
}

fn error_status(error: &SaveError) -> StatusCode {
    match error {
        SaveError::Forbidden => StatusCode::FORBIDDEN,
        SaveError::EditNotHeld(_) => StatusCode::BAD_REQUEST,
        SaveError::LockConflict(_) => StatusCode::CONFLICT,
        SaveError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SaveError::PersistenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn save_response(report: SaveReport) -> (StatusCode, Json<ActionResponse>) {
    let (status, outcome, record_id, error) = match report.outcome {
        SaveOutcome::Saved(id) => (StatusCode::OK, "saved", Some(id), None),
        SaveOutcome::Rejected(e) => (error_status(&e), "rejected", None, Some(e)),
        SaveOutcome::Conflict(e) => (error_status(&e), "conflict", None, Some(e)),
    };

    (
        status,
        Json(ActionResponse {
            outcome,
            record_id,
            error,
            redirect: report.redirect_url,
            messages: report.messages,
        }),
    )
}

fn action_response(report: ActionReport, record_id: Option<i64>) -> (StatusCode, Json<ActionResponse>) {
    let status = report.error.as_ref().map(error_status).unwrap_or(StatusCode::OK);
    (
        status,
        Json(ActionResponse {
            outcome: if report.accepted { "accepted" } else { "rejected" },
            record_id,
            error: report.error,
            redirect: report.redirect_url,
            messages: report.messages,
        }),
    )
}

/// List all filters
///
/// GET /api/filters
async fn list_filters(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match state.storage.list_filters().await {
        Ok(filters) => Ok(Json(json!({ "filters": filters }))),
        Err(e) => {
            tracing::error!("Failed to list filters: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// List published filters from the registry
///
/// GET /api/filters/active
async fn list_active_filters(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "filters": state.registry.published() }))
}

/// Get a specific filter by ID
///
/// GET /api/filters/{id}
async fn get_filter(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Filter>, StatusCode> {
    match state.storage.get_filter(id).await {
        Ok(Some(filter)) => Ok(Json(filter)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get filter {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Data for the edit form (draft or stored record)
///
/// GET /api/filters/form?filter_id=N
async fn form_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<FormQuery>,
) -> Result<Json<Value>, StatusCode> {
    let ctx = request_context(&headers, None)?;
    let id = query.filter_id.unwrap_or(0);

    state
        .controller
        .load_form_data(&ctx, id)
        .await
        .map(|data| Json(json!({ "filter_id": id, "jform": data })))
        .map_err(|e| {
            tracing::warn!("Form data for filter {} refused: {}", id, e);
            error_status(&e)
        })
}

/// Open a blank form
///
/// POST /api/filters/add
async fn add_filter(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<ActionResponse>), StatusCode> {
    let ctx = request_context(&headers, None)?;
    Ok(action_response(state.controller.add(&ctx).await, None))
}

/// Check out a filter and open it for editing
///
/// POST /api/filters/{id}/edit
async fn edit_filter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ActionResponse>), StatusCode> {
    let ctx = request_context(&headers, None)?;
    Ok(action_response(state.controller.edit(&ctx, id).await, Some(id)))
}

/// Leave the form, releasing lock and permit
///
/// POST /api/filters/{id}/cancel
async fn cancel_filter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ActionResponse>), StatusCode> {
    let ctx = request_context(&headers, None)?;
    Ok(action_response(state.controller.cancel(&ctx, id).await, Some(id)))
}

/// Save a submitted form
///
/// POST /api/filters/save?task=apply&filter_id=3
/// Body: { "jform": { "title": "...", ... }, "t": [3, 5] }
async fn save_filter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SaveQuery>,
    Json(body): Json<SaveBody>,
) -> Result<(StatusCode, Json<ActionResponse>), StatusCode> {
    let ctx = request_context(&headers, body.token)?;

    if !body.jform.is_object() {
        tracing::warn!("Rejected save request: jform must be an object");
        return Err(StatusCode::BAD_REQUEST);
    }

    // Anything that isn't a known continuation saves and closes
    let task = match query.task.as_deref() {
        None | Some("") => Task::default(),
        Some(raw) => raw.parse::<Task>().unwrap_or_else(|e| {
            tracing::debug!("{}, saving and closing", e);
            Task::default()
        }),
    };

    let request = SaveRequest {
        ctx,
        task,
        record_id: query.filter_id.unwrap_or(0),
        form: body.jform,
        selected_items: body.t,
        key: None,
        url_var: None,
    };

    Ok(save_response(state.controller.save(&request).await))
}

/// Delete a filter
///
/// DELETE /api/filters/{id}
async fn delete_filter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, StatusCode> {
    let ctx = request_context(&headers, None)?;
    if !state.sessions.check_token(&ctx.session_id, ctx.token.as_deref()).await {
        return Err(StatusCode::FORBIDDEN);
    }
    if !state.controller.allow_delete(&ctx.user_id, id) {
        return Err(StatusCode::FORBIDDEN);
    }

    match state.storage.get_filter(id).await {
        Ok(Some(filter)) if filter.is_checked_out_by_other(&ctx.user_id) => return Err(StatusCode::CONFLICT),
        Ok(Some(_)) => {}
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to load filter {} for delete: {}", id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    match state.storage.delete_filter(id).await {
        Ok(true) => {
            if let Err(e) = state.registry.reload_filter(id).await {
                tracing::error!("Failed to evict filter {} from registry: {}", id, e);
            }
            tracing::info!("Deleted filter {}", id);
            Ok(Json(json!({ "message": "Filter deleted successfully" })))
        }
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to delete filter {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

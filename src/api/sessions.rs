/// Session endpoints
///
/// A client opens a session before using the edit forms and sends the issued
/// id and anti-forgery token with every form action.

use crate::api::filters::AppState;
use crate::session::IssuedSession;
use axum::{extract::State, response::Json, routing::post, Router};

/// Create session routes
pub fn create_session_routes() -> Router<AppState> {
    Router::new().route("/api/session", post(open_session))
}

/// Open a session
///
/// POST /api/session
/// Returns: { "session_id": "...", "token": "..." }
async fn open_session(State(state): State<AppState>) -> Json<IssuedSession> {
    let issued = state.sessions.create_session().await;
    tracing::info!("Opened edit session {}", issued.session_id);
    Json(issued)
}

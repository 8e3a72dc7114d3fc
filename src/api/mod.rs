/// HTTP API Layer
///
/// REST endpoints for the filter admin:
/// - Session and anti-forgery token issuance
/// - Filter reads (list, single, published)
/// - Edit form actions (add, edit, save, cancel, form data) and delete

// Filter endpoints and shared application state
pub mod filters;

// Session endpoints
pub mod sessions;

pub use filters::{create_filter_routes, AppState};
pub use sessions::create_session_routes;

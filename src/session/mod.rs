/// Edit session management
///
/// Anti-forgery tokens, edit permits and draft caching for the admin forms.

pub mod store;

pub use store::{IssuedSession, SessionStore};

/// filterdesk: admin backend for search filters
///
/// Serves the filter edit form workflow: check-out locking, edit permits held
/// per session, validation with draft redisplay, and redirect-driven
/// continuation after each save.

// Core configuration and setup
pub mod config;

// Filter records: types, form validation, SQLite storage, published registry
pub mod filter;

// Edit sessions: anti-forgery tokens, edit permits, drafts
pub mod session;

// User-facing message catalogue
pub mod language;

// Edit controller: save workflow and add/edit/cancel actions
pub mod controller;

// HTTP API layer
pub mod api;

// Server setup and initialization
pub mod server;

pub use controller::{FilterController, SaveOutcome, SaveRequest, Task};
pub use filter::{Filter, FilterStorage};
pub use server::start_server;

/// Filter Management Layer
///
/// Search filter records and everything that touches them directly:
/// - Type definitions (Filter, ValidatedFilter) and selection sanitizing
/// - Edit form schema and validation
/// - SQLite persistence with sqlx, including check-out locks
/// - Lock-free registry of published filters using ArcSwap

pub mod types;

pub mod form;

pub mod storage;

pub mod registry;

pub use form::{FilterForm, FormError, ValidationError};
pub use registry::FilterRegistry;
pub use storage::{FilterStorage, StoreError};
pub use types::{sanitize_selected_items, Filter, FormData, ValidatedFilter};

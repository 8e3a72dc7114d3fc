use async_trait::async_trait;
use serde_json::Value;

use crate::filter::{Filter, FilterForm, FormError, StoreError, ValidatedFilter, ValidationError};

/// The record store the edit controller persists through.
///
/// Besides CRUD it owns the form schema and validation, and the check-out
/// lock columns. Implementations must be `Send + Sync` to live in axum state.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Primary key field of the record table
    fn key_name(&self) -> &str {
        "filter_id"
    }

    /// Whether records carry a check-out lock at all
    fn tracks_checkout(&self) -> bool {
        true
    }

    /// Build the form instance for a payload.
    fn fetch_schema(&self, payload: &Value) -> Result<FilterForm, FormError>;

    /// Validate a payload against a form built by `fetch_schema`.
    fn validate(&self, form: &FilterForm, payload: &Value) -> Result<ValidatedFilter, Vec<ValidationError>>;

    async fn load(&self, id: i64) -> Result<Option<Filter>, StoreError>;

    /// Persist the payload; returns the record id (newly assigned for id 0).
    async fn save(&self, payload: &ValidatedFilter, user_id: &str) -> Result<i64, StoreError>;

    async fn checkin(&self, id: i64, user_id: &str) -> Result<(), StoreError>;

    async fn checkout(&self, id: i64, user_id: &str) -> Result<(), StoreError>;

    async fn alias_exists(&self, alias: &str, except_id: i64) -> Result<bool, StoreError>;
}

/// Anti-forgery token check.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn check_token(&self, session_id: &str, token: Option<&str>) -> bool;
}

/// Per-session edit permits and draft cache.
///
/// A permit says "this session opened record `id` through the edit form".
/// Record id 0 (a new record) is always admitted.
#[async_trait]
pub trait EditSessions: Send + Sync {
    async fn hold(&self, session_id: &str, context: &str, id: i64);

    async fn release(&self, session_id: &str, context: &str, id: i64);

    /// Refresh a held permit; false when it isn't held.
    async fn renew(&self, session_id: &str, context: &str, id: i64) -> bool;

    async fn is_held(&self, session_id: &str, context: &str, id: i64) -> bool;

    async fn set_draft(&self, session_id: &str, context: &str, data: Value);

    async fn draft(&self, session_id: &str, context: &str) -> Option<Value>;

    async fn clear_draft(&self, session_id: &str, context: &str);
}

/// Write permissions for filter records.
pub trait AccessPolicy: Send + Sync {
    fn can_create(&self, user_id: &str) -> bool;

    fn can_edit(&self, user_id: &str, record_id: i64) -> bool;

    /// Create permission for new records (key 0 or absent), edit otherwise.
    fn can_save(&self, data: &Value, key: &str, user_id: &str) -> bool {
        let id = data.get(key).and_then(Value::as_i64).unwrap_or(0);
        if id == 0 {
            self.can_create(user_id)
        } else {
            self.can_edit(user_id, id)
        }
    }
}

/// Called after every successful save with the assigned id and stored payload.
#[async_trait]
pub trait PostSaveHook: Send + Sync {
    async fn after_save(&self, record_id: i64, saved: &ValidatedFilter);
}

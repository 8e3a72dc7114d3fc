/// SQLite persistence layer for filter storage
///
/// Handles filter CRUD and the check-out lock columns. The taxonomy selection
/// and params are stored as JSON text next to indexed lookup columns.

use crate::controller::traits::RecordStore;
use crate::filter::form::{slugify, FilterForm, FormError, ValidationError};
use crate::filter::types::{Filter, ValidatedFilter};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Row};

/// Errors returned by the filter store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("filter {0} not found")]
    NotFound(i64),

    #[error("filter {id} is checked out by user {holder}")]
    CheckedOut { id: i64, holder: String },

    #[error("another filter already uses the alias '{0}'")]
    DuplicateAlias(String),

    #[error("filter must have a title")]
    MissingTitle,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// SQLite-based filter storage manager
#[derive(Debug, Clone)]
pub struct FilterStorage {
    /// SQLite connection pool for the filter database
    pool: SqlitePool,
}

impl FilterStorage {
    /// Create new storage instance with database connection
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the filter storage schema
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS finder_filters (
                filter_id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                alias TEXT NOT NULL,
                state INTEGER NOT NULL DEFAULT 1,
                access INTEGER NOT NULL DEFAULT 1,
                language TEXT NOT NULL DEFAULT '*',
                created TEXT NOT NULL,
                created_by TEXT NOT NULL,
                modified TEXT NOT NULL,
                modified_by TEXT NOT NULL,
                checked_out TEXT,
                checked_out_time TEXT,
                map_count INTEGER NOT NULL DEFAULT 0,
                data TEXT NOT NULL DEFAULT '[]',
                params TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_finder_filters_alias ON finder_filters(alias)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Retrieve a filter by ID
    pub async fn get_filter(&self, id: i64) -> StoreResult<Option<Filter>> {
        let row = sqlx::query("SELECT * FROM finder_filters WHERE filter_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| filter_from_row(&r)).transpose()
    }

    /// List all filters, most recently modified first
    pub async fn list_filters(&self) -> StoreResult<Vec<Filter>> {
        let rows = sqlx::query("SELECT * FROM finder_filters ORDER BY modified DESC, filter_id DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(filter_from_row).collect()
    }

    /// Load all published filters
    pub async fn list_published(&self) -> StoreResult<Vec<Filter>> {
        let rows = sqlx::query("SELECT * FROM finder_filters WHERE state = 1")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(filter_from_row).collect()
    }

    /// Whether an alias is taken by a filter other than `except_id`
    pub async fn alias_exists(&self, alias: &str, except_id: i64) -> StoreResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM finder_filters WHERE alias = ? AND filter_id != ?")
            .bind(alias)
            .bind(except_id)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n > 0)
    }

    /// Insert a new filter or update an existing one on behalf of `user_id`
    ///
    /// Returns the filter id (freshly assigned for new rows). Updates are
    /// refused while another user holds the check-out lock. An empty alias is
    /// derived from the title, falling back to the current timestamp.
    pub async fn save_filter(&self, filter: &ValidatedFilter, user_id: &str) -> StoreResult<i64> {
        if filter.title.trim().is_empty() {
            return Err(StoreError::MissingTitle);
        }

        let now = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let mut alias = if filter.alias.is_empty() { slugify(&filter.title) } else { filter.alias.clone() };
        if alias.is_empty() {
            alias = Utc::now().format("%Y-%m-%d-%H-%M-%S").to_string();
        }

        if self.alias_exists(&alias, filter.filter_id).await? {
            return Err(StoreError::DuplicateAlias(alias));
        }

        let data_json = serde_json::to_string(&filter.data)?;
        let params_json = serde_json::to_string(&filter.params)?;
        let map_count = filter.data.len() as i64;

        if filter.is_new() {
            let result = sqlx::query(
                r#"
                INSERT INTO finder_filters
                    (title, alias, state, access, language, created, created_by,
                     modified, modified_by, map_count, data, params)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&filter.title)
            .bind(&alias)
            .bind(filter.state)
            .bind(filter.access)
            .bind(&filter.language)
            .bind(&now)
            .bind(user_id)
            .bind(&now)
            .bind(user_id)
            .bind(map_count)
            .bind(&data_json)
            .bind(&params_json)
            .execute(&self.pool)
            .await?;

            let id = result.last_insert_rowid();
            tracing::debug!("Inserted filter {} ({})", id, alias);
            return Ok(id);
        }

        let existing = self
            .get_filter(filter.filter_id)
            .await?
            .ok_or(StoreError::NotFound(filter.filter_id))?;
        if let Some(holder) = existing.checked_out.as_deref().filter(|h| *h != user_id) {
            return Err(StoreError::CheckedOut { id: existing.filter_id, holder: holder.to_string() });
        }

        sqlx::query(
            r#"
            UPDATE finder_filters SET
                title = ?, alias = ?, state = ?, access = ?, language = ?,
                modified = ?, modified_by = ?, map_count = ?, data = ?, params = ?
            WHERE filter_id = ?
            "#,
        )
        .bind(&filter.title)
        .bind(&alias)
        .bind(filter.state)
        .bind(filter.access)
        .bind(&filter.language)
        .bind(&now)
        .bind(user_id)
        .bind(map_count)
        .bind(&data_json)
        .bind(&params_json)
        .bind(filter.filter_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Updated filter {} ({})", filter.filter_id, alias);
        Ok(filter.filter_id)
    }

    /// Release the edit lock held by `user_id`
    ///
    /// Id 0 (a record that was never stored) is a no-op. Releasing a lock held
    /// by someone else fails; releasing an unlocked row succeeds.
    pub async fn checkin(&self, id: i64, user_id: &str) -> StoreResult<()> {
        if id == 0 {
            return Ok(());
        }

        let filter = self.get_filter(id).await?.ok_or(StoreError::NotFound(id))?;
        if let Some(holder) = filter.checked_out.as_deref().filter(|h| *h != user_id) {
            return Err(StoreError::CheckedOut { id, holder: holder.to_string() });
        }

        sqlx::query("UPDATE finder_filters SET checked_out = NULL, checked_out_time = NULL WHERE filter_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Take the edit lock for `user_id`
    ///
    /// Re-taking a lock already held by the same user refreshes its timestamp.
    pub async fn checkout(&self, id: i64, user_id: &str) -> StoreResult<()> {
        if id == 0 {
            return Ok(());
        }

        let now = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let result = sqlx::query(
            r#"
            UPDATE finder_filters SET checked_out = ?, checked_out_time = ?
            WHERE filter_id = ? AND (checked_out IS NULL OR checked_out = ?)
            "#,
        )
        .bind(user_id)
        .bind(&now)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.get_filter(id).await? {
            None => Err(StoreError::NotFound(id)),
            Some(filter) => Err(StoreError::CheckedOut {
                id,
                holder: filter.checked_out.unwrap_or_default(),
            }),
        }
    }

    /// Delete a filter by ID
    pub async fn delete_filter(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM finder_filters WHERE filter_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RecordStore for FilterStorage {
    fn fetch_schema(&self, payload: &Value) -> Result<FilterForm, FormError> {
        FilterForm::load(payload)
    }

    fn validate(&self, form: &FilterForm, payload: &Value) -> Result<ValidatedFilter, Vec<ValidationError>> {
        form.validate(payload)
    }

    async fn load(&self, id: i64) -> StoreResult<Option<Filter>> {
        self.get_filter(id).await
    }

    async fn save(&self, payload: &ValidatedFilter, user_id: &str) -> StoreResult<i64> {
        self.save_filter(payload, user_id).await
    }

    async fn checkin(&self, id: i64, user_id: &str) -> StoreResult<()> {
        FilterStorage::checkin(self, id, user_id).await
    }

    async fn checkout(&self, id: i64, user_id: &str) -> StoreResult<()> {
        FilterStorage::checkout(self, id, user_id).await
    }

    async fn alias_exists(&self, alias: &str, except_id: i64) -> StoreResult<bool> {
        FilterStorage::alias_exists(self, alias, except_id).await
    }
}

fn filter_from_row(row: &SqliteRow) -> StoreResult<Filter> {
    let data_json: String = row.get("data");
    let params_json: String = row.get("params");

    Ok(Filter {
        filter_id: row.get("filter_id"),
        title: row.get("title"),
        alias: row.get("alias"),
        state: row.get("state"),
        access: row.get("access"),
        language: row.get("language"),
        created: row.get("created"),
        created_by: row.get("created_by"),
        modified: row.get("modified"),
        modified_by: row.get("modified_by"),
        checked_out: row.get("checked_out"),
        checked_out_time: row.get("checked_out_time"),
        map_count: row.get("map_count"),
        data: serde_json::from_str(&data_json)?,
        params: serde_json::from_str(&params_json)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn storage() -> FilterStorage {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let storage = FilterStorage::new(pool);
        storage.init_schema().await.unwrap();
        storage
    }

    fn payload(id: i64, title: &str) -> ValidatedFilter {
        ValidatedFilter {
            filter_id: id,
            title: title.to_string(),
            alias: String::new(),
            state: 1,
            access: 1,
            language: "*".into(),
            params: json!({}),
            data: vec![3, 5],
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_alias_and_map_count() {
        let storage = storage().await;
        let id = storage.save_filter(&payload(0, "Recent News"), "1").await.unwrap();
        assert!(id > 0);

        let stored = storage.get_filter(id).await.unwrap().unwrap();
        assert_eq!(stored.alias, "recent-news");
        assert_eq!(stored.map_count, 2);
        assert_eq!(stored.data, vec![3, 5]);
        assert_eq!(stored.created_by, "1");
    }

    #[tokio::test]
    async fn duplicate_alias_is_refused() {
        let storage = storage().await;
        storage.save_filter(&payload(0, "Same"), "1").await.unwrap();
        let err = storage.save_filter(&payload(0, "Same"), "1").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateAlias(a) if a == "same"));
    }

    #[tokio::test]
    async fn lock_held_by_other_user_blocks_update_and_checkin() {
        let storage = storage().await;
        let id = storage.save_filter(&payload(0, "Locked"), "1").await.unwrap();
        storage.checkout(id, "1").await.unwrap();

        assert!(matches!(storage.checkout(id, "2").await, Err(StoreError::CheckedOut { .. })));
        assert!(matches!(storage.checkin(id, "2").await, Err(StoreError::CheckedOut { .. })));
        assert!(matches!(
            storage.save_filter(&payload(id, "Locked"), "2").await,
            Err(StoreError::CheckedOut { .. })
        ));

        storage.save_filter(&payload(id, "Locked again"), "1").await.unwrap();
        storage.checkin(id, "1").await.unwrap();
        let stored = storage.get_filter(id).await.unwrap().unwrap();
        assert_eq!(stored.checked_out, None);
        assert_eq!(stored.title, "Locked again");
    }

    #[tokio::test]
    async fn checkin_of_unknown_id_fails_but_zero_is_noop() {
        let storage = storage().await;
        assert!(storage.checkin(0, "1").await.is_ok());
        assert!(matches!(storage.checkin(99, "1").await, Err(StoreError::NotFound(99))));
    }

    #[tokio::test]
    async fn delete_reports_whether_row_existed() {
        let storage = storage().await;
        let id = storage.save_filter(&payload(0, "Gone"), "1").await.unwrap();
        assert!(storage.delete_filter(id).await.unwrap());
        assert!(!storage.delete_filter(id).await.unwrap());
    }
}

/// Hot-reload registry of published filters using ArcSwap
///
/// Search consumers read published filters without touching the database.
/// Each change swaps the whole map, so readers never block on writers.

use crate::controller::traits::PostSaveHook;
use crate::filter::{storage::FilterStorage, types::{Filter, ValidatedFilter}};
use anyhow::Result;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};

/// Lock-free registry of published filters keyed by filter id
#[derive(Debug)]
pub struct FilterRegistry {
    /// Atomic pointer to the filter map
    filters: ArcSwap<HashMap<i64, Filter>>,

    /// Reference to persistent storage for reload operations
    storage: FilterStorage,
}

impl FilterRegistry {
    /// Create new registry instance with storage backend
    pub fn new(storage: FilterStorage) -> Self {
        Self {
            filters: ArcSwap::new(Arc::new(HashMap::new())),
            storage,
        }
    }

    /// Populate the registry with every published filter
    pub async fn init_from_storage(&self) -> Result<()> {
        let published = self.storage.list_published().await?;
        let map: HashMap<i64, Filter> = published.into_iter().map(|f| (f.filter_id, f)).collect();

        self.filters.store(Arc::new(map));

        tracing::info!("Initialized filter registry with {} published filters", self.filters.load().len());

        Ok(())
    }

    /// Reload one filter from storage
    ///
    /// Published filters are inserted or replaced; unpublished or deleted ones
    /// are evicted.
    pub async fn reload_filter(&self, filter_id: i64) -> Result<()> {
        let fresh = self.storage.get_filter(filter_id).await?.filter(Filter::is_published);

        if fresh.is_none() && !self.filters.load().contains_key(&filter_id) {
            return Ok(());
        }

        // rcu retries against the latest map so concurrent reloads don't drop each other
        self.filters.rcu(|current| {
            let mut next = HashMap::clone(current);
            match &fresh {
                Some(filter) => next.insert(filter_id, filter.clone()),
                None => next.remove(&filter_id),
            };
            next
        });

        if fresh.is_some() {
            tracing::debug!("Registry refreshed filter {}", filter_id);
        } else {
            tracing::debug!("Registry evicted filter {}", filter_id);
        }
        Ok(())
    }

    /// Get a published filter by id (lock-free read)
    pub fn get_filter(&self, filter_id: i64) -> Option<Filter> {
        self.filters.load().get(&filter_id).cloned()
    }

    /// All published filters ordered by title
    pub fn published(&self) -> Vec<Filter> {
        let mut filters: Vec<Filter> = self.filters.load().values().cloned().collect();
        filters.sort_by(|a, b| a.title.cmp(&b.title));
        filters
    }
}

/// Keeps the registry in step with saves made through the edit controller
#[async_trait]
impl PostSaveHook for FilterRegistry {
    async fn after_save(&self, record_id: i64, _saved: &ValidatedFilter) {
        if let Err(e) = self.reload_filter(record_id).await {
            tracing::error!("Failed to refresh filter {} in registry: {}", record_id, e);
        }
    }
}

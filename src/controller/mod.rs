/// Filter edit controller
///
/// Drives the admin edit form for filters: opening records for editing
/// (check-out + edit permit), saving submissions, and cancelling. Actions
/// never fail past their own boundary; each one decides a redirect and the
/// messages to show, and reports an outcome.
///
/// Collaborators are injected as trait objects so the same controller runs
/// against SQLite in production and recording fakes in tests.

pub mod traits;

pub mod context;

pub mod navigation;

pub mod access;

// Save workflow (validation, persistence, lock release, continuation)
pub mod save;

// add / edit / cancel / form redisplay
pub mod edit;

use crate::config::EditConfig;
use crate::language::Language;
use std::sync::Arc;

pub use access::ConfigAccessPolicy;
pub use context::{Client, RequestContext, SaveRequest, Task};
pub use edit::ActionReport;
pub use navigation::{Message, MessageKind, Navigator, RedirectTarget};
pub use save::{SaveError, SaveOutcome, SaveReport};
pub use traits::{AccessPolicy, EditSessions, PostSaveHook, RecordStore, TokenValidator};

/// Controller for the filter edit form
#[derive(Clone)]
pub struct FilterController {
    store: Arc<dyn RecordStore>,
    sessions: Arc<dyn EditSessions>,
    tokens: Arc<dyn TokenValidator>,
    access: Arc<dyn AccessPolicy>,
    hooks: Vec<Arc<dyn PostSaveHook>>,
    config: EditConfig,
    language: Language,
}

impl FilterController {
    pub fn new(
        store: Arc<dyn RecordStore>,
        sessions: Arc<dyn EditSessions>,
        tokens: Arc<dyn TokenValidator>,
        access: Arc<dyn AccessPolicy>,
        config: EditConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            tokens,
            access,
            hooks: Vec::new(),
            config,
            language: Language::default(),
        }
    }

    /// Register a hook run after every successful save
    pub fn with_post_save_hook(mut self, hook: Arc<dyn PostSaveHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    /// Whether `user_id` may delete record `id`
    pub fn allow_delete(&self, user_id: &str, id: i64) -> bool {
        self.access.can_edit(user_id, id)
    }

    fn context_key(&self) -> String {
        self.config.context_key()
    }
}

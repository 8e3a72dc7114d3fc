/// Filter save workflow
///
/// Checks run in a fixed order and the first failure ends the request:
/// token, edit permit, (copy: release the original's lock), access, form
/// construction, validation, persistence, lock release. Success picks the
/// continuation (keep editing, blank form, or back to the list) and runs the
/// post-save hooks.
///
/// Lock and draft writes are not transactional with the store write. If the
/// lock release after a successful save fails, the record stays saved and
/// locked; that is reported, not rolled back.

use crate::controller::context::{Client, SaveRequest, Task};
use crate::controller::navigation::{Message, MessageKind, Navigator, RedirectTarget};
use crate::controller::FilterController;
use crate::filter::form::slugify;
use crate::filter::sanitize_selected_items;
use serde::Serialize;
use serde_json::{Map, Value};

/// At most this many validation messages reach the user
const MAX_VALIDATION_MESSAGES: usize = 3;

/// Why a save did not go through
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SaveError {
    /// Bad anti-forgery token or missing write permission
    #[error("forbidden")]
    Forbidden,

    /// The session never opened this record through the edit form
    #[error("record {0} is not held for editing by this session")]
    EditNotHeld(i64),

    /// A check-in failed; the record is still locked
    #[error("lock conflict: {0}")]
    LockConflict(String),

    /// Up to three messages describing what was wrong
    #[error("validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("persistence failed: {0}")]
    PersistenceFailed(String),
}

/// Terminal result of one save request
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(i64),
    Rejected(SaveError),
    Conflict(SaveError),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }

    pub fn error(&self) -> Option<&SaveError> {
        match self {
            SaveOutcome::Saved(_) => None,
            SaveOutcome::Rejected(e) | SaveOutcome::Conflict(e) => Some(e),
        }
    }
}

/// Outcome plus where to send the user and what to tell them
#[derive(Debug, Clone)]
pub struct SaveReport {
    pub outcome: SaveOutcome,
    pub redirect: Option<RedirectTarget>,
    /// `redirect` rendered as an admin URL
    pub redirect_url: Option<String>,
    pub messages: Vec<Message>,
}

impl FilterController {
    /// Save a submitted filter form
    pub async fn save(&self, request: &SaveRequest) -> SaveReport {
        let key = request.key.clone().unwrap_or_else(|| self.store.key_name().to_string());
        let url_var = request.url_var.clone().unwrap_or_else(|| key.clone());

        let mut nav = Navigator::new();
        let outcome = self.run_save(request, &key, &mut nav).await;

        match &outcome {
            SaveOutcome::Saved(id) => tracing::info!(
                "Saved filter {} (task {:?}, user {})",
                id,
                request.task,
                request.ctx.user_id
            ),
            SaveOutcome::Rejected(e) | SaveOutcome::Conflict(e) => tracing::warn!(
                "Save of filter {} by user {} stopped: {}",
                request.record_id,
                request.ctx.user_id,
                e
            ),
        }

        let (redirect, messages) = nav.into_parts();
        SaveReport {
            outcome,
            redirect_url: redirect.as_ref().map(|r| r.to_url(&self.config, &url_var)),
            redirect,
            messages,
        }
    }

    async fn run_save(&self, request: &SaveRequest, key: &str, nav: &mut Navigator) -> SaveOutcome {
        let ctx = &request.ctx;
        let context = self.context_key();
        let record_id = request.record_id;

        if !self.tokens.check_token(&ctx.session_id, ctx.token.as_deref()).await {
            nav.error(self.language.text("JINVALID_TOKEN"));
            return SaveOutcome::Rejected(SaveError::Forbidden);
        }

        if !self.sessions.is_held(&ctx.session_id, &context, record_id).await {
            nav.error(self.language.sprintf("JLIB_APPLICATION_ERROR_UNHELD_ID", record_id));
            nav.redirect(RedirectTarget::List);
            return SaveOutcome::Rejected(SaveError::EditNotHeld(record_id));
        }

        // The id always comes from the URL, never from the posted form
        let mut data = request.form.clone();
        if let Some(map) = data.as_object_mut() {
            map.insert(key.to_string(), Value::from(record_id));
        }

        if request.task == Task::Save2Copy {
            if self.store.tracks_checkout() {
                if let Err(e) = self.store.checkin(record_id, &ctx.user_id).await {
                    if !nav.has_messages() {
                        nav.error(self.language.sprintf("JLIB_APPLICATION_ERROR_CHECKIN_FAILED", &e));
                    }
                    nav.redirect(RedirectTarget::Item(Some(record_id)));
                    return SaveOutcome::Conflict(SaveError::LockConflict(e.to_string()));
                }
            }

            if let Some(map) = data.as_object_mut() {
                map.insert(key.to_string(), Value::from(0));
                self.rename_copy(map).await;
            }
        }

        if !self.access.can_save(&data, key, &ctx.user_id) {
            nav.error(self.language.text("JLIB_APPLICATION_ERROR_SAVE_NOT_PERMITTED"));
            nav.redirect(RedirectTarget::List);
            return SaveOutcome::Rejected(SaveError::Forbidden);
        }

        let form = match self.store.fetch_schema(&data) {
            Ok(form) => form,
            Err(e) => {
                nav.error(e.to_string());
                return SaveOutcome::Rejected(SaveError::PersistenceFailed(e.to_string()));
            }
        };

        let mut valid = match self.store.validate(&form, &data) {
            Ok(valid) => valid,
            Err(errors) => {
                let mut shown: Vec<String> = errors
                    .iter()
                    .take(MAX_VALIDATION_MESSAGES)
                    .map(|e| e.to_string())
                    .collect();
                if shown.is_empty() {
                    shown.push("Invalid form data".to_string());
                }
                for message in &shown {
                    nav.error(message.clone());
                }

                self.sessions
                    .set_draft(&ctx.session_id, &context, request.form.clone())
                    .await;
                nav.redirect(RedirectTarget::Item(Some(record_id)));
                return SaveOutcome::Rejected(SaveError::ValidationFailed(shown));
            }
        };

        valid.filter_id = data.get(key).and_then(Value::as_i64).unwrap_or(0);
        valid.data = sanitize_selected_items(&request.selected_items);

        let saved_id = match self.store.save(&valid, &ctx.user_id).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Failed to save filter {}: {}", valid.filter_id, e);
                self.sessions
                    .set_draft(&ctx.session_id, &context, Value::Object(valid.to_form_data()))
                    .await;
                nav.error(self.language.sprintf("JLIB_APPLICATION_ERROR_SAVE_FAILED", &e));
                nav.redirect(RedirectTarget::Item(Some(record_id)));
                return SaveOutcome::Rejected(SaveError::PersistenceFailed(e.to_string()));
            }
        };

        if self.store.tracks_checkout() {
            if let Err(e) = self.store.checkin(valid.filter_id, &ctx.user_id).await {
                self.sessions
                    .set_draft(&ctx.session_id, &context, Value::Object(valid.to_form_data()))
                    .await;
                nav.error(self.language.sprintf("JLIB_APPLICATION_ERROR_CHECKIN_FAILED", &e));
                nav.redirect(RedirectTarget::Item(Some(record_id)));
                return SaveOutcome::Conflict(SaveError::LockConflict(e.to_string()));
            }
        }

        nav.enqueue(MessageKind::Message, self.language.text(&self.success_key(record_id, ctx.client)));

        // A copy continues editing the new record
        match request.task {
            Task::Apply | Task::Save2Copy => {
                self.sessions.hold(&ctx.session_id, &context, saved_id).await;
                self.sessions.clear_draft(&ctx.session_id, &context).await;
                if self.store.tracks_checkout() {
                    if let Err(e) = self.store.checkout(saved_id, &ctx.user_id).await {
                        tracing::warn!("Could not re-lock filter {} after apply: {}", saved_id, e);
                    }
                }
                nav.redirect(RedirectTarget::Item(Some(saved_id)));
            }
            Task::Save2New => {
                self.sessions.release(&ctx.session_id, &context, record_id).await;
                self.sessions.clear_draft(&ctx.session_id, &context).await;
                nav.redirect(RedirectTarget::Item(None));
            }
            Task::Save => {
                self.sessions.release(&ctx.session_id, &context, record_id).await;
                self.sessions.clear_draft(&ctx.session_id, &context).await;
                nav.redirect(RedirectTarget::List);
            }
        }

        valid.filter_id = saved_id;
        for hook in &self.hooks {
            hook.after_save(saved_id, &valid).await;
        }

        SaveOutcome::Saved(saved_id)
    }

    /// Language key for the success message
    ///
    /// New records submitted from the site get "submitted" wording. The
    /// component's own key wins when the catalogue has it.
    fn success_key(&self, record_id: i64, client: Client) -> String {
        let submit = if record_id == 0 && client == Client::Site { "_SUBMIT" } else { "" };
        let own = format!("{}{}_SAVE_SUCCESS", self.config.text_prefix, submit);
        if self.language.has_key(&own) {
            own
        } else {
            format!("JLIB_APPLICATION{}_SAVE_SUCCESS", submit)
        }
    }

    /// Give a copy a title and alias that don't collide with the original
    async fn rename_copy(&self, map: &mut Map<String, Value>) {
        let mut title = map.get("title").and_then(Value::as_str).unwrap_or_default().trim().to_string();
        let raw_alias = map.get("alias").and_then(Value::as_str).unwrap_or_default();
        let mut alias = slugify(if raw_alias.trim().is_empty() { title.as_str() } else { raw_alias });
        if alias.is_empty() {
            return;
        }

        loop {
            match self.store.alias_exists(&alias, 0).await {
                Ok(true) => {
                    title = increment_title(&title);
                    alias = increment_alias(&alias);
                }
                Ok(false) => break,
                Err(e) => {
                    tracing::warn!("Could not check alias '{}' for copy: {}", alias, e);
                    return;
                }
            }
        }

        map.insert("title".into(), Value::from(title));
        map.insert("alias".into(), Value::from(alias));
    }
}

/// "Title" -> "Title (2)", "Title (2)" -> "Title (3)"
pub(crate) fn increment_title(title: &str) -> String {
    if let Some(stripped) = title.strip_suffix(')') {
        if let Some(open) = stripped.rfind(" (") {
            if let Some(n) = stripped[open + 2..].parse::<u64>().ok().and_then(|n| n.checked_add(1)) {
                return format!("{} ({})", &stripped[..open], n);
            }
        }
    }
    format!("{} (2)", title)
}

/// "alias" -> "alias-2", "alias-2" -> "alias-3"
pub(crate) fn increment_alias(alias: &str) -> String {
    if let Some(dash) = alias.rfind('-') {
        if let Some(n) = alias[dash + 1..].parse::<u64>().ok().and_then(|n| n.checked_add(1)) {
            return format!("{}-{}", &alias[..dash], n);
        }
    }
    format!("{}-2", alias)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_and_aliases_increment() {
        assert_eq!(increment_title("News"), "News (2)");
        assert_eq!(increment_title("News (2)"), "News (3)");
        assert_eq!(increment_title("News (draft)"), "News (draft) (2)");
        assert_eq!(increment_alias("news"), "news-2");
        assert_eq!(increment_alias("news-9"), "news-10");
        assert_eq!(increment_alias("top-news"), "top-news-2");
    }

    #[test]
    fn oversized_counters_start_a_new_suffix() {
        assert_eq!(increment_alias("big-4294967295"), "big-4294967296");
        assert_eq!(increment_title("Big (4294967295)"), "Big (4294967296)");
        assert_eq!(increment_alias("big-18446744073709551615"), "big-18446744073709551615-2");
        assert_eq!(increment_title("Big (18446744073709551615)"), "Big (18446744073709551615) (2)");
        assert_eq!(increment_alias("big-99999999999999999999999"), "big-99999999999999999999999-2");
    }

    #[test]
    fn outcome_exposes_error() {
        assert!(SaveOutcome::Saved(3).error().is_none());
        let conflict = SaveOutcome::Conflict(SaveError::LockConflict("held".into()));
        assert_eq!(conflict.error(), Some(&SaveError::LockConflict("held".into())));
        assert!(!conflict.is_saved());
    }
}

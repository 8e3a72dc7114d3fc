/// Edit lifecycle actions around the save workflow
///
/// `add` and `edit` open the form (edit also checks the record out and takes
/// an edit permit), `cancel` undoes that, and `load_form_data` returns what
/// the form should display: the parked draft first, then the stored record.

use crate::controller::context::RequestContext;
use crate::controller::navigation::{Message, Navigator, RedirectTarget};
use crate::controller::save::SaveError;
use crate::controller::FilterController;
use serde_json::Value;

/// Result of a non-save controller action
#[derive(Debug, Clone)]
pub struct ActionReport {
    /// Whether the action did what was asked
    pub accepted: bool,
    pub error: Option<SaveError>,
    pub redirect: Option<RedirectTarget>,
    pub redirect_url: Option<String>,
    pub messages: Vec<Message>,
}

impl FilterController {
    fn report(&self, result: Result<(), SaveError>, nav: Navigator) -> ActionReport {
        let url_var = self.store.key_name().to_string();
        let (redirect, messages) = nav.into_parts();
        ActionReport {
            accepted: result.is_ok(),
            error: result.err(),
            redirect_url: redirect.as_ref().map(|r| r.to_url(&self.config, &url_var)),
            redirect,
            messages,
        }
    }

    /// Open a blank form for a new filter
    pub async fn add(&self, ctx: &RequestContext) -> ActionReport {
        let mut nav = Navigator::new();
        let context = self.context_key();

        let result = if !self.access.can_create(&ctx.user_id) {
            nav.error(self.language.text("JLIB_APPLICATION_ERROR_CREATE_RECORD_NOT_PERMITTED"));
            nav.redirect(RedirectTarget::List);
            Err(SaveError::Forbidden)
        } else {
            self.sessions.clear_draft(&ctx.session_id, &context).await;
            nav.redirect(RedirectTarget::Item(None));
            Ok(())
        };

        self.report(result, nav)
    }

    /// Open an existing filter for editing
    ///
    /// Takes the check-out lock and the session's edit permit. If the lock is
    /// held by someone else the user is sent to the item view without a permit,
    /// so a later save is refused.
    pub async fn edit(&self, ctx: &RequestContext, id: i64) -> ActionReport {
        let mut nav = Navigator::new();
        let context = self.context_key();

        let allowed = if id == 0 {
            self.access.can_create(&ctx.user_id)
        } else {
            self.access.can_edit(&ctx.user_id, id)
        };
        if !allowed {
            nav.error(self.language.text("JLIB_APPLICATION_ERROR_EDIT_NOT_PERMITTED"));
            nav.redirect(RedirectTarget::List);
            return self.report(Err(SaveError::Forbidden), nav);
        }

        if self.store.tracks_checkout() {
            if let Err(e) = self.store.checkout(id, &ctx.user_id).await {
                tracing::warn!("User {} could not check out filter {}: {}", ctx.user_id, id, e);
                nav.error(self.language.sprintf("JLIB_APPLICATION_ERROR_CHECKOUT_FAILED", &e));
                nav.redirect(RedirectTarget::Item(Some(id)));
                return self.report(Err(SaveError::LockConflict(e.to_string())), nav);
            }
        }

        if !self.sessions.renew(&ctx.session_id, &context, id).await {
            self.sessions.hold(&ctx.session_id, &context, id).await;
        }
        self.sessions.clear_draft(&ctx.session_id, &context).await;
        nav.redirect(RedirectTarget::Item(Some(id)));

        tracing::debug!("User {} opened filter {} for editing", ctx.user_id, id);
        self.report(Ok(()), nav)
    }

    /// Leave the edit form without saving
    pub async fn cancel(&self, ctx: &RequestContext, id: i64) -> ActionReport {
        let mut nav = Navigator::new();
        let context = self.context_key();

        if !self.tokens.check_token(&ctx.session_id, ctx.token.as_deref()).await {
            nav.error(self.language.text("JINVALID_TOKEN"));
            return self.report(Err(SaveError::Forbidden), nav);
        }

        if id != 0 && self.store.tracks_checkout() {
            if let Err(e) = self.store.checkin(id, &ctx.user_id).await {
                nav.error(self.language.sprintf("JLIB_APPLICATION_ERROR_CHECKIN_FAILED", &e));
                nav.redirect(RedirectTarget::Item(Some(id)));
                return self.report(Err(SaveError::LockConflict(e.to_string())), nav);
            }
        }

        self.sessions.release(&ctx.session_id, &context, id).await;
        self.sessions.clear_draft(&ctx.session_id, &context).await;
        nav.redirect(RedirectTarget::List);

        self.report(Ok(()), nav)
    }

    /// Data the edit form should display for `id`
    ///
    /// The session must hold the record. A parked draft wins over the stored
    /// row; a new record starts empty.
    pub async fn load_form_data(&self, ctx: &RequestContext, id: i64) -> Result<Value, SaveError> {
        let context = self.context_key();

        if !self.sessions.is_held(&ctx.session_id, &context, id).await {
            return Err(SaveError::EditNotHeld(id));
        }

        if let Some(draft) = self.sessions.draft(&ctx.session_id, &context).await {
            return Ok(draft);
        }

        if id == 0 {
            return Ok(Value::Object(Default::default()));
        }

        match self.store.load(id).await {
            Ok(Some(filter)) => Ok(Value::Object(filter.to_form_data())),
            Ok(None) => Err(SaveError::PersistenceFailed(format!("filter {} not found", id))),
            Err(e) => Err(SaveError::PersistenceFailed(e.to_string())),
        }
    }
}

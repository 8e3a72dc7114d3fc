/// In-memory edit session store
///
/// Tracks, per HTTP session: the anti-forgery token, the edit permits held for
/// each edit context, and the draft form data parked after a failed save.
/// Permits expire when not held or renewed within the configured lifetime, and
/// sessions idle for longer than that are dropped by the sweeper. Only sessions
/// opened with `create_session` ever get state.

use crate::controller::traits::{EditSessions, TokenValidator};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// State kept for one HTTP session
#[derive(Debug, Clone)]
struct SessionState {
    token: String,
    /// context key -> record id -> last hold/renew time
    permits: HashMap<String, HashMap<i64, DateTime<Utc>>>,
    /// context key -> draft form data
    drafts: HashMap<String, Value>,
    /// Last time the session was used
    last_seen: DateTime<Utc>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            token: Uuid::new_v4().simple().to_string(),
            permits: HashMap::new(),
            drafts: HashMap::new(),
            last_seen: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.last_seen = Utc::now();
    }
}

/// Newly issued session credentials
#[derive(Debug, Clone, serde::Serialize)]
pub struct IssuedSession {
    pub session_id: String,
    pub token: String,
}

/// Session store shared by all requests
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
    lifetime: Duration,
}

impl SessionStore {
    /// Create a store whose permits live `lifetime_secs` seconds without renewal
    pub fn new(lifetime_secs: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            lifetime: Duration::seconds(lifetime_secs),
        }
    }

    /// Open a new session and issue its anti-forgery token
    pub async fn create_session(&self) -> IssuedSession {
        let session_id = Uuid::new_v4().to_string();
        let state = SessionState::new();
        let token = state.token.clone();

        self.sessions.write().await.insert(session_id.clone(), state);
        tracing::debug!("Opened session {}", session_id);

        IssuedSession { session_id, token }
    }

    /// Drop idle sessions and permits whose hold time is older than the lifetime
    ///
    /// Returns the number of permits removed, counting those of dropped sessions.
    pub async fn sweep_expired(&self) -> usize {
        let cutoff = Utc::now() - self.lifetime;
        let mut removed = 0;

        let mut sessions = self.sessions.write().await;
        let before_sessions = sessions.len();
        sessions.retain(|_, state| {
            if state.last_seen < cutoff {
                removed += state.permits.values().map(HashMap::len).sum::<usize>();
                return false;
            }
            for held in state.permits.values_mut() {
                let before = held.len();
                held.retain(|_, at| *at >= cutoff);
                removed += before - held.len();
            }
            true
        });
        let dropped = before_sessions - sessions.len();

        if removed > 0 || dropped > 0 {
            tracing::debug!("Expired {} edit permits and {} idle sessions", removed, dropped);
        }
        removed
    }

    /// Number of open sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl TokenValidator for SessionStore {
    async fn check_token(&self, session_id: &str, token: Option<&str>) -> bool {
        let Some(token) = token else {
            return false;
        };
        match self.sessions.write().await.get_mut(session_id) {
            Some(state) if state.token == token => {
                state.touch();
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl EditSessions for SessionStore {
    async fn hold(&self, session_id: &str, context: &str, id: i64) {
        if id == 0 {
            return;
        }
        let mut sessions = self.sessions.write().await;
        let Some(state) = sessions.get_mut(session_id) else {
            tracing::debug!("Ignoring hold of {} #{} for unknown session {}", context, id, session_id);
            return;
        };
        state.touch();
        state.permits.entry(context.to_string()).or_default().insert(id, Utc::now());
        tracing::debug!("Session {} holds {} #{}", session_id, context, id);
    }

    async fn release(&self, session_id: &str, context: &str, id: i64) {
        let mut sessions = self.sessions.write().await;
        if let Some(held) = sessions.get_mut(session_id).and_then(|s| s.permits.get_mut(context)) {
            if held.remove(&id).is_some() {
                tracing::debug!("Session {} released {} #{}", session_id, context, id);
            }
        }
    }

    async fn renew(&self, session_id: &str, context: &str, id: i64) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(state) = sessions.get_mut(session_id) else {
            return false;
        };
        state.touch();
        match state.permits.get_mut(context).and_then(|held| held.get_mut(&id)) {
            Some(at) => {
                *at = Utc::now();
                true
            }
            None => false,
        }
    }

    async fn is_held(&self, session_id: &str, context: &str, id: i64) -> bool {
        if id == 0 {
            return true;
        }
        let cutoff = Utc::now() - self.lifetime;
        self.sessions
            .read()
            .await
            .get(session_id)
            .and_then(|s| s.permits.get(context))
            .and_then(|held| held.get(&id))
            .is_some_and(|at| *at >= cutoff)
    }

    async fn set_draft(&self, session_id: &str, context: &str, data: Value) {
        if let Some(state) = self.sessions.write().await.get_mut(session_id) {
            state.touch();
            state.drafts.insert(context.to_string(), data);
        }
    }

    async fn draft(&self, session_id: &str, context: &str) -> Option<Value> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .and_then(|s| s.drafts.get(context))
            .cloned()
    }

    async fn clear_draft(&self, session_id: &str, context: &str) {
        if let Some(state) = self.sessions.write().await.get_mut(session_id) {
            state.drafts.remove(context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CTX: &str = "com_finder.edit.filter";

    #[tokio::test]
    async fn token_must_match_issuing_session() {
        let store = SessionStore::new(900);
        let a = store.create_session().await;
        let b = store.create_session().await;

        assert!(store.check_token(&a.session_id, Some(&a.token)).await);
        assert!(!store.check_token(&a.session_id, Some(&b.token)).await);
        assert!(!store.check_token(&a.session_id, None).await);
        assert!(!store.check_token("unknown", Some(&a.token)).await);
    }

    #[tokio::test]
    async fn permits_are_scoped_by_session_and_context() {
        let store = SessionStore::new(900);
        let s = store.create_session().await;

        assert!(store.is_held(&s.session_id, CTX, 0).await);
        assert!(!store.is_held(&s.session_id, CTX, 5).await);

        store.hold(&s.session_id, CTX, 5).await;
        assert!(store.is_held(&s.session_id, CTX, 5).await);
        assert!(!store.is_held(&s.session_id, "com_finder.edit.other", 5).await);
        assert!(!store.is_held("someone-else", CTX, 5).await);

        store.release(&s.session_id, CTX, 5).await;
        assert!(!store.is_held(&s.session_id, CTX, 5).await);
        assert!(!store.renew(&s.session_id, CTX, 5).await);
    }

    #[tokio::test]
    async fn expired_permits_are_not_held() {
        let store = SessionStore::new(0);
        let s = store.create_session().await;
        store.hold(&s.session_id, CTX, 9).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        assert!(!store.is_held(&s.session_id, CTX, 9).await);
        assert_eq!(store.sweep_expired().await, 1);
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_sessions_get_no_state() {
        let store = SessionStore::new(900);
        for n in 0..100 {
            let id = format!("made-up-{}", n);
            store.hold(&id, CTX, 5).await;
            store.set_draft(&id, CTX, json!({ "title": "x" })).await;
            assert!(!store.is_held(&id, CTX, 5).await);
            assert_eq!(store.draft(&id, CTX).await, None);
        }
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn sweep_drops_idle_sessions_only() {
        let store = SessionStore::new(1);
        let idle = store.create_session().await;
        store.create_session().await;
        assert_eq!(store.session_count().await, 2);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let active = store.create_session().await;
        assert!(store.check_token(&active.session_id, Some(&active.token)).await);

        store.sweep_expired().await;
        assert_eq!(store.session_count().await, 1);
        assert!(!store.check_token(&idle.session_id, Some(&idle.token)).await);
        assert!(store.check_token(&active.session_id, Some(&active.token)).await);
    }

    #[tokio::test]
    async fn drafts_round_trip_and_clear() {
        let store = SessionStore::new(900);
        let s = store.create_session().await;
        let draft = json!({ "title": "half typed", "state": "1" });

        store.set_draft(&s.session_id, CTX, draft.clone()).await;
        assert_eq!(store.draft(&s.session_id, CTX).await, Some(draft));

        store.clear_draft(&s.session_id, CTX).await;
        assert_eq!(store.draft(&s.session_id, CTX).await, None);
    }
}

//! Auth store: the single owner of session state.
//!
//! `AuthStore` orchestrates login, registration, logout and session restore,
//! and keeps in-memory state consistent with the persisted credential slots.
//! Observers read snapshots with [`AuthStore::state`] or watch for changes
//! with [`AuthStore::subscribe`].

use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, SessionClient, SessionEvent};
use crate::models::{AuthPayload, RegisterData, TokenPair, User};

use super::credentials::{
    load_session, persist_session, CredentialError, CredentialKey, CredentialStore,
};

const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";

/// Observable session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub tokens: Option<TokenPair>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.tokens.is_some()
    }

    fn clear_session(&mut self) {
        self.user = None;
        self.tokens = None;
    }
}

pub struct AuthStore {
    api: SessionClient,
    credentials: Arc<dyn CredentialStore>,
    state: watch::Sender<AuthState>,
}

impl AuthStore {
    /// Create a store sharing the client's credential backend
    pub fn new(api: SessionClient) -> Self {
        let credentials = api.credentials();
        let (state, _) = watch::channel(AuthState::default());
        Self {
            api,
            credentials,
            state,
        }
    }

    pub fn api(&self) -> &SessionClient {
        &self.api
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.error = None);
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_modify(|s| s.is_loading = loading);
    }

    // ========================================================================
    // Sign in / out
    // ========================================================================

    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        self.begin();
        let result = self.api.login(email, password).await;
        self.finish_sign_in(result, LOGIN_FAILED)
    }

    pub async fn register(&self, data: &RegisterData) -> Result<(), ApiError> {
        self.begin();
        let result = self.api.register(data).await;
        self.finish_sign_in(result, REGISTRATION_FAILED)
    }

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
    }

    fn finish_sign_in(&self, result: Result<AuthPayload, ApiError>, fallback: &str) -> Result<(), ApiError> {
        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Sign in failed");
                self.record_failure(&e, fallback, false);
                return Err(e);
            }
        };

        if let Err(e) = persist_session(self.credentials.as_ref(), &payload.tokens, &payload.user) {
            error!(error = %e, "Failed to persist session");
            let e = ApiError::from(e);
            // The slots were rolled back, so no session may remain in memory
            self.record_failure(&e, fallback, true);
            return Err(e);
        }

        info!(user_id = %payload.user.id, "Signed in");
        self.state.send_modify(|s| {
            s.user = Some(payload.user);
            s.tokens = Some(payload.tokens);
            s.is_loading = false;
            s.error = None;
        });
        Ok(())
    }

    fn record_failure(&self, e: &ApiError, fallback: &str, drop_session: bool) {
        let message = e.to_string();
        let message = if message.trim().is_empty() {
            fallback.to_string()
        } else {
            message
        };
        self.state.send_modify(|s| {
            if drop_session {
                s.clear_session();
            }
            s.is_loading = false;
            s.error = Some(message);
        });
    }

    /// Sign out. The remote call is best-effort; local credentials are
    /// always cleared.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Logout API error, continuing with local sign out");
        }

        if let Err(e) = self.api.clear_credentials().await {
            error!(error = %e, "Failed to clear persisted credentials");
        }
        self.state.send_replace(AuthState::default());
        info!("Signed out");
    }

    // ========================================================================
    // Session restore
    // ========================================================================

    /// Restore a persisted session and validate it against the server.
    pub async fn load_user(&self) {
        self.set_loading(true);

        let (tokens, cached_user) = match load_session(self.credentials.as_ref()) {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("No persisted session");
                self.set_loading(false);
                return;
            }
            Err(CredentialError::Serialization(e)) => {
                warn!(error = %e, "Persisted user is corrupt, discarding session");
                self.discard_session(None).await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted credentials");
                self.state.send_modify(|s| {
                    s.is_loading = false;
                    s.error = Some(e.to_string());
                });
                return;
            }
        };

        debug!(user_id = %cached_user.id, "Validating persisted session");
        match self.api.get_profile().await {
            Ok(user) => {
                // The profile call may have renewed the tokens
                let tokens = self.persisted_tokens().unwrap_or(tokens);
                self.remember_user(&user);
                info!(user_id = %user.id, "Session restored");
                self.state.send_modify(|s| {
                    s.user = Some(user);
                    s.tokens = Some(tokens);
                    s.is_loading = false;
                    s.error = None;
                });
            }
            Err(e) => {
                warn!(error = %e, "Could not validate persisted session, discarding it");
                self.discard_session(Some(e.to_string())).await;
            }
        }
    }

    async fn discard_session(&self, error: Option<String>) {
        if let Err(e) = self.api.clear_credentials().await {
            error!(error = %e, "Failed to clear persisted credentials");
        }
        self.state.send_modify(|s| {
            s.clear_session();
            s.is_loading = false;
            s.error = error;
        });
    }

    fn persisted_tokens(&self) -> Option<TokenPair> {
        let access = self.credentials.get(CredentialKey::AccessToken).ok()??;
        let refresh = self.credentials.get(CredentialKey::RefreshToken).ok()??;
        Some(TokenPair::new(access, refresh))
    }

    fn remember_user(&self, user: &User) {
        let stored = serde_json::to_string(user)
            .map_err(CredentialError::from)
            .and_then(|json| self.credentials.set(CredentialKey::User, &json));
        if let Err(e) = stored {
            warn!(error = %e, "Failed to update persisted user");
        }
    }

    // ========================================================================
    // Client session events
    // ========================================================================

    /// Apply a refresh or expiry reported by the client.
    ///
    /// Events only apply to the session holding the refresh token they name,
    /// so a late event cannot clobber a newer login.
    pub fn apply_session_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Refreshed {
                previous_refresh_token,
                tokens,
            } => {
                self.state.send_if_modified(|s| {
                    let matches = s
                        .tokens
                        .as_ref()
                        .is_some_and(|current| current.refresh_token == *previous_refresh_token);
                    if matches {
                        debug!("Adopting refreshed tokens");
                        s.tokens = Some(tokens.clone());
                    }
                    matches
                });
            }
            SessionEvent::Expired { refresh_token } => {
                self.state.send_if_modified(|s| {
                    let matches = s
                        .tokens
                        .as_ref()
                        .is_some_and(|current| current.refresh_token == *refresh_token);
                    if matches {
                        info!("Session expired");
                        s.clear_session();
                        s.error = Some(ApiError::AuthExpired.to_string());
                    }
                    matches
                });
            }
        }
    }

    /// Follow the client's session events until the store is dropped
    pub fn spawn_session_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.api.subscribe();
        let store: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(store) = store.upgrade() else { break };
                        store.apply_session_event(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session listener lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;
    use chrono::Utc;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: "a@b.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Byron".to_string(),
            avatar: None,
            role: Default::default(),
            is_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn store() -> AuthStore {
        let api = SessionClient::new("http://127.0.0.1:9", Arc::new(MemoryStore::new())).unwrap();
        AuthStore::new(api)
    }

    fn signed_in(store: &AuthStore, refresh: &str) {
        store.state.send_modify(|s| {
            s.user = Some(user("1"));
            s.tokens = Some(TokenPair::new("t1", refresh));
        });
    }

    #[test]
    fn test_is_authenticated_requires_user_and_tokens() {
        let mut state = AuthState::default();
        assert!(!state.is_authenticated());
        state.user = Some(user("1"));
        assert!(!state.is_authenticated());
        state.tokens = Some(TokenPair::new("t1", "r1"));
        assert!(state.is_authenticated());
    }

    #[test]
    fn test_clear_error_and_set_loading() {
        let store = store();
        store.state.send_modify(|s| s.error = Some("boom".to_string()));
        store.clear_error();
        assert!(store.state().error.is_none());

        store.set_loading(true);
        assert!(store.state().is_loading);
        store.set_loading(false);
        assert!(!store.state().is_loading);
    }

    #[test]
    fn test_refreshed_event_updates_matching_session() {
        let store = store();
        signed_in(&store, "r1");
        store.apply_session_event(&SessionEvent::Refreshed {
            previous_refresh_token: "r1".to_string(),
            tokens: TokenPair::new("t2", "r2"),
        });
        assert_eq!(store.state().tokens, Some(TokenPair::new("t2", "r2")));
    }

    #[test]
    fn test_stale_events_are_ignored() {
        let store = store();
        signed_in(&store, "r9");
        store.apply_session_event(&SessionEvent::Refreshed {
            previous_refresh_token: "r1".to_string(),
            tokens: TokenPair::new("t2", "r2"),
        });
        store.apply_session_event(&SessionEvent::Expired {
            refresh_token: "r1".to_string(),
        });
        let state = store.state();
        assert!(state.is_authenticated());
        assert_eq!(state.tokens, Some(TokenPair::new("t1", "r9")));
    }

    #[test]
    fn test_expired_event_resets_session() {
        let store = store();
        signed_in(&store, "r1");
        store.apply_session_event(&SessionEvent::Expired {
            refresh_token: "r1".to_string(),
        });
        let state = store.state();
        assert!(!state.is_authenticated());
        assert!(state.user.is_none());
        assert!(state.error.is_some());
    }

    #[test]
    fn test_subscribers_see_changes() {
        let store = store();
        let mut rx = store.subscribe();
        store.set_loading(true);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_loading);
    }
}

//! Authentication session: sign-in state and its transitions.
//!
//! An [`AuthSession`] owns the signed-in identity and credential, keeps
//! them in durable storage, and pushes the credential into the shared
//! [`TransportClient`]. It is an explicit object: front ends hold it (or an
//! `Arc` of it) and pass it to whatever needs the identity. The credential
//! changes only through the transitions below.
//!
//! # States
//!
//! ```text
//!                    restore()
//!  Unauthenticated ───────────► Loading ──► Authenticated(identity, credential)
//!        ▲                        │                  │
//!        │     bad/missing data   │                  │ logout(), or a 403
//!        └────────────────────────┘                  │ during refresh_user()
//!        └───────────────────────────────────────────┘
//!
//!  login():  any state ─► Loading ─► Authenticated      on success
//!                                └─► previous state     on failure, unless
//!                                                        logout() ran meanwhile
//! ```
//!
//! State is published on a [`tokio::sync::watch`] channel; [`AuthSession::subscribe`]
//! lets a front end re-render whenever it changes.

use std::sync::Arc;

use safetrack_api::{Entity, Identity, User};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    credential::Credential,
    error::{AuthError, ClientError},
    permissions::Capabilities,
    resource::ResourceService,
    storage::{SessionStore, StoreError, AUTH_TOKEN_KEY, USER_DATA_KEY},
    transport::TransportClient,
};

/// Where the session currently stands.
///
/// The identity and the credential only ever exist together, in
/// [`SessionState::Authenticated`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    /// Reading storage at startup, or a sign-in is in progress.
    Loading,
    Authenticated {
        identity: Identity,
        credential: Credential,
    },
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated { identity, .. } => Some(identity),
            _ => None,
        }
    }

    /// The credential, or the sentinel when not authenticated.
    pub fn credential(&self) -> Credential {
        match self {
            SessionState::Authenticated { credential, .. } => credential.clone(),
            _ => Credential::none(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }
}

/// Result of [`AuthSession::refresh_user`].
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The profile was re-fetched and replaced.
    Refreshed(Identity),
    /// The server refused the credential; the session signed out.
    SignedOut,
    /// Nobody was signed in, so nothing was fetched.
    NotAuthenticated,
    /// The session signed out or in again while the fetch was running; the
    /// result belonged to the old session and was discarded.
    Superseded,
}

/// The one authentication session of a running client.
pub struct AuthSession {
    transport: TransportClient,
    users: ResourceService<User>,
    store: Arc<dyn SessionStore>,
    state: watch::Sender<SessionState>,
}

impl AuthSession {
    /// Start a session, rehydrating it from `store`.
    ///
    /// The session becomes `Authenticated` straight away when the store holds
    /// a usable token and a well-formed identity. Anything else (a missing
    /// entry, the sentinel token, identity JSON that does not decode or
    /// validate) leaves it `Unauthenticated` and both entries are removed.
    /// A bad store is never an error.
    pub fn restore(transport: TransportClient, store: Arc<dyn SessionStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        let session = Self {
            users: ResourceService::new(transport.clone()),
            transport,
            store,
            state,
        };

        let next = match session.load_stored() {
            Some((identity, credential)) => {
                info!(user_id = %identity.id, "session restored from storage");
                session.transport.set_credential(credential.clone());
                SessionState::Authenticated {
                    identity,
                    credential,
                }
            }
            None => {
                session.clear_stored();
                session.transport.set_credential(Credential::none());
                SessionState::Unauthenticated
            }
        };
        session.state.send_replace(next);
        session
    }

    // ── Reading ──────────────────────────────────────────────────────────────

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    pub fn credential(&self) -> Credential {
        self.state.borrow().credential()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Capabilities of the current identity, evaluated now.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::evaluate(self.state.borrow().identity())
    }

    /// The transport this session drives; share it with resource services.
    pub fn transport(&self) -> &TransportClient {
        &self.transport
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    /// Sign in with an email address and password.
    ///
    /// The backend has no lookup by email, so every user is listed and the
    /// one with exactly this email is picked; its id is then used to obtain
    /// a credential. On success both session entries are persisted. On
    /// failure nothing new is persisted and the error is returned; the state
    /// returns to what it was before the call unless [`logout`](Self::logout)
    /// ran in the meantime, in which case it stays signed out.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        let previous = self.state.send_replace(SessionState::Loading);

        match self.sign_in(email, password).await {
            Ok((identity, credential)) => {
                info!(user_id = %identity.id, role = %identity.role, "signed in");
                self.transport.set_credential(credential.clone());
                self.state.send_replace(SessionState::Authenticated {
                    identity: identity.clone(),
                    credential,
                });
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "sign-in failed");
                // A logout during the attempt has already settled the state.
                let credential = previous.credential();
                let restored = self.state.send_if_modified(|state| {
                    if !state.is_loading() {
                        return false;
                    }
                    *state = previous;
                    true
                });
                if restored {
                    self.transport.set_credential(credential);
                }
                Err(e)
            }
        }
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Identity, Credential), ClientError> {
        let identity = self
            .users
            .get_all()
            .await?
            .into_iter()
            .find(|u| u.email == email)
            .ok_or(AuthError::UserNotFound)?;
        debug!(user_id = %identity.id, "resolved email to user");

        let credential = self.transport.login(identity.id(), password).await?;
        self.persist(&identity, &credential)?;
        Ok((identity, credential))
    }

    /// Sign out. Never fails.
    ///
    /// Clears both stored entries, resets the transport credential to the
    /// sentinel and moves to `Unauthenticated`. Requests already in flight
    /// keep the credential they were sent with.
    pub fn logout(&self) {
        self.clear_stored();
        self.transport.set_credential(Credential::none());
        self.state.send_replace(SessionState::Unauthenticated);
        info!("signed out");
    }

    /// Re-fetch the signed-in user's profile and replace the cached identity.
    ///
    /// A `403` means the server no longer accepts the credential: the
    /// session signs out and this returns `Ok(RefreshOutcome::SignedOut)`.
    /// Any other failure leaves the session as it was and is returned.
    ///
    /// The result, a `403` included, only touches the session whose
    /// credential the fetch carried. If the session has changed since, this
    /// returns `Ok(RefreshOutcome::Superseded)` and changes nothing.
    pub async fn refresh_user(&self) -> Result<RefreshOutcome, ClientError> {
        let SessionState::Authenticated {
            identity,
            credential,
        } = self.state()
        else {
            return Ok(RefreshOutcome::NotAuthenticated);
        };

        let updated = match self.users.get_by_id(&identity.id).await {
            Ok(user) => user,
            Err(e) if e.is_stale_credential() => {
                let signed_out = self.state.send_if_modified(|state| {
                    if state.credential() != credential {
                        return false;
                    }
                    *state = SessionState::Unauthenticated;
                    true
                });
                if !signed_out {
                    debug!("session changed while refreshing, ignoring rejected credential");
                    return Ok(RefreshOutcome::Superseded);
                }
                warn!(user_id = %identity.id, "credential rejected during refresh, signed out");
                self.clear_stored();
                self.transport.set_credential(Credential::none());
                return Ok(RefreshOutcome::SignedOut);
            }
            Err(e) => {
                warn!(user_id = %identity.id, error = %e, "failed to refresh user");
                return Err(e);
            }
        };

        // Only apply the result to the session it was fetched for.
        let applied = self.state.send_if_modified(|state| match state {
            SessionState::Authenticated {
                identity,
                credential: current,
            } if *current == credential => {
                *identity = updated.clone();
                true
            }
            _ => false,
        });
        if !applied {
            debug!("session changed while refreshing, discarding result");
            return Ok(RefreshOutcome::Superseded);
        }

        self.store
            .set(USER_DATA_KEY, &serde_json::to_string(&updated).map_err(StoreError::from)?)?;
        debug!(user_id = %updated.id, "user refreshed");
        Ok(RefreshOutcome::Refreshed(updated))
    }

    // ── Storage ──────────────────────────────────────────────────────────────

    fn load_stored(&self) -> Option<(Identity, Credential)> {
        let token = self.store.get(AUTH_TOKEN_KEY);
        let user_data = self.store.get(USER_DATA_KEY);
        let (Some(token), Some(user_data)) = (token, user_data) else {
            debug!("no stored session");
            return None;
        };

        let credential = Credential::new(token);
        if !credential.is_present() {
            warn!("stored token is empty, discarding session");
            return None;
        }

        match serde_json::from_str::<Identity>(&user_data) {
            Ok(identity) => match identity.validate() {
                Ok(()) => Some((identity, credential)),
                Err(e) => {
                    warn!(error = %e, "stored identity is invalid, discarding session");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "stored identity is malformed, discarding session");
                None
            }
        }
    }

    /// Write both entries. If the second write fails the token is put back,
    /// so the store never pairs a new token with an old identity.
    fn persist(&self, identity: &Identity, credential: &Credential) -> Result<(), StoreError> {
        let user_data = serde_json::to_string(identity)?;
        let previous_token = self.store.get(AUTH_TOKEN_KEY);
        self.store.set(AUTH_TOKEN_KEY, credential.as_str())?;

        if let Err(e) = self.store.set(USER_DATA_KEY, &user_data) {
            let rollback = match &previous_token {
                Some(token) => self.store.set(AUTH_TOKEN_KEY, token),
                None => self.store.remove(AUTH_TOKEN_KEY),
            };
            if let Err(rollback_err) = rollback {
                warn!(error = %rollback_err, "cannot restore previous token, clearing session entries");
                self.clear_stored();
            }
            return Err(e);
        }
        Ok(())
    }

    fn clear_stored(&self) {
        for key in [AUTH_TOKEN_KEY, USER_DATA_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "failed to remove session entry");
            }
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ClientConfig, storage::MemoryStore};
    use safetrack_api::{Ref, Role};

    fn ash() -> Identity {
        Identity {
            id: "u-1".into(),
            name: "Ash".into(),
            email: "ash@example.com".into(),
            role: Role::Foreman,
            workplace: Ref::from("wp-1"),
        }
    }

    fn transport() -> TransportClient {
        // Nothing listens here, so any request fails to connect.
        TransportClient::new(&ClientConfig::new("http://127.0.0.1:9")).unwrap()
    }

    fn seeded_store(token: &str, user_data: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.set(AUTH_TOKEN_KEY, token).unwrap();
        store.set(USER_DATA_KEY, user_data).unwrap();
        store
    }

    #[test]
    fn restore_well_formed_session() {
        let store = seeded_store("tok-1", &serde_json::to_string(&ash()).unwrap());
        let t = transport();
        let session = AuthSession::restore(t.clone(), store.clone());

        assert!(session.is_authenticated());
        assert_eq!(session.identity().unwrap(), ash());
        assert_eq!(session.credential().as_str(), "tok-1");
        assert_eq!(t.credential().as_str(), "tok-1");
        assert!(session.capabilities().is_foreman);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn restore_malformed_identity_purges_storage() {
        let store = seeded_store("tok-1", "{not json");
        let t = transport();
        let session = AuthSession::restore(t.clone(), store.clone());

        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(store.is_empty());
        assert_eq!(t.credential(), Credential::none());
    }

    #[test]
    fn restore_identity_without_id_purges_storage() {
        let store = seeded_store(
            "tok-1",
            r#"{"name":"Ash","email":"ash@example.com","role":"user","workplaceId":"wp-1"}"#,
        );
        let session = AuthSession::restore(transport(), store.clone());
        assert!(!session.is_authenticated());
        assert!(store.is_empty());
    }

    #[test]
    fn restore_sentinel_token_purges_storage() {
        let store = seeded_store("NULL", &serde_json::to_string(&ash()).unwrap());
        let session = AuthSession::restore(transport(), store.clone());
        assert!(!session.is_authenticated());
        assert!(store.is_empty());
    }

    #[test]
    fn restore_half_a_session_purges_storage() {
        let store = Arc::new(MemoryStore::new());
        store.set(AUTH_TOKEN_KEY, "tok-1").unwrap();
        let session = AuthSession::restore(transport(), store.clone());
        assert!(!session.is_authenticated());
        assert!(store.is_empty());
    }

    #[test]
    fn logout_clears_everything() {
        let store = seeded_store("tok-1", &serde_json::to_string(&ash()).unwrap());
        let t = transport();
        let session = AuthSession::restore(t.clone(), store.clone());
        let mut rx = session.subscribe();

        session.logout();

        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(t.credential(), Credential::none());
        assert!(store.is_empty());
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionState::Unauthenticated);
        assert_eq!(session.capabilities(), Capabilities::default());
    }

    #[tokio::test]
    async fn refresh_when_signed_out_is_a_no_op() {
        let session = AuthSession::restore(transport(), Arc::new(MemoryStore::new()));
        assert_eq!(
            session.refresh_user().await.unwrap(),
            RefreshOutcome::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn failed_login_returns_to_previous_state() {
        let store = seeded_store("tok-1", &serde_json::to_string(&ash()).unwrap());
        let t = transport();
        let session = AuthSession::restore(t.clone(), store.clone());

        // The user lookup cannot reach a server.
        let err = session.login("ash@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)), "got {err:?}");

        assert!(session.is_authenticated());
        assert_eq!(t.credential().as_str(), "tok-1");
        assert_eq!(store.get(AUTH_TOKEN_KEY).as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn refresh_network_failure_keeps_the_session() {
        let user_data = serde_json::to_string(&ash()).unwrap();
        let store = seeded_store("tok-1", &user_data);
        let t = transport();
        let session = AuthSession::restore(t.clone(), store.clone());
        let before = session.state();

        let err = session.refresh_user().await.unwrap_err();

        assert!(matches!(err, ClientError::Network(_)), "got {err:?}");
        assert_eq!(session.state(), before);
        assert_eq!(t.credential().as_str(), "tok-1");
        assert_eq!(store.get(AUTH_TOKEN_KEY).as_deref(), Some("tok-1"));
        assert_eq!(store.get(USER_DATA_KEY).as_deref(), Some(user_data.as_str()));
    }

    /// A store whose writes to one key always fail.
    struct BrokenKey {
        inner: MemoryStore,
        broken: &'static str,
    }

    impl SessionStore for BrokenKey {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if key == self.broken {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn persist_failure_puts_the_old_token_back() {
        let old_data = serde_json::to_string(&ash()).unwrap();
        let inner = MemoryStore::new();
        inner.set(AUTH_TOKEN_KEY, "tok-1").unwrap();
        inner.set(USER_DATA_KEY, &old_data).unwrap();
        let store = Arc::new(BrokenKey {
            inner,
            broken: USER_DATA_KEY,
        });
        let session = AuthSession::restore(transport(), store.clone());

        let mut other = ash();
        other.id = "u-2".into();
        let err = session.persist(&other, &Credential::new("tok-2")).unwrap_err();

        assert!(matches!(err, StoreError::Io(_)), "got {err:?}");
        assert_eq!(store.get(AUTH_TOKEN_KEY).as_deref(), Some("tok-1"));
        assert_eq!(store.get(USER_DATA_KEY).as_deref(), Some(old_data.as_str()));
    }

    #[test]
    fn persist_failure_on_empty_store_leaves_it_empty() {
        let store = Arc::new(BrokenKey {
            inner: MemoryStore::new(),
            broken: USER_DATA_KEY,
        });
        let session = AuthSession::restore(transport(), store.clone());

        assert!(session.persist(&ash(), &Credential::new("tok-2")).is_err());
        assert!(store.get(AUTH_TOKEN_KEY).is_none());
        assert!(store.inner.is_empty());
    }
}

//! Session lifecycle and authenticated call mediation.
//!
//! The controller owns the session token. Every authenticated gateway call
//! goes through [`SessionController::authorized`], which fails fast without a
//! token and tears the session down when the backend rejects the credential.
//!
//! State transitions:
//! - Unauthenticated -> Authenticating (login submitted)
//! - Authenticating -> Authenticated (token issued)
//! - Authenticating -> Unauthenticated (login rejected)
//! - Authenticated -> Unauthenticated (logout or forced logout)

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, watch, RwLock};

use crate::credential::CredentialStore;
use crate::error::{ClientError, Result};
use crate::gateway::Gateway;
use crate::models::{SignupRequest, User};

const EVENT_CAPACITY: usize = 16;

/// Authentication state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unauthenticated => write!(f, "Unauthenticated"),
            SessionState::Authenticating => write!(f, "Authenticating"),
            SessionState::Authenticated => write!(f, "Authenticated"),
        }
    }
}

impl SessionState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Unauthenticated, SessionState::Authenticating)
                | (SessionState::Authenticating, SessionState::Authenticated)
                | (SessionState::Authenticating, SessionState::Unauthenticated)
                | (SessionState::Authenticated, SessionState::Unauthenticated)
        )
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out.
    UserRequested,
    /// The backend rejected the credential on an authenticated call.
    AuthRejected(String),
    /// An authenticated action was attempted without a token.
    MissingToken,
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogoutReason::UserRequested => write!(f, "user requested"),
            LogoutReason::AuthRejected(detail) => write!(f, "credential rejected: {detail}"),
            LogoutReason::MissingToken => write!(f, "no session token"),
        }
    }
}

/// Session notifications for the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut(LogoutReason),
}

/// Result of a user-initiated logout. The local session is always gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOutcome {
    /// Whether the backend was told about the logout and accepted it.
    pub backend_acknowledged: bool,
    /// Backend failure, if the notify call failed.
    pub error: Option<ClientError>,
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    token: Option<String>,
    /// Bumped on every login and every teardown.
    generation: u64,
}

/// Owner of the session token and the authentication state machine.
pub struct SessionController {
    gateway: Arc<dyn Gateway>,
    store: Arc<dyn CredentialStore>,
    inner: RwLock<Inner>,
    state_tx: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(gateway: Arc<dyn Gateway>, store: Arc<dyn CredentialStore>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unauthenticated);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            store,
            inner: RwLock::new(Inner {
                state: SessionState::Unauthenticated,
                token: None,
                generation: 0,
            }),
            state_tx,
            events,
        }
    }

    /// Restore a persisted token, if any. Call once at startup.
    pub async fn init(&self) -> SessionState {
        let persisted = match self.store.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted session, starting signed out");
                None
            }
        };

        let mut inner = self.inner.write().await;
        if let Some(token) = persisted {
            inner.token = Some(token);
            inner.state = SessionState::Authenticated;
            inner.generation += 1;
            tracing::info!(generation = inner.generation, "Restored persisted session");
        }
        self.state_tx.send_replace(inner.state);
        inner.state
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state().await == SessionState::Authenticated
    }

    /// Current token. The only read path for the credential.
    pub async fn token(&self) -> Option<String> {
        self.inner.read().await.token.clone()
    }

    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }

    /// Whether `generation` still names the live session.
    pub async fn is_current(&self, generation: u64) -> bool {
        let inner = self.inner.read().await;
        inner.token.is_some() && inner.generation == generation
    }

    /// Run `apply` only if `generation` is still the live session. The
    /// session cannot end while `apply` runs.
    pub async fn with_current<R>(&self, generation: u64, apply: impl FnOnce() -> R) -> Option<R> {
        let inner = self.inner.read().await;
        if inner.token.is_some() && inner.generation == generation {
            Some(apply())
        } else {
            tracing::debug!(
                stale = generation,
                current = inner.generation,
                "Discarding result from a superseded session"
            );
            None
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Exchange credentials for a token and enter the Authenticated state.
    ///
    /// The username is trimmed; the password is sent verbatim.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "username and password are required".into(),
            ));
        }

        {
            let mut inner = self.inner.write().await;
            if !inner.state.can_transition_to(&SessionState::Authenticating) {
                return Err(ClientError::Validation(match inner.state {
                    SessionState::Authenticating => "sign-in already in progress".into(),
                    _ => "already signed in, log out first".into(),
                }));
            }
            inner.state = SessionState::Authenticating;
            self.state_tx.send_replace(inner.state);
        }

        let issued = self
            .gateway
            .login(username, password)
            .await
            .and_then(|response| {
                if response.access_token.trim().is_empty() {
                    Err(ClientError::Auth("backend issued an empty token".into()))
                } else {
                    Ok(response.access_token)
                }
            });

        let mut inner = self.inner.write().await;
        match issued {
            Ok(token) => {
                if let Err(e) = self.store.save(&token) {
                    tracing::warn!(error = %e, "Failed to persist session token");
                }
                inner.token = Some(token);
                inner.state = SessionState::Authenticated;
                inner.generation += 1;
                self.state_tx.send_replace(inner.state);
                tracing::info!(generation = inner.generation, "Signed in");
                let _ = self.events.send(SessionEvent::LoggedIn);
                Ok(())
            }
            Err(e) => {
                inner.state = SessionState::Unauthenticated;
                self.state_tx.send_replace(inner.state);
                tracing::warn!(kind = e.kind(), error = %e, "Sign-in failed");
                Err(e)
            }
        }
    }

    /// Create an account. Does not sign in.
    pub async fn signup(&self, name: &str, username: &str, password: &str) -> Result<User> {
        let request = SignupRequest {
            name: name.trim().to_string(),
            username: username.trim().to_string(),
            hashed_password: password.to_string(),
        };
        if request.name.is_empty() || request.username.is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "name, username and password are required".into(),
            ));
        }

        match self.gateway.create_user(&request).await {
            Ok(user) => {
                tracing::info!(username = %request.username, "Account created");
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Sign-up failed");
                Err(e)
            }
        }
    }

    /// Drop the session locally and notify subscribers.
    ///
    /// Returns `false` when there was no session to tear down. Repeated calls
    /// are harmless.
    pub async fn force_logout(&self, reason: LogoutReason) -> bool {
        let mut inner = self.inner.write().await;
        self.teardown(&mut inner, reason)
    }

    /// Like [`force_logout`](Self::force_logout), but only if `generation`
    /// is still the live session.
    pub async fn force_logout_if_current(&self, generation: u64, reason: LogoutReason) -> bool {
        let mut inner = self.inner.write().await;
        if inner.generation != generation {
            tracing::debug!(
                stale = generation,
                current = inner.generation,
                "Ignoring teardown for a superseded session"
            );
            return false;
        }
        self.teardown(&mut inner, reason)
    }

    fn teardown(&self, inner: &mut Inner, reason: LogoutReason) -> bool {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted session token");
        }

        let had_session = inner.token.is_some() || inner.state == SessionState::Authenticated;
        if !had_session {
            return false;
        }

        inner.token = None;
        inner.state = SessionState::Unauthenticated;
        inner.generation += 1;
        self.state_tx.send_replace(inner.state);
        tracing::info!(reason = %reason, generation = inner.generation, "Session ended");
        let _ = self.events.send(SessionEvent::LoggedOut(reason));
        true
    }

    /// Notify the backend, then clear the local session regardless of the
    /// backend's answer.
    pub async fn logout(&self) -> LogoutOutcome {
        let outcome = match self.token().await {
            Some(token) => match self.gateway.logout(&token).await {
                Ok(_) => LogoutOutcome {
                    backend_acknowledged: true,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(kind = e.kind(), error = %e, "Backend logout failed");
                    LogoutOutcome {
                        backend_acknowledged: false,
                        error: Some(e),
                    }
                }
            },
            None => LogoutOutcome {
                backend_acknowledged: false,
                error: None,
            },
        };

        self.force_logout(LogoutReason::UserRequested).await;
        outcome
    }

    /// Run an authenticated gateway call with the current token.
    pub async fn authorized<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn Gateway>, String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.authorized_scoped(op).await.map(|(value, _)| value)
    }

    /// Like [`authorized`](Self::authorized), also returning the session
    /// generation the call ran under.
    ///
    /// Only the call whose rejection ends the session sees the auth error.
    /// Calls rejected after another one already ended it fail with
    /// [`ClientError::NotAuthenticated`].
    pub async fn authorized_scoped<T, F, Fut>(&self, op: F) -> Result<(T, u64)>
    where
        F: FnOnce(Arc<dyn Gateway>, String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (token, generation) = {
            let inner = self.inner.read().await;
            (inner.token.clone(), inner.generation)
        };

        let Some(token) = token else {
            self.force_logout(LogoutReason::MissingToken).await;
            return Err(ClientError::NotAuthenticated);
        };

        match op(Arc::clone(&self.gateway), token).await {
            Ok(value) => Ok((value, generation)),
            Err(e) if e.is_auth() => {
                let reason = LogoutReason::AuthRejected(e.to_string());
                if self.force_logout_if_current(generation, reason).await {
                    Err(e)
                } else {
                    Err(ClientError::NotAuthenticated)
                }
            }
            Err(e) => Err(e),
        }
    }
}

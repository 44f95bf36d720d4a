//! The client-side authentication state machine.
//!
//! One [`SessionContext`] exists per client instance (one tab, one
//! process).  Transitions:
//!
//! ```text
//! unauthenticated -> authenticating -> authenticated
//!                                   -> error -> authenticating (retry)
//! authenticated -> unauthenticated (logout)
//! ```
//!
//! Only one authentication attempt runs at a time: a second call while one
//! is in flight waits for it and reports its outcome instead of launching
//! a parallel verification.  Dropping an in-flight call leaves the context
//! in `Authenticating` with no retained side effects; the next call simply
//! starts over.

use std::sync::Mutex;

use tracing::{info, warn};

use quizon_shared::{AppUser, AuthError};

use crate::backend::AuthBackend;
use crate::cache::SessionCache;

/// Where the session currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    Unauthenticated,
    Authenticating,
    /// `verified` is false when the user came from the local cache rather
    /// than a fresh gateway round-trip.
    Authenticated { user: AppUser, verified: bool },
    /// Terminal failure with its taxonomy kind, never a bare string, so
    /// the UI can pick a localized message and offer a retry.
    Error { kind: AuthError },
}

/// Client-scoped session state and the operations that move it.
pub struct SessionContext<B: AuthBackend> {
    backend: B,
    cache: Option<SessionCache>,
    status: Mutex<AuthStatus>,
    attempt: tokio::sync::Mutex<()>,
}

impl<B: AuthBackend> SessionContext<B> {
    pub fn new(backend: B, cache: Option<SessionCache>) -> Self {
        Self {
            backend,
            cache,
            status: Mutex::new(AuthStatus::Unauthenticated),
            attempt: tokio::sync::Mutex::new(()),
        }
    }

    /// Load the cached user, if any, and short-circuit to `Authenticated`.
    ///
    /// The result is marked unverified: it lets the UI render immediately
    /// but grants no trust until [`authenticate`](Self::authenticate) has
    /// run against the server.
    pub fn bootstrap(&self) -> AuthStatus {
        let status = match self.cache.as_ref().and_then(SessionCache::load) {
            Some(user) => {
                info!(telegram_id = user.telegram_id, "session restored from cache");
                AuthStatus::Authenticated {
                    user,
                    verified: false,
                }
            }
            None => AuthStatus::Unauthenticated,
        };
        self.set_status(status.clone());
        status
    }

    /// Run one signed login against the server.
    ///
    /// Concurrent calls collapse into the in-flight attempt: the second
    /// caller waits and observes the settled status.
    pub async fn authenticate(&self, init_data: &str) -> AuthStatus {
        let _guard = match self.attempt.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                let _settled = self.attempt.lock().await;
                return self.status();
            }
        };

        self.set_status(AuthStatus::Authenticating);

        let status = match self.backend.login(init_data).await {
            Ok(outcome) => {
                if outcome.is_new_user {
                    info!(telegram_id = outcome.user.telegram_id, "new user created");
                }
                if let Some(cache) = &self.cache {
                    cache.store(&outcome.user);
                }
                AuthStatus::Authenticated {
                    user: outcome.user,
                    verified: true,
                }
            }
            Err(kind) => {
                warn!(kind = kind.code(), error = %kind, "authentication failed");
                AuthStatus::Error { kind }
            }
        };

        self.set_status(status.clone());
        status
    }

    /// Explicit retry from the `Error` state.  Identical to
    /// [`authenticate`](Self::authenticate); named separately because the
    /// UI wires it to a button.
    pub async fn retry(&self, init_data: &str) -> AuthStatus {
        self.authenticate(init_data).await
    }

    /// Drop the session and the cached user.
    pub fn logout(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        self.set_status(AuthStatus::Unauthenticated);
        info!("logged out");
    }

    pub fn status(&self) -> AuthStatus {
        self.lock_status().clone()
    }

    pub fn current_user(&self) -> Option<AppUser> {
        match &*self.lock_status() {
            AuthStatus::Authenticated { user, .. } => Some(user.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(&*self.lock_status(), AuthStatus::Authenticated { .. })
    }

    fn set_status(&self, status: AuthStatus) {
        *self.lock_status() = status;
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, AuthStatus> {
        // Status updates cannot panic while holding the lock, but recover
        // from poisoning anyway rather than crashing the UI.
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

//! Session store — authentication state machine over an identity provider.
//!
//! STATES
//! ======
//! - `Unconfigured`: no backend at startup. Terminal; every operation fails
//!   with `SessionError::NotConfigured` and nothing changes.
//! - `Pending`: waiting for the provider's first report.
//! - `Unauthenticated` / `Authenticated(identity)`: driven by the provider's
//!   change feed and by explicit signup/login/logout.
//!
//! ORDERING
//! ========
//! One listener task consumes the provider subscription. Explicit operations
//! and the listener serialize on `op_lock`. Each operation reads the
//! provider's latest sequence number as soon as the provider call returns and
//! records it as a floor when it settles. Feed events at or below the floor
//! were emitted before the provider answered and are discarded; anything
//! published afterwards (say, token expiry during the signup document write)
//! still applies. That keeps an early "no identity" report from undoing a
//! login that completed after it was queued.
//!
//! KNOWN GAP
//! =========
//! Signup is two writes (identity, then profile document) with no
//! compensation. If the document write fails the identity still exists,
//! the session still becomes authenticated, and the caller gets
//! `SessionError::ProfileWrite`.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::documents::{DocumentStore, ProfileDocument, USERS_COLLECTION, now_rfc3339};
use crate::error::SessionError;
use crate::identity::{Identity, IdentityChange, IdentityProvider, Subscription, Watermark};

// =============================================================================
// BACKEND
// =============================================================================

/// The two remote collaborators a configured session needs.
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider>,
    pub documents: Arc<dyn DocumentStore>,
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Unconfigured,
    Pending,
    Unauthenticated,
    Authenticated,
}

/// Read model of the current authentication state.
///
/// `identity` is `Some` exactly when `status` is `Authenticated`.
/// `generation` increases on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    status: SessionStatus,
    identity: Option<Identity>,
    generation: u64,
}

impl Session {
    fn unconfigured() -> Self {
        Self { status: SessionStatus::Unconfigured, identity: None, generation: 0 }
    }

    fn pending() -> Self {
        Self { status: SessionStatus::Pending, identity: None, generation: 0 }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while the provider has not reported yet.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Pending
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Apply a provider report. Returns whether anything observable changed.
    ///
    /// A report of the same uid is not a transition: the identity's fields
    /// are refreshed but `generation` stays put.
    fn apply(&mut self, next: Option<Identity>) -> bool {
        match (self.status, next) {
            (SessionStatus::Unconfigured, _) | (SessionStatus::Unauthenticated, None) => false,
            (_, None) => {
                self.status = SessionStatus::Unauthenticated;
                self.identity = None;
                self.generation += 1;
                true
            }
            (_, Some(identity)) => {
                if let Some(current) = &self.identity {
                    if current.uid == identity.uid {
                        if *current == identity {
                            return false;
                        }
                        self.identity = Some(identity);
                        return true;
                    }
                }
                self.status = SessionStatus::Authenticated;
                self.identity = Some(identity);
                self.generation += 1;
                true
            }
        }
    }
}

/// Profile fields collected at signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupProfile {
    pub full_name: String,
    pub phone_number: String,
}

// =============================================================================
// STORE
// =============================================================================

struct Live {
    backend: Backend,
    watermark: Watermark,
}

struct StoreInner {
    state: watch::Sender<Session>,
    live: Option<Live>,
    op_lock: AsyncMutex<()>,
    /// Feed events with `seq <= floor` predate the last explicit operation.
    floor: Mutex<Option<u64>>,
}

impl StoreInner {
    fn new(initial: Session, live: Option<Live>) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state, live, op_lock: AsyncMutex::new(()), floor: Mutex::new(None) }
    }

    fn transition(&self, next: Option<Identity>, cause: &'static str) {
        let mut moved = None;
        self.state.send_if_modified(|session| {
            let from = session.status;
            let changed = session.apply(next);
            if changed && from != session.status {
                moved = Some((from, session.status, session.generation));
            }
            changed
        });
        if let Some((from, to, generation)) = moved {
            info!(?from, ?to, generation, cause, "session transition");
        }
    }

    fn on_change(&self, change: IdentityChange) {
        let floor = *self
            .floor
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(floor) = floor {
            if change.seq <= floor {
                debug!(seq = change.seq, floor, "discarding stale identity change");
                return;
            }
        }
        self.transition(change.identity, "provider");
    }

    /// Record the outcome of an explicit operation. `floor` is the provider
    /// sequence observed when the provider call returned; later events still
    /// apply.
    fn settle(&self, floor: u64, next: Option<Identity>, cause: &'static str) {
        *self
            .floor
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(floor);
        self.transition(next, cause);
    }
}

async fn listen(inner: Arc<StoreInner>, mut subscription: Subscription) {
    while let Some(change) = subscription.recv().await {
        let _op = inner.op_lock.lock().await;
        inner.on_change(change);
    }
    debug!("identity change feed closed");
}

/// Owner of the process's single `Session`.
///
/// Holds one standing provider subscription for its lifetime; dropping the
/// store (or calling [`SessionStore::shutdown`]) releases it.
pub struct SessionStore {
    inner: Arc<StoreInner>,
    listener: Option<JoinHandle<()>>,
}

impl SessionStore {
    /// Start the store. With a backend this subscribes to the provider and
    /// must run inside a Tokio runtime; without one the store is `Unconfigured`.
    #[must_use]
    pub fn start(backend: Option<Backend>) -> Self {
        let Some(backend) = backend else {
            info!("session store started unconfigured");
            return Self { inner: Arc::new(StoreInner::new(Session::unconfigured(), None)), listener: None };
        };

        let subscription = backend.identity.subscribe();
        let watermark = subscription.watermark();
        let inner = Arc::new(StoreInner::new(Session::pending(), Some(Live { backend, watermark })));
        let listener = tokio::spawn(listen(Arc::clone(&inner), subscription));
        info!("session store started; waiting for provider");
        Self { inner, listener: Some(listener) }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.live.is_some()
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every session change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Document store of the configured backend.
    #[must_use]
    pub fn documents(&self) -> Option<Arc<dyn DocumentStore>> {
        self.inner
            .live
            .as_ref()
            .map(|live| Arc::clone(&live.backend.documents))
    }

    fn live(&self) -> Result<&Live, SessionError> {
        self.inner
            .live
            .as_ref()
            .ok_or(SessionError::NotConfigured)
    }

    /// Create an identity, then its profile document.
    ///
    /// # Errors
    ///
    /// `NotConfigured` without a backend, `Provider` if identity creation fails,
    /// `ProfileWrite` if the identity was created but the document was not.
    pub async fn signup(&self, email: &str, password: &str, profile: SignupProfile) -> Result<Identity, SessionError> {
        let live = self.live()?;
        let _op = self.inner.op_lock.lock().await;

        let identity = live
            .backend
            .identity
            .create_identity(email, password)
            .await
            .inspect_err(|e| warn!(error = %e, "signup rejected by provider"))?;
        let floor = live.watermark.current();

        let document = ProfileDocument {
            full_name: profile.full_name,
            phone_number: profile.phone_number,
            email: email.to_owned(),
            created_at: now_rfc3339(),
        };
        let write = live
            .backend
            .documents
            .put(USERS_COLLECTION, &identity.uid, document.to_record())
            .await;

        self.inner.settle(floor, Some(identity.clone()), "signup");

        match write {
            Ok(()) => {
                info!(uid = %identity.uid, "signup succeeded");
                Ok(identity)
            }
            Err(source) => {
                error!(uid = %identity.uid, error = %source, "profile document write failed; identity has no profile");
                Err(SessionError::ProfileWrite { uid: identity.uid, source })
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// `NotConfigured` without a backend, `Provider` for any provider failure
    /// (including `InvalidCredentials`). The session is unchanged on error.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, SessionError> {
        let live = self.live()?;
        let _op = self.inner.op_lock.lock().await;

        let identity = live
            .backend
            .identity
            .authenticate(email, password)
            .await
            .inspect_err(|e| warn!(error = %e, "login rejected by provider"))?;

        self.inner
            .settle(live.watermark.current(), Some(identity.clone()), "login");
        info!(uid = %identity.uid, "login succeeded");
        Ok(identity)
    }

    /// End the provider session. Succeeds as a no-op when already signed out.
    ///
    /// # Errors
    ///
    /// `NotConfigured` without a backend, `Provider` if the provider fails.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let live = self.live()?;
        let _op = self.inner.op_lock.lock().await;

        live.backend
            .identity
            .end_session()
            .await
            .inspect_err(|e| warn!(error = %e, "logout failed"))?;

        self.inner
            .settle(live.watermark.current(), None, "logout");
        info!("logout succeeded");
        Ok(())
    }

    /// Release the provider subscription.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            debug!("session listener stopped");
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

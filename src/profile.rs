//! Profile reconciler — merges the identity with its profile document.
//!
//! DESIGN
//! ======
//! `reconcile` is the pure merge policy. `ProfileReconciler` runs it once per
//! session transition into an authenticated identity, and again when the
//! provider refreshes that identity's fields:
//! - document found: document fields win, identity email backs up email
//! - document missing: identity fields, not degraded
//! - read failed: identity fields, degraded, error logged
//!
//! Empty strings count as absent at every step.
//!
//! STALENESS
//! =========
//! Each read carries a ticket `(session generation, identity)`. A result is
//! applied only while its ticket is still the active one, so a slow read for
//! identity A never overwrites the view built for B, and a read that outlives
//! logout is dropped. Failed reads are not retried.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error};

use crate::documents::{DocumentStore, ProfileDocument, USERS_COLLECTION};
use crate::error::StoreError;
use crate::identity::Identity;
use crate::session::Session;

pub const FALLBACK_FULL_NAME: &str = "User";
pub const FALLBACK_PHONE_NUMBER: &str = "Not provided";

// =============================================================================
// VIEW
// =============================================================================

/// Where a `ProfileView`'s fields came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    Document,
    MissingDocument,
    ReadFailed,
}

/// Read-only merge of an identity and its profile document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    /// Set when the document read failed and fields are identity fallbacks.
    pub degraded: bool,
    pub source: ProfileSource,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn fallback(identity: &Identity, source: ProfileSource) -> ProfileView {
    ProfileView {
        full_name: present(identity.display_name.as_deref())
            .unwrap_or(FALLBACK_FULL_NAME)
            .to_owned(),
        email: present(identity.email.as_deref())
            .unwrap_or_default()
            .to_owned(),
        phone_number: FALLBACK_PHONE_NUMBER.to_owned(),
        degraded: source == ProfileSource::ReadFailed,
        source,
    }
}

/// Merge policy for one read outcome.
#[must_use]
pub fn reconcile(identity: &Identity, read: &Result<Option<ProfileDocument>, StoreError>) -> ProfileView {
    match read {
        Ok(Some(doc)) => ProfileView {
            full_name: present(Some(doc.full_name.as_str()))
                .unwrap_or(FALLBACK_FULL_NAME)
                .to_owned(),
            email: present(Some(doc.email.as_str()))
                .or_else(|| present(identity.email.as_deref()))
                .unwrap_or_default()
                .to_owned(),
            phone_number: present(Some(doc.phone_number.as_str()))
                .unwrap_or(FALLBACK_PHONE_NUMBER)
                .to_owned(),
            degraded: false,
            source: ProfileSource::Document,
        },
        Ok(None) => fallback(identity, ProfileSource::MissingDocument),
        Err(_) => fallback(identity, ProfileSource::ReadFailed),
    }
}

/// Read the identity's profile document and reconcile. Never fails; a read
/// error is logged and shows up as `degraded`.
pub async fn fetch_profile(documents: &dyn DocumentStore, identity: &Identity) -> ProfileView {
    let read = documents
        .get(USERS_COLLECTION, &identity.uid)
        .await
        .map(|record| record.as_ref().map(ProfileDocument::from_record));
    match &read {
        Ok(Some(_)) => debug!(uid = %identity.uid, "profile document loaded"),
        Ok(None) => debug!(uid = %identity.uid, "no profile document; using identity fields"),
        Err(e) => error!(uid = %identity.uid, error = %e, "profile read failed; using identity fields"),
    }
    reconcile(identity, &read)
}

// =============================================================================
// STATE
// =============================================================================

/// Read model exposed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProfileState {
    /// No authenticated identity.
    #[default]
    Cleared,
    /// A read for `uid` is in flight. Stays here if the read hangs.
    Loading { uid: String },
    Ready { uid: String, view: ProfileView },
}

impl ProfileState {
    #[must_use]
    pub fn view(&self) -> Option<&ProfileView> {
        match self {
            Self::Ready { view, .. } => Some(view),
            Self::Cleared | Self::Loading { .. } => None,
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Error flag: the current view was built after a failed read.
    #[must_use]
    pub fn degraded(&self) -> bool {
        self.view().is_some_and(|v| v.degraded)
    }
}

// =============================================================================
// RECONCILER
// =============================================================================

/// Identifies one read. A same-uid refresh of the identity's fields keeps the
/// generation but still changes the ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticket {
    generation: u64,
    identity: Identity,
}

struct ReconcilerInner {
    state: watch::Sender<ProfileState>,
    active: Mutex<Option<Ticket>>,
}

impl ReconcilerInner {
    fn new() -> Self {
        let (state, _) = watch::channel(ProfileState::Cleared);
        Self { state, active: Mutex::new(None) }
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Option<Ticket>> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// React to a session snapshot. Returns the identity to read, if a new
    /// read is needed.
    fn observe(&self, session: &Session) -> Option<Ticket> {
        let mut active = self.active();
        let Some(identity) = session.identity() else {
            if active.take().is_some() {
                self.state.send_replace(ProfileState::Cleared);
                debug!("profile cleared");
            }
            return None;
        };

        let ticket = Ticket { generation: session.generation(), identity: identity.clone() };
        if active.as_ref() == Some(&ticket) {
            return None;
        }
        *active = Some(ticket.clone());
        self.state
            .send_replace(ProfileState::Loading { uid: identity.uid.clone() });
        Some(ticket)
    }

    /// Apply a finished read if its ticket is still current.
    fn complete(&self, ticket: &Ticket, view: ProfileView) -> bool {
        let active = self.active();
        if active.as_ref() != Some(ticket) {
            debug!(uid = %ticket.identity.uid, generation = ticket.generation, "discarding stale profile read");
            return false;
        }
        self.state
            .send_replace(ProfileState::Ready { uid: ticket.identity.uid.clone(), view });
        true
    }

    fn clear(&self) {
        self.active().take();
        self.state.send_replace(ProfileState::Cleared);
    }
}

async fn drive(inner: Arc<ReconcilerInner>, documents: Arc<dyn DocumentStore>, mut session: watch::Receiver<Session>) {
    let mut reads = JoinSet::new();
    loop {
        let snapshot = session.borrow_and_update().clone();
        if let Some(ticket) = inner.observe(&snapshot) {
            let inner = Arc::clone(&inner);
            let documents = Arc::clone(&documents);
            reads.spawn(async move {
                let view = fetch_profile(documents.as_ref(), &ticket.identity).await;
                inner.complete(&ticket, view);
            });
        }

        tokio::select! {
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(_) = reads.join_next(), if !reads.is_empty() => {}
        }
    }
    debug!("session closed; profile reconciler stopping");
}

/// Keeps a `ProfileState` in step with the session.
pub struct ProfileReconciler {
    inner: Arc<ReconcilerInner>,
    driver: Option<JoinHandle<()>>,
}

impl ProfileReconciler {
    /// Start following `session`. Without a document store (unconfigured
    /// backend) the state stays `Cleared`. Must run inside a Tokio runtime
    /// when `documents` is `Some`.
    #[must_use]
    pub fn start(session: watch::Receiver<Session>, documents: Option<Arc<dyn DocumentStore>>) -> Self {
        let inner = Arc::new(ReconcilerInner::new());
        let driver = documents.map(|documents| tokio::spawn(drive(Arc::clone(&inner), documents, session)));
        Self { inner, driver }
    }

    #[must_use]
    pub fn state(&self) -> ProfileState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ProfileState> {
        self.inner.state.subscribe()
    }

    /// Wait until a view for `uid` is ready. No timeout is applied here.
    pub async fn wait_ready(&self, uid: &str) -> Option<ProfileView> {
        let mut rx = self.watch();
        let state = rx
            .wait_for(|s| matches!(s, ProfileState::Ready { uid: ready, .. } if ready == uid))
            .await
            .ok()?;
        state.view().cloned()
    }

    /// Stop following the session; in-flight reads are dropped and the view cleared.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.inner.clear();
    }
}

impl Drop for ProfileReconciler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;

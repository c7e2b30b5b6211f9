//! Identity provider seam — the authentication principal and its change feed.
//!
//! DESIGN
//! ======
//! Providers report identity changes through a `ChangeNotifier`. Each change
//! is stamped with a monotonically increasing sequence number so consumers
//! can tell a notification that was queued before some other event from one
//! that came after it. Subscribers receive the current identity (possibly
//! `None`) as their first event, the way hosted identity SDKs behave.
//!
//! LIFECYCLE
//! =========
//! `subscribe()` registers an unbounded channel. Dropping the returned
//! `Subscription` unregisters it; there is no other unsubscribe path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;

// =============================================================================
// IDENTITY
// =============================================================================

/// Authentication principal issued by the identity provider. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable, provider-assigned identifier.
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

impl Identity {
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into(), display_name: None, email: None, email_verified: false }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// One notification from the provider's change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityChange {
    pub seq: u64,
    pub identity: Option<Identity>,
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// Remote, fallible identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a new identity and make it the provider's current one.
    async fn create_identity(&self, email: &str, password: &str) -> Result<Identity, ProviderError>;

    /// Sign in with email and password.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Identity, ProviderError>;

    /// End the provider session. Succeeds when no session is active.
    async fn end_session(&self) -> Result<(), ProviderError>;

    /// Open a change feed. The first event is the current identity.
    fn subscribe(&self) -> Subscription;
}

// =============================================================================
// CHANGE NOTIFIER
// =============================================================================

/// Fan-out of identity changes to every live subscription.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<Mutex<NotifierInner>>,
    seq: Arc<AtomicU64>,
}

#[derive(Default)]
struct NotifierInner {
    current: Option<Identity>,
    next_id: u64,
    subscribers: HashMap<u64, mpsc::UnboundedSender<IdentityChange>>,
}

impl ChangeNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity most recently published.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.lock().current.clone()
    }

    /// Record `identity` as current and deliver it to all subscribers.
    /// Returns the sequence number assigned to the change.
    pub fn publish(&self, identity: Option<Identity>) -> u64 {
        let mut inner = self.lock();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        inner.current.clone_from(&identity);
        let change = IdentityChange { seq, identity };
        inner
            .subscribers
            .retain(|_, tx| tx.send(change.clone()).is_ok());
        seq
    }

    /// Open a subscription primed with the current identity.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        let initial = IdentityChange { seq: self.seq.load(Ordering::SeqCst), identity: inner.current.clone() };
        // Receiver is alive in this scope; send cannot fail.
        let _ = tx.send(initial);
        inner.subscribers.insert(id, tx);

        Subscription {
            id,
            events: rx,
            notifier: Arc::downgrade(&self.inner),
            watermark: Watermark(Arc::clone(&self.seq)),
        }
    }

    /// Number of subscriptions still open.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock()
            .subscribers
            .values()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NotifierInner> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Live handle on a provider change feed. Drop to unsubscribe.
pub struct Subscription {
    id: u64,
    events: mpsc::UnboundedReceiver<IdentityChange>,
    notifier: Weak<Mutex<NotifierInner>>,
    watermark: Watermark,
}

impl Subscription {
    /// Next change, or `None` once the provider is gone.
    pub async fn recv(&mut self) -> Option<IdentityChange> {
        self.events.recv().await
    }

    /// Handle that reports the latest sequence number issued by the provider.
    #[must_use]
    pub fn watermark(&self) -> Watermark {
        self.watermark.clone()
    }

    /// Explicit form of dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.notifier.upgrade() {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .remove(&self.id);
        }
    }
}

/// Read side of the provider's sequence counter.
#[derive(Debug, Clone)]
pub struct Watermark(Arc<AtomicU64>);

impl Watermark {
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;

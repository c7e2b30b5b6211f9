//! In-memory identity provider and document store.
//!
//! DESIGN
//! ======
//! Both types honor the same contracts as the Firebase adapters and add
//! switches for the failure modes the core has to survive: an offline
//! document store, failed writes after identity creation, out-of-band
//! session loss, and reads that resolve out of order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use uuid::Uuid;

use crate::documents::{DocumentStore, Record};
use crate::error::{ProviderError, StoreError};
use crate::identity::{ChangeNotifier, Identity, IdentityProvider, Subscription};

const MIN_PASSWORD_LEN: usize = 6;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// IDENTITY PROVIDER
// =============================================================================

struct Account {
    password: String,
    identity: Identity,
}

/// Identity provider backed by a `HashMap` of accounts keyed by email.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    notifier: ChangeNotifier,
    offline: AtomicBool,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account without signing it in.
    pub fn seed_account(&self, email: &str, password: &str, display_name: Option<&str>) -> Identity {
        let mut identity = Identity::new(Uuid::new_v4().simple().to_string()).with_email(normalize(email));
        identity.display_name = display_name.map(str::to_owned);
        lock(&self.accounts).insert(
            normalize(email),
            Account { password: password.to_owned(), identity: identity.clone() },
        );
        identity
    }

    /// Identity the provider currently considers signed in.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.notifier.current()
    }

    /// Drop the current session as if the token expired elsewhere.
    pub fn expire_session(&self) {
        if self.notifier.current().is_some() {
            self.notifier.publish(None);
        }
    }

    /// Change an account's display name. If that account is signed in, the
    /// refreshed identity is published under the same uid.
    pub fn update_display_name(&self, email: &str, display_name: &str) -> Option<Identity> {
        let identity = {
            let mut accounts = lock(&self.accounts);
            let account = accounts.get_mut(&normalize(email))?;
            account.identity.display_name = Some(display_name.to_owned());
            account.identity.clone()
        };
        if self
            .notifier
            .current()
            .is_some_and(|current| current.uid == identity.uid)
        {
            self.notifier.publish(Some(identity.clone()));
        }
        Some(identity)
    }

    /// Make every call fail with a request error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }

    #[must_use]
    pub fn account_exists(&self, email: &str) -> bool {
        lock(&self.accounts).contains_key(&normalize(email))
    }

    fn check_online(&self) -> Result<(), ProviderError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ProviderError::Request("identity provider unreachable".into()));
        }
        Ok(())
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_identity(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        self.check_online()?;
        let email = normalize(email);
        if !email.contains('@') {
            return Err(ProviderError::InvalidEmail);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ProviderError::WeakPassword(format!(
                "password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let identity = {
            let mut accounts = lock(&self.accounts);
            if accounts.contains_key(&email) {
                return Err(ProviderError::EmailInUse);
            }
            let identity = Identity::new(Uuid::new_v4().simple().to_string()).with_email(email.clone());
            accounts.insert(email, Account { password: password.to_owned(), identity: identity.clone() });
            identity
        };

        self.notifier.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        self.check_online()?;
        let identity = {
            let accounts = lock(&self.accounts);
            match accounts.get(&normalize(email)) {
                Some(account) if account.password == password => account.identity.clone(),
                _ => return Err(ProviderError::InvalidCredentials),
            }
        };
        self.notifier.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn end_session(&self) -> Result<(), ProviderError> {
        self.check_online()?;
        if self.notifier.current().is_some() {
            self.notifier.publish(None);
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }
}

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// Holds back the next read of one key until released.
#[derive(Clone)]
pub struct ReadGate(Arc<Notify>);

impl ReadGate {
    pub fn release(&self) {
        self.0.notify_one();
    }
}

/// Document store backed by a `HashMap` keyed by `(collection, key)`.
#[derive(Default)]
pub struct MemoryDocumentStore {
    records: Mutex<HashMap<(String, String), Record>>,
    gates: Mutex<HashMap<String, ReadGate>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing failure switches.
    pub fn seed(&self, collection: &str, key: &str, record: Record) {
        lock(&self.records).insert((collection.to_owned(), key.to_owned()), record);
    }

    /// Stored record, bypassing failure switches and gates.
    #[must_use]
    pub fn peek(&self, collection: &str, key: &str) -> Option<Record> {
        lock(&self.records)
            .get(&(collection.to_owned(), key.to_owned()))
            .cloned()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Park the next `get` of `key` (any collection) until the gate is released.
    #[must_use]
    pub fn hold_next_read(&self, key: &str) -> ReadGate {
        let gate = ReadGate(Arc::new(Notify::new()));
        lock(&self.gates).insert(key.to_owned(), gate.clone());
        gate
    }

    /// Number of stored records across all collections.
    #[must_use]
    pub fn record_count(&self) -> usize {
        lock(&self.records).len()
    }

    /// Number of `get` calls served so far, failed ones included.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, collection: &str, key: &str, record: Record) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Request("document store unreachable".into()));
        }
        lock(&self.records).insert((collection.to_owned(), key.to_owned()), record);
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Record>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.gates).remove(key);
        if let Some(gate) = gate {
            gate.0.notified().await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::PermissionDenied("missing or insufficient permissions".into()));
        }
        Ok(self.peek(collection, key))
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

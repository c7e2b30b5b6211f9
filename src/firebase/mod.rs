//! Firebase — REST adapters for the identity and document seams.
//!
//! DESIGN
//! ======
//! `FirebaseAuth` talks to the Identity Toolkit REST API and keeps the
//! signed-in ID token in memory. `FirestoreStore` talks to the Firestore v1
//! REST API and authenticates with that token. Both share one
//! `reqwest::Client` built with the configured timeouts.
//!
//! Token refresh is left to the provider: when an ID token reaches its
//! `expiresIn` the adapter reports the identity as lost.

pub mod auth;
pub mod firestore;

use std::sync::Arc;
use std::time::Duration;

pub use auth::FirebaseAuth;
pub use firestore::FirestoreStore;

use crate::config::{FirebaseConfig, HttpTimeouts};
use crate::error::ProviderError;
use crate::session::Backend;

pub(crate) fn http_client(timeouts: HttpTimeouts) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
        .map_err(|e| ProviderError::HttpClientBuild(e.to_string()))
}

/// Build the identity provider and document store for `config`.
///
/// # Errors
///
/// Returns an error if the HTTP client fails to build.
pub fn backend(config: &FirebaseConfig) -> Result<Backend, ProviderError> {
    let http = http_client(config.timeouts)?;
    let auth = Arc::new(FirebaseAuth::new(http.clone(), config));
    let documents = Arc::new(FirestoreStore::new(http, config, Arc::clone(&auth)));
    Ok(Backend { identity: auth, documents })
}

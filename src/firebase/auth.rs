//! Identity Toolkit REST client.
//!
//! Thin HTTP wrapper for `accounts:signUp` and `accounts:signInWithPassword`.
//! Pure parsing in `parse_account` / `parse_error` for testability.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::FirebaseConfig;
use crate::error::ProviderError;
use crate::identity::{ChangeNotifier, Identity, IdentityProvider, Subscription};

const SIGN_UP: &str = "signUp";
const SIGN_IN_WITH_PASSWORD: &str = "signInWithPassword";

// =============================================================================
// CLIENT
// =============================================================================

struct ActiveToken {
    uid: String,
    id_token: String,
    expiry: Option<JoinHandle<()>>,
}

/// Identity provider backed by Firebase Authentication.
pub struct FirebaseAuth {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    notifier: ChangeNotifier,
    token: Arc<Mutex<Option<ActiveToken>>>,
}

fn lock(token: &Mutex<Option<ActiveToken>>) -> MutexGuard<'_, Option<ActiveToken>> {
    token
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

impl FirebaseAuth {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &FirebaseConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.identity_base_url.clone(),
            notifier: ChangeNotifier::new(),
            token: Arc::new(Mutex::new(None)),
        }
    }

    /// ID token of the signed-in identity, if any.
    #[must_use]
    pub fn id_token(&self) -> Option<String> {
        lock(&self.token)
            .as_ref()
            .map(|t| t.id_token.clone())
    }

    async fn password_request(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<AccountResponse, ProviderError> {
        let body = PasswordRequest { email, password, return_secure_token: true };

        let response = self
            .http
            .post(endpoint_url(&self.base_url, endpoint, &self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if status != 200 {
            return Err(parse_error(status, &text));
        }

        parse_account(&text)
    }

    /// Hold the new token, publish the identity, then arm the expiry.
    ///
    /// The token is stored before its expiry task is spawned.
    fn sign_in(&self, account: AccountResponse) -> Identity {
        let identity = account.identity();
        let expires_in = account.expires_in_secs();
        let id_token = account.id_token;

        let previous = lock(&self.token).replace(ActiveToken {
            uid: identity.uid.clone(),
            id_token: id_token.clone(),
            expiry: None,
        });
        if let Some(handle) = previous.and_then(|t| t.expiry) {
            handle.abort();
        }
        self.notifier.publish(Some(identity.clone()));

        if let Some(secs) = expires_in {
            let handle = self.schedule_expiry(id_token.clone(), secs);
            let mut guard = lock(&self.token);
            match guard.as_mut() {
                Some(active) if active.id_token == id_token => active.expiry = Some(handle),
                // Already expired or replaced.
                _ => handle.abort(),
            }
        }
        identity
    }

    fn schedule_expiry(&self, id_token: String, secs: u64) -> JoinHandle<()> {
        let token = Arc::clone(&self.token);
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            let expired = {
                let mut guard = lock(&token);
                if guard.as_ref().is_some_and(|t| t.id_token == id_token) { guard.take() } else { None }
            };
            if let Some(active) = expired {
                info!(uid = %active.uid, "id token expired; identity lost");
                notifier.publish(None);
            }
        })
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn create_identity(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        let account = self
            .password_request(SIGN_UP, email, password)
            .await?;
        Ok(self.sign_in(account))
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        let account = self
            .password_request(SIGN_IN_WITH_PASSWORD, email, password)
            .await?;
        Ok(self.sign_in(account))
    }

    async fn end_session(&self) -> Result<(), ProviderError> {
        let Some(active) = lock(&self.token).take() else {
            debug!("end_session with no active token");
            return Ok(());
        };
        if let Some(handle) = active.expiry {
            handle.abort();
        }
        self.notifier.publish(None);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    id_token: String,
    /// Seconds, encoded as a string.
    expires_in: Option<String>,
}

impl AccountResponse {
    fn identity(&self) -> Identity {
        Identity {
            uid: self.local_id.clone(),
            display_name: self
                .display_name
                .clone()
                .filter(|n| !n.is_empty()),
            email: self.email.clone().filter(|e| !e.is_empty()),
            email_verified: false,
        }
    }

    fn expires_in_secs(&self) -> Option<u64> {
        self.expires_in
            .as_deref()
            .and_then(|s| s.parse().ok())
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// PARSING
// =============================================================================

fn endpoint_url(base_url: &str, endpoint: &str, api_key: &str) -> String {
    format!("{}/v1/accounts:{endpoint}?key={api_key}", base_url.trim_end_matches('/'))
}

fn parse_account(json: &str) -> Result<AccountResponse, ProviderError> {
    serde_json::from_str(json).map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Map an Identity Toolkit error body to a `ProviderError`. Messages look like
/// `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be at least 6 characters`.
fn parse_error(status: u16, body: &str) -> ProviderError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return ProviderError::Response { status, body: body.to_owned() };
    };
    let message = envelope.error.message;
    let (code, detail) = match message.split_once(':') {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (message.trim(), ""),
    };

    match code {
        "EMAIL_EXISTS" => ProviderError::EmailInUse,
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => ProviderError::InvalidCredentials,
        "WEAK_PASSWORD" => ProviderError::WeakPassword(if detail.is_empty() { code } else { detail }.to_owned()),
        "INVALID_EMAIL" | "MISSING_EMAIL" => ProviderError::InvalidEmail,
        "USER_DISABLED" => ProviderError::UserDisabled,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => ProviderError::TooManyAttempts,
        _ => ProviderError::Response { status, body: body.to_owned() },
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

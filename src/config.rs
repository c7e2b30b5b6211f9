//! Configuration probe — backend credentials parsed from environment variables.
//!
//! The probe runs once at startup. Missing credentials are not an error: the
//! process runs unconfigured and every mutating session operation fails fast
//! with `SessionError::NotConfigured`.

use tracing::warn;

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com";
pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Firebase project credentials and endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    pub identity_base_url: String,
    pub firestore_base_url: String,
    pub timeouts: HttpTimeouts,
}

impl FirebaseConfig {
    /// Load from the process environment. See [`FirebaseConfig::from_lookup`].
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from a key lookup.
    ///
    /// Required (blank counts as missing):
    /// - `FIREBASE_API_KEY`
    /// - `FIREBASE_PROJECT_ID`
    ///
    /// Optional:
    /// - `FIREBASE_AUTH_EMULATOR_HOST`: route identity calls to a local emulator
    /// - `FIRESTORE_EMULATOR_HOST`: route document calls to a local emulator
    /// - `FIREBASE_REQUEST_TIMEOUT_SECS`: default 30
    /// - `FIREBASE_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// Returns `None` if a required value is missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_blank = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let api_key = non_blank("FIREBASE_API_KEY")?;
        let project_id = non_blank("FIREBASE_PROJECT_ID")?;

        let identity_base_url = non_blank("FIREBASE_AUTH_EMULATOR_HOST").map_or_else(
            || DEFAULT_IDENTITY_BASE_URL.to_owned(),
            |host| format!("http://{}/identitytoolkit.googleapis.com", host.trim_end_matches('/')),
        );
        let firestore_base_url = non_blank("FIRESTORE_EMULATOR_HOST").map_or_else(
            || DEFAULT_FIRESTORE_BASE_URL.to_owned(),
            |host| format!("http://{}", host.trim_end_matches('/')),
        );
        let timeouts = HttpTimeouts {
            request_secs: parse_u64(non_blank("FIREBASE_REQUEST_TIMEOUT_SECS"), DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_u64(non_blank("FIREBASE_CONNECT_TIMEOUT_SECS"), DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Some(Self { api_key, project_id, identity_base_url, firestore_base_url, timeouts })
    }
}

fn parse_u64(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

// =============================================================================
// PROBE
// =============================================================================

/// Startup decision on whether a real backend is available. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConfigProbe {
    config: Option<FirebaseConfig>,
}

impl ConfigProbe {
    /// Probe the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::evaluate(FirebaseConfig::from_env())
    }

    /// Probe an injected lookup instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::evaluate(FirebaseConfig::from_lookup(lookup))
    }

    fn evaluate(config: Option<FirebaseConfig>) -> Self {
        if config.is_none() {
            warn!("firebase credentials not found; running unconfigured, signup/login/logout are disabled");
        }
        Self { config }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    #[must_use]
    pub fn config(&self) -> Option<&FirebaseConfig> {
        self.config.as_ref()
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

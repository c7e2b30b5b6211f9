//! Error types for the session core.
//!
//! DESIGN
//! ======
//! One enum per seam: `ProviderError` for the identity provider, `StoreError`
//! for the document store, and `SessionError` for what callers of
//! signup/login/logout see. Profile read failures never surface as
//! `SessionError`; the reconciler absorbs them into `ProfileView::degraded`.
//!
//! Every error carries a stable code through `ErrorCode` so a presentation
//! layer can branch on it without matching display strings.

/// Stable machine-readable classification for an error.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// PROVIDER
// =============================================================================

/// Failures reported by (or while talking to) the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Unknown email or wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Signup attempted with an email that already has an identity.
    #[error("email already in use")]
    EmailInUse,

    /// Provider rejected the password as too weak.
    #[error("weak password: {0}")]
    WeakPassword(String),

    #[error("invalid email")]
    InvalidEmail,

    #[error("account disabled")]
    UserDisabled,

    /// Provider is throttling this client.
    #[error("too many attempts, try again later")]
    TooManyAttempts,

    /// The HTTP request to the provider failed.
    #[error("provider request failed: {0}")]
    Request(String),

    /// The provider returned a non-success status we could not classify.
    #[error("provider response error: status {status}")]
    Response { status: u16, body: String },

    /// The provider response body could not be deserialized.
    #[error("provider response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for ProviderError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::EmailInUse => "E_EMAIL_IN_USE",
            Self::WeakPassword(_) => "E_WEAK_PASSWORD",
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::UserDisabled => "E_USER_DISABLED",
            Self::TooManyAttempts => "E_TOO_MANY_ATTEMPTS",
            Self::Request(_) => "E_PROVIDER_REQUEST",
            Self::Response { .. } => "E_PROVIDER_RESPONSE",
            Self::Parse(_) => "E_PROVIDER_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(
            self,
            Self::TooManyAttempts | Self::Request(_) | Self::Response { status: 429 | 500..=599, .. }
        )
    }
}

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// Failures reading or writing a document. `NotFound` is not an error; see
/// [`crate::documents::DocumentStore::get`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The store could not be reached.
    #[error("document store request failed: {0}")]
    Request(String),

    #[error("document store response error: status {status}")]
    Response { status: u16, body: String },

    #[error("document parse failed: {0}")]
    Parse(String),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "E_PERMISSION_DENIED",
            Self::Request(_) => "E_STORE_REQUEST",
            Self::Response { .. } => "E_STORE_RESPONSE",
            Self::Parse(_) => "E_STORE_PARSE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Errors returned by the session store's mutating operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No backend credentials were present at startup.
    #[error("identity backend is not configured; set FIREBASE_API_KEY and FIREBASE_PROJECT_ID")]
    NotConfigured,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The identity was created but its profile document was not. The identity
    /// is left in place without a profile.
    #[error("profile document write failed for {uid}: {source}")]
    ProfileWrite { uid: String, source: StoreError },
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "E_NOT_CONFIGURED",
            Self::Provider(e) => e.error_code(),
            Self::ProfileWrite { .. } => "E_PROFILE_WRITE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::NotConfigured | Self::ProfileWrite { .. } => false,
            Self::Provider(e) => e.retryable(),
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

//! Auth context — the explicit init/teardown object handed to consumers.
//!
//! Consumers hold an `AuthContext` instead of reaching for global state.
//! They read `Session` and `ProfileState` through the watch receivers and
//! call signup/login/logout on the session store; nothing else mutates.

use tracing::info;

use crate::config::ConfigProbe;
use crate::error::ProviderError;
use crate::firebase;
use crate::profile::ProfileReconciler;
use crate::session::{Backend, SessionStore};

pub struct AuthContext {
    profile: ProfileReconciler,
    session: SessionStore,
}

impl AuthContext {
    /// Wire a session store and profile reconciler over `backend`.
    /// `None` yields an unconfigured context.
    #[must_use]
    pub fn start(backend: Option<Backend>) -> Self {
        let session = SessionStore::start(backend);
        let profile = ProfileReconciler::start(session.watch(), session.documents());
        Self { profile, session }
    }

    /// Build the Firebase backend if the probe found credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_probe(probe: &ConfigProbe) -> Result<Self, ProviderError> {
        let backend = probe
            .config()
            .map(firebase::backend)
            .transpose()?;
        if let Some(config) = probe.config() {
            info!(project = %config.project_id, "firebase backend configured");
        }
        Ok(Self::start(backend))
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[must_use]
    pub fn profile(&self) -> &ProfileReconciler {
        &self.profile
    }

    /// Tear down in dependency order: reconciler first, then the session
    /// store and its provider subscription.
    pub fn shutdown(self) {
        let Self { profile, session } = self;
        profile.shutdown();
        session.shutdown();
        info!("auth context shut down");
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;

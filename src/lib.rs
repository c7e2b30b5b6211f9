//! Uplaud session core: configuration probe, session store, and profile
//! reconciler over a pluggable identity provider and document store.
//!
//! DESIGN
//! ======
//! `AuthContext` wires the pieces together. The session store owns the
//! provider subscription and publishes a `Session` on a watch channel; the
//! profile reconciler follows that channel and publishes a `ProfileState`.
//! `firebase` holds the REST adapters, `memory` the in-process ones.

pub mod config;
pub mod context;
pub mod documents;
pub mod error;
pub mod firebase;
pub mod identity;
pub mod memory;
pub mod profile;
pub mod session;

pub use config::ConfigProbe;
pub use context::AuthContext;
pub use error::{ErrorCode, ProviderError, SessionError, StoreError};
pub use identity::Identity;
pub use profile::{ProfileState, ProfileView};
pub use session::{Session, SessionStatus, SignupProfile};

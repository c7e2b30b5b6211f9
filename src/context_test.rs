use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::error::SessionError;
use crate::memory::{MemoryDocumentStore, MemoryIdentityProvider};
use crate::profile::ProfileState;
use crate::session::{SessionStatus, SignupProfile};

#[tokio::test]
async fn unconfigured_probe_yields_unconfigured_context() {
    let probe = ConfigProbe::from_lookup(|_| None);
    let ctx = AuthContext::from_probe(&probe).unwrap();
    assert!(!ctx.session().is_configured());
    assert_eq!(ctx.session().session().status(), SessionStatus::Unconfigured);
    assert_eq!(ctx.profile().state(), ProfileState::Cleared);

    let err = ctx
        .session()
        .login("a@x.com", "secret1")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotConfigured));
    ctx.shutdown();
}

#[tokio::test]
async fn configured_probe_builds_firebase_backend() {
    let probe = ConfigProbe::from_lookup(|key| match key {
        "FIREBASE_API_KEY" => Some("key".into()),
        "FIREBASE_PROJECT_ID" => Some("proj".into()),
        _ => None,
    });
    let ctx = AuthContext::from_probe(&probe).unwrap();
    assert!(ctx.session().is_configured());
    assert_eq!(ctx.session().session().status(), SessionStatus::Pending);
    ctx.shutdown();
}

#[tokio::test]
async fn full_cycle_over_memory_backend() {
    let provider = Arc::new(MemoryIdentityProvider::new());
    let documents = Arc::new(MemoryDocumentStore::new());
    let ctx = AuthContext::start(Some(Backend { identity: provider.clone(), documents }));

    let identity = ctx
        .session()
        .signup(
            "a@x.com",
            "secret1",
            SignupProfile { full_name: "Alice Doe".into(), phone_number: "+1 555 0100".into() },
        )
        .await
        .unwrap();
    let view = tokio::time::timeout(Duration::from_secs(1), ctx.profile().wait_ready(&identity.uid))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.full_name, "Alice Doe");

    ctx.session().logout().await.unwrap();
    let mut rx = ctx.profile().watch();
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| *s == ProfileState::Cleared))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ctx.session().session().status(), SessionStatus::Unauthenticated);

    assert_eq!(provider.subscriber_count(), 1);
    ctx.shutdown();
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
    assert_eq!(provider.subscriber_count(), 0);
}

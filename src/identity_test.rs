use super::*;

fn alice() -> Identity {
    Identity::new("uid-alice")
        .with_email("a@x.com")
        .with_display_name("Alice")
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn identity_builder_sets_fields() {
    let id = alice();
    assert_eq!(id.uid, "uid-alice");
    assert_eq!(id.email.as_deref(), Some("a@x.com"));
    assert_eq!(id.display_name.as_deref(), Some("Alice"));
    assert!(!id.email_verified);
}

#[test]
fn identity_serializes_camel_case() {
    let json = serde_json::to_value(alice()).unwrap();
    assert_eq!(json["displayName"], "Alice");
    assert_eq!(json["emailVerified"], false);
}

// =============================================================================
// ChangeNotifier
// =============================================================================

#[tokio::test]
async fn subscribe_primes_with_current_identity() {
    let notifier = ChangeNotifier::new();
    let mut sub = notifier.subscribe();
    let first = sub.recv().await.unwrap();
    assert_eq!(first, IdentityChange { seq: 0, identity: None });
}

#[tokio::test]
async fn subscribe_after_publish_sees_latest() {
    let notifier = ChangeNotifier::new();
    notifier.publish(Some(alice()));
    let mut sub = notifier.subscribe();
    let first = sub.recv().await.unwrap();
    assert_eq!(first.seq, 1);
    assert_eq!(first.identity, Some(alice()));
}

#[tokio::test]
async fn publish_increments_sequence_and_fans_out() {
    let notifier = ChangeNotifier::new();
    let mut a = notifier.subscribe();
    let mut b = notifier.subscribe();
    let _ = a.recv().await;
    let _ = b.recv().await;

    assert_eq!(notifier.publish(Some(alice())), 1);
    assert_eq!(notifier.publish(None), 2);

    for sub in [&mut a, &mut b] {
        assert_eq!(sub.recv().await.unwrap().seq, 1);
        let second = sub.recv().await.unwrap();
        assert_eq!(second.seq, 2);
        assert!(second.identity.is_none());
    }
    assert!(notifier.current().is_none());
}

#[test]
fn dropping_subscription_unsubscribes() {
    let notifier = ChangeNotifier::new();
    let a = notifier.subscribe();
    let b = notifier.subscribe();
    assert_eq!(notifier.subscriber_count(), 2);
    drop(a);
    assert_eq!(notifier.subscriber_count(), 1);
    b.unsubscribe();
    assert_eq!(notifier.subscriber_count(), 0);
}

#[test]
fn watermark_tracks_latest_sequence() {
    let notifier = ChangeNotifier::new();
    let sub = notifier.subscribe();
    let watermark = sub.watermark();
    assert_eq!(watermark.current(), 0);
    notifier.publish(Some(alice()));
    notifier.publish(None);
    assert_eq!(watermark.current(), 2);
}

#[test]
fn subscription_outliving_notifier_drops_cleanly() {
    let notifier = ChangeNotifier::new();
    let sub = notifier.subscribe();
    drop(notifier);
    drop(sub);
}

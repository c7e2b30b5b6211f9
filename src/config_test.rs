use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn from_lookup_requires_api_key_and_project() {
    assert!(FirebaseConfig::from_lookup(lookup_from(&[])).is_none());
    assert!(FirebaseConfig::from_lookup(lookup_from(&[("FIREBASE_API_KEY", "key")])).is_none());
    assert!(FirebaseConfig::from_lookup(lookup_from(&[("FIREBASE_PROJECT_ID", "proj")])).is_none());
}

#[test]
fn from_lookup_treats_blank_as_missing() {
    let cfg = FirebaseConfig::from_lookup(lookup_from(&[("FIREBASE_API_KEY", "   "), ("FIREBASE_PROJECT_ID", "proj")]));
    assert!(cfg.is_none());
}

#[test]
fn from_lookup_defaults() {
    let cfg =
        FirebaseConfig::from_lookup(lookup_from(&[("FIREBASE_API_KEY", "key"), ("FIREBASE_PROJECT_ID", "proj")]))
            .unwrap();
    assert_eq!(cfg.api_key, "key");
    assert_eq!(cfg.project_id, "proj");
    assert_eq!(cfg.identity_base_url, DEFAULT_IDENTITY_BASE_URL);
    assert_eq!(cfg.firestore_base_url, DEFAULT_FIRESTORE_BASE_URL);
    assert_eq!(
        cfg.timeouts,
        HttpTimeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
}

#[test]
fn from_lookup_parses_emulators_and_timeouts() {
    let cfg = FirebaseConfig::from_lookup(lookup_from(&[
        ("FIREBASE_API_KEY", "key"),
        ("FIREBASE_PROJECT_ID", "proj"),
        ("FIREBASE_AUTH_EMULATOR_HOST", "127.0.0.1:9099"),
        ("FIRESTORE_EMULATOR_HOST", "127.0.0.1:8080/"),
        ("FIREBASE_REQUEST_TIMEOUT_SECS", "5"),
        ("FIREBASE_CONNECT_TIMEOUT_SECS", "2"),
    ]))
    .unwrap();
    assert_eq!(cfg.identity_base_url, "http://127.0.0.1:9099/identitytoolkit.googleapis.com");
    assert_eq!(cfg.firestore_base_url, "http://127.0.0.1:8080");
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 5, connect_secs: 2 });
}

#[test]
fn from_lookup_bad_timeout_falls_back() {
    let cfg = FirebaseConfig::from_lookup(lookup_from(&[
        ("FIREBASE_API_KEY", "key"),
        ("FIREBASE_PROJECT_ID", "proj"),
        ("FIREBASE_REQUEST_TIMEOUT_SECS", "soon"),
    ]))
    .unwrap();
    assert_eq!(cfg.timeouts.request_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
}

#[test]
fn probe_reports_configured() {
    let probe = ConfigProbe::from_lookup(lookup_from(&[("FIREBASE_API_KEY", "key"), ("FIREBASE_PROJECT_ID", "proj")]));
    assert!(probe.is_configured());
    assert_eq!(probe.config().map(|c| c.project_id.as_str()), Some("proj"));
}

#[test]
fn probe_reports_unconfigured() {
    let probe = ConfigProbe::from_lookup(lookup_from(&[]));
    assert!(!probe.is_configured());
    assert!(probe.config().is_none());
}

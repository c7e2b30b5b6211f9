use std::time::Duration;

use super::*;

fn config() -> FirebaseConfig {
    FirebaseConfig::from_lookup(|key| match key {
        "FIREBASE_API_KEY" => Some("test-key".into()),
        "FIREBASE_PROJECT_ID" => Some("proj".into()),
        _ => None,
    })
    .unwrap()
}

fn account(uid: &str, token: &str, expires_in: Option<&str>) -> AccountResponse {
    AccountResponse {
        local_id: uid.into(),
        email: Some("a@x.com".into()),
        display_name: Some(String::new()),
        id_token: token.into(),
        expires_in: expires_in.map(Into::into),
    }
}

// =============================================================================
// parse_account
// =============================================================================

#[test]
fn parse_sign_in_response() {
    let json = r#"{
        "kind": "identitytoolkit#VerifyPasswordResponse",
        "localId": "uid-1",
        "email": "a@x.com",
        "displayName": "Alice",
        "idToken": "tok",
        "registered": true,
        "refreshToken": "ref",
        "expiresIn": "3600"
    }"#;
    let parsed = parse_account(json).unwrap();
    assert_eq!(parsed.expires_in_secs(), Some(3600));
    let identity = parsed.identity();
    assert_eq!(identity.uid, "uid-1");
    assert_eq!(identity.email.as_deref(), Some("a@x.com"));
    assert_eq!(identity.display_name.as_deref(), Some("Alice"));
}

#[test]
fn parse_sign_up_response_without_display_name() {
    let json = r#"{"localId":"uid-2","email":"b@x.com","idToken":"tok","expiresIn":"3600"}"#;
    let identity = parse_account(json).unwrap().identity();
    assert_eq!(identity.display_name, None);
}

#[test]
fn empty_display_name_is_absent() {
    assert_eq!(account("u1", "t", None).identity().display_name, None);
}

#[test]
fn parse_account_rejects_missing_token() {
    let err = parse_account(r#"{"localId":"uid-1"}"#).unwrap_err();
    assert!(matches!(err, ProviderError::Parse(_)));
}

#[test]
fn unparseable_expiry_is_ignored() {
    assert_eq!(account("u1", "t", Some("soon")).expires_in_secs(), None);
}

// =============================================================================
// parse_error
// =============================================================================

fn error_body(message: &str) -> String {
    serde_json::json!({ "error": { "code": 400, "message": message, "errors": [] } }).to_string()
}

#[test]
fn parse_error_maps_known_codes() {
    assert_eq!(parse_error(400, &error_body("EMAIL_EXISTS")), ProviderError::EmailInUse);
    assert_eq!(parse_error(400, &error_body("EMAIL_NOT_FOUND")), ProviderError::InvalidCredentials);
    assert_eq!(parse_error(400, &error_body("INVALID_PASSWORD")), ProviderError::InvalidCredentials);
    assert_eq!(parse_error(400, &error_body("INVALID_LOGIN_CREDENTIALS")), ProviderError::InvalidCredentials);
    assert_eq!(parse_error(400, &error_body("INVALID_EMAIL")), ProviderError::InvalidEmail);
    assert_eq!(parse_error(400, &error_body("USER_DISABLED")), ProviderError::UserDisabled);
    assert_eq!(
        parse_error(400, &error_body("TOO_MANY_ATTEMPTS_TRY_LATER : Access temporarily disabled")),
        ProviderError::TooManyAttempts
    );
}

#[test]
fn parse_error_keeps_weak_password_detail() {
    let err = parse_error(400, &error_body("WEAK_PASSWORD : Password should be at least 6 characters"));
    assert_eq!(err, ProviderError::WeakPassword("Password should be at least 6 characters".into()));
}

#[test]
fn parse_error_unknown_code_keeps_body() {
    let body = error_body("OPERATION_NOT_ALLOWED");
    assert_eq!(parse_error(400, &body), ProviderError::Response { status: 400, body: body.clone() });
}

#[test]
fn parse_error_non_json_body() {
    assert_eq!(
        parse_error(502, "bad gateway"),
        ProviderError::Response { status: 502, body: "bad gateway".into() }
    );
}

#[test]
fn endpoint_url_carries_api_key() {
    assert_eq!(
        endpoint_url("https://identitytoolkit.googleapis.com/", SIGN_IN_WITH_PASSWORD, "k"),
        "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword?key=k"
    );
}

// =============================================================================
// token lifecycle
// =============================================================================

#[tokio::test]
async fn sign_in_holds_token_and_publishes() {
    let auth = FirebaseAuth::new(reqwest::Client::new(), &config());
    let mut sub = auth.subscribe();
    assert_eq!(sub.recv().await.unwrap().identity, None);

    let identity = auth.sign_in(account("u1", "tok-1", Some("3600")));
    assert_eq!(auth.id_token().as_deref(), Some("tok-1"));
    assert_eq!(sub.recv().await.unwrap().identity, Some(identity));
}

#[tokio::test]
async fn end_session_clears_token_and_publishes_none() {
    let auth = FirebaseAuth::new(reqwest::Client::new(), &config());
    auth.sign_in(account("u1", "tok-1", Some("3600")));
    let mut sub = auth.subscribe();
    assert!(sub.recv().await.unwrap().identity.is_some());

    auth.end_session().await.unwrap();
    assert_eq!(auth.id_token(), None);
    assert_eq!(sub.recv().await.unwrap().identity, None);
}

#[tokio::test]
async fn end_session_without_token_is_silent() {
    let auth = FirebaseAuth::new(reqwest::Client::new(), &config());
    let mut sub = auth.subscribe();
    sub.recv().await.unwrap();

    auth.end_session().await.unwrap();
    let next = tokio::time::timeout(Duration::from_millis(20), sub.recv()).await;
    assert!(next.is_err(), "no change expected");
}

#[tokio::test]
async fn expired_token_reports_identity_lost() {
    let auth = FirebaseAuth::new(reqwest::Client::new(), &config());
    let mut sub = auth.subscribe();
    sub.recv().await.unwrap();

    auth.sign_in(account("u1", "tok-1", Some("0")));
    assert!(sub.recv().await.unwrap().identity.is_some());

    let lost = tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lost.identity, None);
    assert_eq!(auth.id_token(), None);
}

#[tokio::test]
async fn replaced_token_does_not_expire_new_session() {
    let auth = FirebaseAuth::new(reqwest::Client::new(), &config());
    auth.sign_in(account("u1", "tok-1", Some("0")));
    auth.sign_in(account("u2", "tok-2", Some("3600")));

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(auth.id_token().as_deref(), Some("tok-2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn immediate_expiry_is_never_missed() {
    for round in 0..20 {
        let auth = FirebaseAuth::new(reqwest::Client::new(), &config());
        let mut sub = auth.subscribe();
        sub.recv().await.unwrap();

        auth.sign_in(account("u1", &format!("tok-{round}"), Some("0")));
        assert!(sub.recv().await.unwrap().identity.is_some());
        let lost = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lost.identity, None);
        assert_eq!(auth.id_token(), None);
    }
}

use super::models::LoginCredentials;
use super::store::{CredentialStore, EncryptedFileStore, InMemoryStore, StoreError};
use super::*;
use crate::events::{self, FirebaseEvent};
use httpmock::prelude::*;
use reqwest::{Client, StatusCode};
use reqwest_middleware::ClientBuilder;
use serde_json::json;
use std::sync::Arc;

fn create_auth(server: &MockServer, store: Arc<dyn CredentialStore>) -> FirebaseAuth {
    let client = ClientBuilder::new(Client::new()).build();
    FirebaseAuth::new_with_client(
        client,
        "test-api-key".to_string(),
        server.url(""),
        server.url(""),
        store,
    )
}

struct FailingStore;

impl CredentialStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
    }

    fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
    }
}

fn mock_sign_up(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signUp");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "kind": "identitytoolkit#SignupNewUserResponse",
                "idToken": "id-token",
                "refreshToken": "refresh-token",
                "expiresIn": "3600",
                "localId": "uid-1"
            }));
    })
}

fn cached_credentials() -> LoginCredentials {
    LoginCredentials {
        kind: "identitytoolkit#SignupNewUserResponse".to_string(),
        id_token: "old-id-token".to_string(),
        refresh_token: "cached-refresh".to_string(),
        expires_in: 3600,
        user_id: "uid-1".to_string(),
    }
}

fn mock_refresh<'a>(server: &'a MockServer, refresh_token: &str) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/token")
            .query_param("key", "test-api-key")
            .header("content-type", "application/json")
            .json_body(json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "access_token": "new-access-token",
                "expires_in": "3600",
                "token_type": "Bearer",
                "refresh_token": "new-refresh",
                "id_token": "new-id-token",
                "user_id": "uid-1",
                "project_id": "123456789"
            }));
    })
}

#[tokio::test]
async fn test_sign_up_anonymously_success() {
    let server = MockServer::start();
    let store = Arc::new(InMemoryStore::new());
    let (tx, mut rx) = events::channel();
    let mut auth = create_auth(&server, store.clone()).with_events(tx);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/accounts:signUp")
            .query_param("key", "test-api-key")
            .header("content-type", "application/json")
            .json_body(json!({ "returnSecureToken": true }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "kind": "identitytoolkit#SignupNewUserResponse",
                "idToken": "id-token",
                "refreshToken": "refresh-token",
                "expiresIn": "3600",
                "localId": "uid-1"
            }));
    });

    let credentials = auth.sign_up_anonymously(true).await.unwrap();
    assert_eq!(credentials.user_id, "uid-1");
    assert_eq!(credentials.expires_in, 3600);
    assert_eq!(credentials.kind, "identitytoolkit#SignupNewUserResponse");
    assert_eq!(auth.state(), AuthState::Authenticated);
    assert_eq!(auth.credentials(), Some(&credentials));
    assert_eq!(rx.try_recv().unwrap(), FirebaseEvent::LoggedIn(credentials.clone()));

    let stored: LoginCredentials =
        serde_json::from_str(&store.get(USER_AUTH_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored, credentials);

    mock.assert();
}

#[tokio::test]
async fn test_sign_up_without_persist_leaves_store_empty() {
    let server = MockServer::start();
    let store = Arc::new(InMemoryStore::new());
    let mut auth = create_auth(&server, store.clone());

    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signUp");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "kind": "identitytoolkit#SignupNewUserResponse",
                "idToken": "id-token",
                "refreshToken": "refresh-token",
                "expiresIn": "3600",
                "localId": "uid-1"
            }));
    });

    auth.sign_up_anonymously(false).await.unwrap();
    assert!(store.get(USER_AUTH_KEY).unwrap().is_none());

    mock.assert();
}

#[tokio::test]
async fn test_sign_up_failure_keeps_state() {
    let server = MockServer::start();
    let (tx, mut rx) = events::channel();
    let mut auth = create_auth(&server, Arc::new(InMemoryStore::new())).with_events(tx);

    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signUp");
        then.status(400)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "code": 400,
                    "message": "ADMIN_ONLY_OPERATION",
                    "errors": [
                        {
                            "message": "ADMIN_ONLY_OPERATION",
                            "domain": "global",
                            "reason": "invalid"
                        }
                    ]
                }
            }));
    });

    let result = auth.sign_up_anonymously(true).await;
    match result {
        Err(AuthError::ApiError { status, message }) => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(message, "ADMIN_ONLY_OPERATION (code: 400)");
        }
        other => panic!("Expected ApiError, got {:?}", other),
    }
    assert_eq!(auth.state(), AuthState::Anonymous);
    assert!(auth.credentials().is_none());
    assert!(rx.try_recv().is_err());

    mock.assert();
}

#[tokio::test]
async fn test_refresh_token_maps_credentials() {
    let server = MockServer::start();
    let store = Arc::new(InMemoryStore::new());
    let (tx, mut rx) = events::channel();
    let mut auth = create_auth(&server, store.clone()).with_events(tx);
    let mock = mock_refresh(&server, "refresh-me");

    let credentials = auth.refresh_token("refresh-me", false).await.unwrap();
    assert_eq!(
        credentials,
        LoginCredentials {
            kind: String::new(),
            id_token: "new-access-token".to_string(),
            refresh_token: "new-refresh".to_string(),
            expires_in: 3600,
            user_id: "uid-1".to_string(),
        }
    );
    assert_eq!(auth.state(), AuthState::Authenticated);
    assert!(store.get(USER_AUTH_KEY).unwrap().is_none());

    match rx.try_recv().unwrap() {
        FirebaseEvent::TokenRefreshed(result) => {
            assert_eq!(result.project_id, "123456789");
            assert_eq!(result.token_type, "Bearer");
        }
        other => panic!("Expected TokenRefreshed, got {:?}", other),
    }

    mock.assert();
}

#[tokio::test]
async fn test_refresh_token_failure() {
    let server = MockServer::start();
    let mut auth = create_auth(&server, Arc::new(InMemoryStore::new()));

    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/token");
        then.status(400)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "code": 400,
                    "message": "INVALID_REFRESH_TOKEN",
                    "status": "INVALID_ARGUMENT"
                }
            }));
    });

    let result = auth.refresh_token("stale", true).await;
    assert!(matches!(result, Err(AuthError::ApiError { .. })));
    assert_eq!(auth.state(), AuthState::Anonymous);

    mock.assert();
}

#[tokio::test]
async fn test_load_cached_credentials_without_cache() {
    let server = MockServer::start();
    let mut auth = create_auth(&server, Arc::new(InMemoryStore::new()));

    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/token");
        then.status(200);
    });

    let result = auth.load_cached_credentials().await;
    assert!(matches!(result, Err(AuthError::NoCachedCredentials)));
    assert_eq!(auth.state(), AuthState::Anonymous);

    mock.assert_calls(0);
}

#[tokio::test]
async fn test_load_cached_credentials_refreshes_and_persists() {
    let server = MockServer::start();
    let store = Arc::new(InMemoryStore::new());
    store
        .set(USER_AUTH_KEY, &serde_json::to_string(&cached_credentials()).unwrap())
        .unwrap();
    let mut auth = create_auth(&server, store.clone());
    let mock = mock_refresh(&server, "cached-refresh");

    let credentials = auth.load_cached_credentials().await.unwrap();
    assert_eq!(credentials.refresh_token, "new-refresh");

    let stored: LoginCredentials =
        serde_json::from_str(&store.get(USER_AUTH_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored, credentials);

    mock.assert();
}

#[tokio::test]
async fn test_sign_up_persist_failure_keeps_state() {
    let server = MockServer::start();
    let (tx, mut rx) = events::channel();
    let mut auth = create_auth(&server, Arc::new(FailingStore)).with_events(tx);
    let mock = mock_sign_up(&server);

    let result = auth.sign_up_anonymously(true).await;
    assert!(matches!(result, Err(AuthError::Store(StoreError::Io(_)))));
    assert_eq!(auth.state(), AuthState::Anonymous);
    assert!(auth.credentials().is_none());
    assert!(rx.try_recv().is_err());

    mock.assert();
}

#[tokio::test]
async fn test_refresh_persist_failure_keeps_state() {
    let server = MockServer::start();
    let (tx, mut rx) = events::channel();
    let mut auth = create_auth(&server, Arc::new(FailingStore)).with_events(tx);
    let mock = mock_refresh(&server, "cached-refresh");

    let result = auth.refresh_token("cached-refresh", true).await;
    assert!(matches!(result, Err(AuthError::Store(StoreError::Io(_)))));
    assert_eq!(auth.state(), AuthState::Anonymous);
    assert!(auth.credentials().is_none());
    assert!(rx.try_recv().is_err());

    mock.assert();
}

#[tokio::test]
async fn test_logout_store_failure_keeps_session() {
    let server = MockServer::start();
    let (tx, mut rx) = events::channel();
    let mut auth = create_auth(&server, Arc::new(FailingStore)).with_events(tx);
    let mock = mock_sign_up(&server);

    let credentials = auth.sign_up_anonymously(false).await.unwrap();
    assert_eq!(rx.try_recv().unwrap(), FirebaseEvent::LoggedIn(credentials.clone()));

    let result = auth.logout();
    assert!(matches!(result, Err(AuthError::Store(StoreError::Io(_)))));
    assert_eq!(auth.state(), AuthState::Authenticated);
    assert_eq!(auth.credentials(), Some(&credentials));
    assert!(rx.try_recv().is_err());

    mock.assert();
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let server = MockServer::start();
    let store = Arc::new(InMemoryStore::new());
    store
        .set(USER_AUTH_KEY, &serde_json::to_string(&cached_credentials()).unwrap())
        .unwrap();
    let (tx, mut rx) = events::channel();
    let mut auth = create_auth(&server, store.clone()).with_events(tx);

    auth.logout().unwrap();
    assert!(store.get(USER_AUTH_KEY).unwrap().is_none());
    assert_eq!(auth.state(), AuthState::LoggedOut);
    assert_eq!(rx.try_recv().unwrap(), FirebaseEvent::LoggedOut);

    auth.logout().unwrap();
    assert_eq!(rx.try_recv().unwrap(), FirebaseEvent::LoggedOut);
}

#[test]
fn test_encrypted_file_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = EncryptedFileStore::new(dir.path().join("save"), "test-api-key");
    let payload = serde_json::to_string(&cached_credentials()).unwrap();

    assert!(store.get(USER_AUTH_KEY).unwrap().is_none());

    store.set(USER_AUTH_KEY, &payload).unwrap();
    let on_disk = std::fs::read_to_string(store.path_for(USER_AUTH_KEY)).unwrap();
    assert!(!on_disk.contains("cached-refresh"));
    assert_eq!(store.get(USER_AUTH_KEY).unwrap().as_deref(), Some(payload.as_str()));

    store.delete(USER_AUTH_KEY).unwrap();
    assert!(store.get(USER_AUTH_KEY).unwrap().is_none());
    store.delete(USER_AUTH_KEY).unwrap();
}

#[test]
fn test_encrypted_file_store_wrong_passphrase() {
    let dir = tempfile::tempdir().unwrap();
    EncryptedFileStore::new(dir.path(), "right-key")
        .set(USER_AUTH_KEY, "secret")
        .unwrap();

    let result = EncryptedFileStore::new(dir.path(), "wrong-key").get(USER_AUTH_KEY);
    assert!(matches!(result, Err(StoreError::Crypto(_))));
}

#[tokio::test]
async fn test_load_from_encrypted_file_store() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(EncryptedFileStore::new(dir.path(), "test-api-key"));
    store
        .set(USER_AUTH_KEY, &serde_json::to_string(&cached_credentials()).unwrap())
        .unwrap();
    let mut auth = create_auth(&server, store);
    let mock = mock_refresh(&server, "cached-refresh");

    let credentials = auth.load_cached_credentials().await.unwrap();
    assert_eq!(credentials.id_token, "new-access-token");

    mock.assert();
}

//! HTTP-level tests for the key API.
//!
//! Requests go through the full router (CORS, tracing, authentication
//! middleware) with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, AUTHORIZATION, CONTENT_TYPE, ORIGIN,
};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use mockall::mock;
use tower::ServiceExt;

use key_service::api::{self, ApiState};
use key_service::auth::{Authenticator, JwtAuthenticator};
use key_service::shutdown::ShutdownCoordinator;
use key_service::storage::LegacyKeyStore;
use key_service::{
    EntityUrn, KeyService, KeyStore, MemoryKeyStore, PublicKeys, ServiceOptions, StorageError,
    StorageResult,
};
use test_utils::{
    keys_path, sample_store_body, store_body, user_urn, TokenFactory, ALICE, BOB, SAMPLE_ENC_KEY,
    SAMPLE_SIG_KEY, TEST_JWT_SECRET,
};

mock! {
    pub Store {}

    #[async_trait]
    impl KeyStore for Store {
        async fn store_public_keys(&self, urn: &EntityUrn, keys: &PublicKeys) -> StorageResult<()>;
        async fn get_public_keys(&self, urn: &EntityUrn) -> StorageResult<PublicKeys>;
    }
}

/// Store whose operations never finish on their own.
struct StalledStore;

#[async_trait]
impl KeyStore for StalledStore {
    async fn store_public_keys(&self, _urn: &EntityUrn, _keys: &PublicKeys) -> StorageResult<()> {
        std::future::pending().await
    }

    async fn get_public_keys(&self, _urn: &EntityUrn) -> StorageResult<PublicKeys> {
        std::future::pending().await
    }
}

fn authenticator() -> Arc<dyn Authenticator> {
    Arc::new(JwtAuthenticator::new(TEST_JWT_SECRET.as_bytes(), None))
}

fn options() -> ServiceOptions {
    ServiceOptions {
        cors_allowed_origins: vec!["http://localhost:4200".to_string()],
        ..ServiceOptions::default()
    }
}

fn service(store: Arc<dyn KeyStore>) -> KeyService {
    KeyService::new(store, authenticator(), options())
}

fn app(store: Arc<dyn KeyStore>) -> Router {
    service(store).router()
}

fn post(urn: &str, subject: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(keys_path(urn))
        .header(CONTENT_TYPE, "application/json");
    if let Some(subject) = subject {
        builder = builder.header(AUTHORIZATION, TokenFactory::default().bearer(subject));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(urn: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(keys_path(urn))
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn urn(raw: &str) -> EntityUrn {
    EntityUrn::parse(raw).unwrap()
}

// Example scenarios

#[tokio::test]
async fn test_store_then_get_round_trip() {
    let app = app(Arc::new(MemoryKeyStore::new()));
    let body = r#"{"encKey":"AQID","sigKey":"BAUG"}"#;

    let response = send(&app, post("urn:sm:user:alice", Some(ALICE), body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(body_text(response).await.is_empty());

    let response = send(&app, get("urn:sm:user:alice")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_text(response).await, body);
}

#[tokio::test]
async fn test_store_for_other_entity_forbidden() {
    let store = MemoryKeyStore::new();
    let app = app(Arc::new(store.clone()));

    let response = send(&app, post("urn:sm:user:alice", Some(BOB), &sample_store_body())).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await["error"],
        "Forbidden: You can only store your own key"
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_get_unknown_entity_not_found() {
    let app = app(Arc::new(MemoryKeyStore::new()));

    let response = send(&app, get("urn:sm:user:ghost")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Key not found");
    assert_eq!(body["code"], "KEY_NOT_FOUND");
}

#[tokio::test]
async fn test_get_legacy_document() {
    let store = MemoryKeyStore::new();
    store
        .store_legacy_key(&urn("urn:sm:user:legacy"), &[1, 2, 3])
        .await
        .unwrap();
    let app = app(Arc::new(store));

    let response = send(&app, get("urn:sm:user:legacy")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"encKey":"AQID","sigKey":""}"#);
}

#[tokio::test]
async fn test_store_missing_sig_key_rejected() {
    let store = MemoryKeyStore::new();
    let app = app(Arc::new(store.clone()));

    let response = send(&app, post("urn:sm:user:alice", Some(ALICE), r#"{"encKey":"AQID"}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "encKey and sigKey must not be empty");
    assert_eq!(body["code"], "EMPTY_KEYS");
    assert!(store.is_empty());
}

// Check ordering

#[tokio::test]
async fn test_store_without_token_unauthorized() {
    let app = app(Arc::new(MemoryKeyStore::new()));

    let response = send(&app, post("urn:sm:user:alice", None, &sample_store_body())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "AUTH_UNAUTHORIZED");
}

#[tokio::test]
async fn test_store_with_forged_token_unauthorized() {
    let app = app(Arc::new(MemoryKeyStore::new()));
    let forged = TokenFactory::new("not-the-secret").bearer(ALICE);

    let request = Request::builder()
        .method(Method::POST)
        .uri(keys_path(&user_urn(ALICE)))
        .header(AUTHORIZATION, forged)
        .body(Body::from(sample_store_body()))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_store_checks_issuer_when_configured() {
    let issuer = "http://identity.local";
    let authenticator: Arc<dyn Authenticator> =
        Arc::new(JwtAuthenticator::new(TEST_JWT_SECRET.as_bytes(), Some(issuer)));
    let app = KeyService::new(Arc::new(MemoryKeyStore::new()), authenticator, options()).router();

    let request = |bearer: String| {
        Request::builder()
            .method(Method::POST)
            .uri(keys_path(&user_urn(ALICE)))
            .header(AUTHORIZATION, bearer)
            .body(Body::from(sample_store_body()))
            .unwrap()
    };

    let elsewhere = TokenFactory::default().with_issuer("http://elsewhere.local").bearer(ALICE);
    assert_eq!(send(&app, request(elsewhere)).await.status(), StatusCode::UNAUTHORIZED);

    let unstamped = TokenFactory::default().bearer(ALICE);
    assert_eq!(send(&app, request(unstamped)).await.status(), StatusCode::UNAUTHORIZED);

    let trusted = TokenFactory::default().with_issuer(issuer).bearer(ALICE);
    assert_eq!(send(&app, request(trusted)).await.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_authentication_checked_before_urn() {
    let app = app(Arc::new(MemoryKeyStore::new()));

    let response = send(&app, post("not-a-urn", None, &sample_store_body())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_store_invalid_urn_bad_request() {
    let app = app(Arc::new(MemoryKeyStore::new()));

    let response = send(&app, post("urn:sm:user", Some(ALICE), &sample_store_body())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid URN format");
}

#[tokio::test]
async fn test_ownership_checked_before_body() {
    let app = app(Arc::new(MemoryKeyStore::new()));

    let response = send(&app, post("urn:sm:user:alice", Some(BOB), "not json")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_store_malformed_json_bad_request() {
    let app = app(Arc::new(MemoryKeyStore::new()));

    for body in ["not json", r#"{"encKey":"!!!","sigKey":"BAUG"}"#, r#""keys""#] {
        let response = send(&app, post("urn:sm:user:alice", Some(ALICE), body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(body_json(response).await["error"], "Invalid JSON body format");
    }
}

#[tokio::test]
async fn test_get_invalid_urn_bad_request() {
    let app = app(Arc::new(MemoryKeyStore::new()));

    let response = send(&app, get("urn:sm:user:alice:extra")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_URN");
}

// Storage must not be touched when a request is rejected

#[tokio::test]
async fn test_rejected_requests_never_reach_storage() {
    let mut store = MockStore::new();
    store.expect_store_public_keys().never();
    store.expect_get_public_keys().never();
    let app = app(Arc::new(store));

    let cases = [
        post("urn:sm:user:alice", None, &sample_store_body()),
        post("urn:sm:user:alice", Some(BOB), &sample_store_body()),
        post("bad-urn", Some(ALICE), &sample_store_body()),
        post("urn:sm:user:alice", Some(ALICE), "{"),
        post("urn:sm:user:alice", Some(ALICE), &store_body(SAMPLE_ENC_KEY, b"")),
        post("urn:sm:user:alice", Some(ALICE), &store_body(b"", SAMPLE_SIG_KEY)),
        post("urn:sm:user:alice", Some(ALICE), "{}"),
        get("urn:bad"),
    ];

    for request in cases {
        let response = send(&app, request).await;
        assert!(response.status().is_client_error());
    }
}

// Storage failures

#[tokio::test]
async fn test_store_backend_failure_internal_error() {
    let mut store = MockStore::new();
    store
        .expect_store_public_keys()
        .times(1)
        .returning(|urn, _| Err(StorageError::connection(urn.as_str(), "connection refused")));
    let app = app(Arc::new(store));

    let response = send(&app, post("urn:sm:user:alice", Some(ALICE), &sample_store_body())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to store public keys");
    assert!(!body.to_string().contains("connection refused"));
}

#[tokio::test]
async fn test_get_backend_failure_internal_error() {
    let mut store = MockStore::new();
    store
        .expect_get_public_keys()
        .returning(|urn| Err(StorageError::backend(urn.as_str(), "boom")));
    let app = app(Arc::new(store));

    let response = send(&app, get("urn:sm:user:alice")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "STORAGE_FAILURE");
}

#[tokio::test]
async fn test_get_unknown_format_not_found() {
    let mut store = MockStore::new();
    store
        .expect_get_public_keys()
        .returning(|urn| Err(StorageError::unknown_format(urn.as_str())));
    let app = app(Arc::new(store));

    let response = send(&app, get("urn:sm:user:alice")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Key not found");
}

#[tokio::test]
async fn test_store_passes_canonical_urn_and_keys() {
    let mut store = MockStore::new();
    store
        .expect_store_public_keys()
        .withf(|urn, keys| {
            urn.as_str() == "urn:sm:user:alice"
                && keys.enc_key == SAMPLE_ENC_KEY
                && keys.sig_key == SAMPLE_SIG_KEY
        })
        .times(1)
        .returning(|_, _| Ok(()));
    let app = app(Arc::new(store));

    let response = send(&app, post("URN:sm:user:alice", Some(ALICE), &sample_store_body())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

// Deadlines and shutdown

#[tokio::test]
async fn test_storage_deadline_service_unavailable() {
    let options = ServiceOptions {
        request_timeout: Duration::from_millis(20),
        ..options()
    };
    let app = KeyService::new(Arc::new(StalledStore), authenticator(), options).router();

    let response = send(&app, get("urn:sm:user:alice")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_shutdown_deadline_cancels_in_flight_store() {
    let service = service(Arc::new(StalledStore));
    let shutdown = service.shutdown_handle();
    let app = service.router();

    let in_flight = tokio::spawn(
        app.oneshot(post("urn:sm:user:alice", Some(ALICE), &sample_store_body())),
    );
    tokio::time::sleep(Duration::from_millis(20)).await;

    shutdown.initiate();
    shutdown.clone().enforce_deadline(Duration::from_millis(10)).await;

    let response = in_flight.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// Retries and overwrites

#[tokio::test]
async fn test_repeated_store_is_idempotent() {
    let app = app(Arc::new(MemoryKeyStore::new()));

    for _ in 0..3 {
        let response = send(&app, post("urn:sm:user:alice", Some(ALICE), &sample_store_body())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = send(&app, get("urn:sm:user:alice")).await;
    assert_eq!(body_text(response).await, sample_store_body());
}

#[tokio::test]
async fn test_store_replaces_legacy_document() {
    let store = MemoryKeyStore::new();
    store
        .store_legacy_key(&urn("urn:sm:user:alice"), b"old-key")
        .await
        .unwrap();
    let app = app(Arc::new(store));

    let response = send(&app, post("urn:sm:user:alice", Some(ALICE), &sample_store_body())).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, get("urn:sm:user:alice")).await;
    assert_eq!(body_text(response).await, sample_store_body());
}

// CORS, health and metrics

#[tokio::test]
async fn test_options_without_cors_layer_no_content() {
    let state = ApiState::new(
        Arc::new(MemoryKeyStore::new()),
        ShutdownCoordinator::new(),
        Duration::from_secs(1),
    );
    let app = api::router(state, authenticator());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(keys_path(&user_urn(ALICE)))
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_options_answered_by_cors_layer() {
    let app = app(Arc::new(MemoryKeyStore::new()));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(keys_path(&user_urn(ALICE)))
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_cors_preflight_allowed_origin() {
    let app = app(Arc::new(MemoryKeyStore::new()));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(keys_path(&user_urn(ALICE)))
        .header(ORIGIN, "http://localhost:4200")
        .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert!(response.status().is_success());
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:4200"
    );
}

#[tokio::test]
async fn test_cross_origin_get_carries_allow_origin() {
    let store = Arc::new(MemoryKeyStore::new());
    let keys = PublicKeys::new(SAMPLE_ENC_KEY.to_vec(), SAMPLE_SIG_KEY.to_vec());
    store.store_public_keys(&urn(&user_urn(ALICE)), &keys).await.unwrap();
    let app = app(store);

    let request = Request::builder()
        .method(Method::GET)
        .uri(keys_path(&user_urn(ALICE)))
        .header(ORIGIN, "http://localhost:4200")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:4200"
    );
    assert!(body_json(response).await["encKey"].is_string());
}

#[tokio::test]
async fn test_cors_unlisted_origin_gets_no_allow_header() {
    let app = app(Arc::new(MemoryKeyStore::new()));

    let request = Request::builder()
        .method(Method::GET)
        .uri(keys_path(&user_urn(ALICE)))
        .header(ORIGIN, "http://evil.test")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_health_and_readiness() {
    let service = service(Arc::new(MemoryKeyStore::new()));
    let app = service.router();

    let request = || Request::builder().uri("/readyz").body(Body::empty()).unwrap();

    let response = send(&app, Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");

    assert_eq!(send(&app, request()).await.status(), StatusCode::SERVICE_UNAVAILABLE);

    service.state().mark_ready();
    assert_eq!(send(&app, request()).await.status(), StatusCode::OK);

    service.shutdown_handle().initiate();
    assert_eq!(send(&app, request()).await.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = app(Arc::new(MemoryKeyStore::new()));
    send(&app, get("urn:sm:user:ghost")).await;

    let response = send(&app, Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    assert!(text.contains("key_service_requests_total"));
    assert!(text.contains("not_found"));
}

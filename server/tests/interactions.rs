//! End-to-end tests of the interactions endpoint through the router.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ed25519_dalek::{Signer, SigningKey};
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use relay::broker::{FollowUpError, FollowUpSink, FollowUpTarget};
use relay::web::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use relay::{
    build_router, ActionKind, AppState, Authenticator, Credential, Credentials,
    DeferredResponseBroker, Dispatcher, HandlerRegistry,
};

const TIMESTAMP: &str = "1700000000";

/// Sink that records follow-up content after a delay.
#[derive(Default)]
struct SlowSink {
    delay: Duration,
    delivered: Mutex<Vec<String>>,
}

impl FollowUpSink for SlowSink {
    fn edit_original<'a>(
        &'a self,
        _target: &'a FollowUpTarget,
        content: &'a str,
    ) -> BoxFuture<'a, Result<(), FollowUpError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.delivered.lock().unwrap().push(content.to_string());
            Ok(())
        })
    }
}

fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

fn public_key_hex() -> String {
    hex::encode(signing_key().verifying_key().to_bytes())
}

fn sign(timestamp: &str, body: &str) -> String {
    let mut message = timestamp.as_bytes().to_vec();
    message.extend_from_slice(body.as_bytes());
    hex::encode(signing_key().sign(&message).to_bytes())
}

fn registry() -> HandlerRegistry {
    HandlerRegistry::new()
        .on(ActionKind::ApplicationCommand, |interaction, ctx| async move {
            match interaction.command_name() {
                Some("slow") => {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    ctx.reply("too slow");
                }
                Some("late") => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    ctx.reply("late answer");
                }
                Some("edit") => {
                    ctx.reply("first");
                    ctx.edit_reply("second");
                }
                Some("fail") => {
                    ctx.reply("still fine");
                    anyhow::bail!("failed after reply");
                }
                _ => {
                    ctx.reply("A");
                    ctx.reply("B");
                }
            }
            Ok(())
        })
}

struct TestApp {
    router: Router,
    broker: DeferredResponseBroker,
    sink: Arc<SlowSink>,
}

fn app_with(credentials: Credentials, deadline: Duration) -> TestApp {
    let sink = Arc::new(SlowSink {
        delay: Duration::from_millis(300),
        ..SlowSink::default()
    });
    let broker = DeferredResponseBroker::new(sink.clone(), deadline, 8);
    let dispatcher = Dispatcher::new(registry(), broker.clone());
    let state = AppState::new(Authenticator::new(credentials), dispatcher);

    TestApp {
        router: build_router(state),
        broker,
        sink,
    }
}

fn app() -> TestApp {
    app_with(
        Credentials::new(Credential::Static(public_key_hex())),
        Duration::from_secs(2),
    )
}

fn signed_post(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/interactions")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, sign(TIMESTAMP, body))
        .header(TIMESTAMP_HEADER, TIMESTAMP)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_ping_returns_pong() {
    let app = app();

    let response = app
        .router
        .oneshot(signed_post(r#"{"id":"1","type":1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"type": 1}));
    assert_eq!(app.broker.pending(), 0);
}

#[tokio::test]
async fn test_invalid_signature_is_unauthorized() {
    let app = app();
    let body = r#"{"id":"1","type":1}"#;

    let request = Request::builder()
        .method("POST")
        .uri("/interactions")
        .header(SIGNATURE_HEADER, sign(TIMESTAMP, r#"{"id":"2","type":1}"#))
        .header(TIMESTAMP_HEADER, TIMESTAMP)
        .body(Body::from(body))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_is_method_not_allowed() {
    let app = app();

    let request = Request::builder()
        .method("GET")
        .uri("/interactions")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_type_is_bad_request() {
    let app = app();

    let response = app
        .router
        .oneshot(signed_post(r#"{"id":"1","type":99}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Unknown Type"}));
}

#[tokio::test]
async fn test_missing_headers_is_bad_request() {
    let app = app();

    let request = Request::builder()
        .method("POST")
        .uri("/interactions")
        .header(TIMESTAMP_HEADER, TIMESTAMP)
        .body(Body::from(r#"{"type":1}"#))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unregistered_kind_is_not_implemented() {
    let app = app();

    let response = app
        .router
        .oneshot(signed_post(r#"{"id":"1","type":5,"token":"t"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(json_body(response).await, json!({"error": "Not Implemented"}));
}

#[tokio::test]
async fn test_first_reply_wins() {
    let app = app();

    let response = app
        .router
        .oneshot(signed_post(
            r#"{"id":"1","application_id":"app","type":2,"token":"t","data":{"name":"hello"}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"type": 4, "data": {"content": "A"}})
    );
}

#[tokio::test]
async fn test_edit_reply_completes_after_response() {
    let app = app();

    let started = Instant::now();
    let response = app
        .router
        .oneshot(signed_post(
            r#"{"id":"1","application_id":"app","type":2,"token":"t","data":{"name":"edit"}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"type": 4, "data": {"content": "first"}})
    );
    assert!(started.elapsed() < Duration::from_millis(300));
    assert!(app.sink.delivered.lock().unwrap().is_empty());

    app.broker.shutdown(Duration::from_secs(5)).await;
    assert_eq!(*app.sink.delivered.lock().unwrap(), vec!["second".to_string()]);
}

#[tokio::test]
async fn test_failure_after_reply_keeps_response() {
    let app = app();

    let response = app
        .router
        .oneshot(signed_post(
            r#"{"id":"1","application_id":"app","type":2,"token":"t","data":{"name":"fail"}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"type": 4, "data": {"content": "still fine"}})
    );
    app.broker.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_slow_handler_gets_deferred_ack() {
    let app = app_with(
        Credentials::new(Credential::Static(public_key_hex())),
        Duration::from_millis(100),
    );

    let response = app
        .router
        .oneshot(signed_post(
            r#"{"id":"1","application_id":"app","type":2,"token":"t","data":{"name":"slow"}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"type": 5}));
    app.broker.shutdown(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_late_reply_edits_deferred_ack() {
    let app = app_with(
        Credentials::new(Credential::Static(public_key_hex())),
        Duration::from_millis(50),
    );

    let response = app
        .router
        .oneshot(signed_post(
            r#"{"id":"1","application_id":"app","type":2,"token":"t","data":{"name":"late"}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(json_body(response).await, json!({"type": 5}));
    app.broker.shutdown(Duration::from_secs(5)).await;
    assert_eq!(
        *app.sink.delivered.lock().unwrap(),
        vec!["late answer".to_string()]
    );
}

#[tokio::test]
async fn test_unresolved_credential_is_server_error() {
    let app = app_with(
        Credentials::new(Credential::derived(|_| None)),
        Duration::from_secs(2),
    );

    let response = app
        .router
        .oneshot(signed_post(r#"{"id":"1","type":1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_derived_credential_by_host() {
    let key = public_key_hex();
    let app = app_with(
        Credentials::new(Credential::derived(move |headers| {
            let host = headers.get("host")?.to_str().ok()?;
            (host == "tenant.example").then(|| key.clone())
        })),
        Duration::from_secs(2),
    );

    let body = r#"{"id":"1","type":1}"#;
    let request = Request::builder()
        .method("POST")
        .uri("/interactions")
        .header("host", "tenant.example")
        .header(SIGNATURE_HEADER, sign(TIMESTAMP, body))
        .header(TIMESTAMP_HEADER, TIMESTAMP)
        .body(Body::from(body))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_root_and_not_found() {
    let app = app();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&text[..], relay::web::LIVENESS_TEXT.as_bytes());

    let request = Request::builder()
        .uri("/nowhere")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

//! Integration Tests for the proxy and worker events
//!
//! Runs a real axum origin on a loopback port and drives the worker through
//! the router (tower `oneshot`) and through its library entry points.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use offline_worker::{
    api::{create_router, AppState},
    config::Config,
    error::{Result, WorkerError},
    fetch::{FetchRequest, FetchResponse, HttpTransport, ResponseSource, Transport},
    notify::RecordingSink,
    sync::SyncQueue,
    worker::{OfflineWorker, SyncOutcome},
};
use serde_json::Value;
use tower::ServiceExt;

// == Test Origin ==

#[derive(Clone, Default)]
struct OriginState {
    tracked: Arc<Mutex<Vec<String>>>,
    song_hits: Arc<AtomicUsize>,
}

async fn track(State(state): State<OriginState>, body: Bytes) -> StatusCode {
    state
        .tracked
        .lock()
        .unwrap()
        .push(String::from_utf8_lossy(&body).into_owned());
    StatusCode::NO_CONTENT
}

async fn songs(State(state): State<OriginState>) -> &'static str {
    state.song_hits.fetch_add(1, Ordering::SeqCst);
    r#"[{"title":"First Demo"}]"#
}

/// Spawns an origin serving the default precache manifest.
async fn spawn_origin() -> (String, OriginState) {
    let state = OriginState::default();
    let app = Router::new()
        .route("/", get(|| async { "<html>home</html>" }))
        .route("/styles.css", get(|| async { "body{}" }))
        .route("/app.js", get(|| async { "console.log('app')" }))
        .route("/offline.html", get(|| async { "<html>offline</html>" }))
        .route("/api/health", get(|| async { r#"{"ok":true}"# }))
        .route("/api/songs", get(songs))
        .route("/api/analytics/track", post(track))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

fn test_config(origin: &str) -> Config {
    Config {
        origin_url: origin.to_string(),
        connectivity_interval: 0,
        ..Config::default()
    }
}

/// HTTP transport that can be switched offline, failing like a dropped network.
struct SwitchableTransport {
    inner: HttpTransport,
    online: Arc<AtomicBool>,
}

impl Transport for SwitchableTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(WorkerError::Network("network unreachable".to_string()));
        }
        self.inner.fetch(request).await
    }
}

async fn switchable_worker(origin: &str) -> (OfflineWorker<SwitchableTransport>, Arc<AtomicBool>, Arc<RecordingSink>) {
    let config = test_config(origin);
    let online = Arc::new(AtomicBool::new(true));
    let transport = SwitchableTransport {
        inner: HttpTransport::new(origin, Duration::from_secs(5)).unwrap(),
        online: online.clone(),
    };
    let sink = Arc::new(RecordingSink::new(10));
    let queue = SyncQueue::new(config.sync_endpoint_prefix.clone());
    let worker = OfflineWorker::new(config, transport, queue, sink.clone());
    (worker, online, sink)
}

async fn installed_app(origin: &str) -> Router {
    let state = AppState::from_config(&test_config(origin)).await.unwrap();
    state.worker.install().await.unwrap();
    create_router(state)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// == Proxy Tests ==

#[tokio::test]
async fn test_precached_asset_served_from_cache() {
    let (origin, _) = spawn_origin().await;
    let app = installed_app(&origin).await;

    let response = app
        .oneshot(Request::builder().uri("/app.js").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-offline-source"], "cache");
    assert_eq!(body_to_string(response.into_body()).await, "console.log('app')");
}

#[tokio::test]
async fn test_api_response_cached_after_first_request() {
    let (origin, origin_state) = spawn_origin().await;
    let app = installed_app(&origin).await;

    let first = app
        .clone()
        .oneshot(Request::builder().uri("/api/songs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-offline-source"], "network");
    let first_body = body_to_string(first.into_body()).await;

    let second = app
        .oneshot(Request::builder().uri("/api/songs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(second.headers()["x-offline-source"], "cache");
    assert_eq!(body_to_string(second.into_body()).await, first_body);

    assert_eq!(origin_state.song_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_asset_passes_through_uncached() {
    let (origin, _) = spawn_origin().await;
    let app = installed_app(&origin).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/missing.png").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-offline-source"], "network");

    let stats = app
        .oneshot(Request::builder().uri("/__worker/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_to_json(stats.into_body()).await;
    assert_eq!(json["cache"]["total_entries"], 5);
}

#[tokio::test]
async fn test_health_api_through_running_proxy() {
    let (origin, _) = spawn_origin().await;
    let app = installed_app(&origin).await;

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let proxy = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let response = reqwest::get(format!("http://{}/api/health", proxy)).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()["x-offline-source"], "cache");
    assert_eq!(response.text().await.unwrap(), r#"{"ok":true}"#);
}

// == Control Endpoint Tests ==

#[tokio::test]
async fn test_install_endpoint_replaces_generation() {
    let (origin, _) = spawn_origin().await;
    let app = installed_app(&origin).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/__worker/install")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"generation":"not-a-label-v2","manifest":["/","/offline.html"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["generation"], "not-a-label-v2");
    assert_eq!(json["activated"], true);
    assert_eq!(json["purged"], 1);

    let health = app
        .oneshot(Request::builder().uri("/__worker/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_to_json(health.into_body()).await;
    assert_eq!(json["generation"], "not-a-label-v2");
}

#[tokio::test]
async fn test_install_with_missing_asset_fails() {
    let (origin, _) = spawn_origin().await;
    let app = installed_app(&origin).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/__worker/install")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"generation":"v2","manifest":["/","/nope.css"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("/nope.css"));
}

#[tokio::test]
async fn test_push_endpoint_shows_notification() {
    let (origin, _) = spawn_origin().await;
    let app = installed_app(&origin).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/__worker/push")
                .body(Body::from("New update"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["title"], "Not a Label");
    assert_eq!(json["body"], "New update");
    assert_eq!(json["actions"][0]["action"], "explore");

    let shown = app
        .oneshot(
            Request::builder()
                .uri("/__worker/notifications")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_to_json(shown.into_body()).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_message_endpoint_clear_cache() {
    let (origin, _) = spawn_origin().await;
    let app = installed_app(&origin).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/__worker/message")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"type":"CLEAR_CACHE"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["result"], "cleared");
    assert_eq!(json["entries"], 5);
}

// == Offline Behavior Tests ==

#[tokio::test]
async fn test_offline_navigation_gets_fallback_document() {
    let (origin, _) = spawn_origin().await;
    let (worker, online, _) = switchable_worker(&origin).await;
    worker.install().await.unwrap();

    online.store(false, Ordering::SeqCst);
    let outcome = worker
        .fetch(FetchRequest::navigate("/dashboard"))
        .await
        .unwrap();

    assert_eq!(outcome.source, ResponseSource::Fallback);
    assert_eq!(outcome.response.body(), b"<html>offline</html>".as_slice());

    let err = worker.fetch(FetchRequest::get("/api/songs")).await.unwrap_err();
    assert!(matches!(err, WorkerError::Network(_)));
}

#[tokio::test]
async fn test_queued_analytics_drain_on_sync() {
    let (origin, origin_state) = spawn_origin().await;
    let (worker, online, _) = switchable_worker(&origin).await;
    worker.install().await.unwrap();

    online.store(false, Ordering::SeqCst);
    for event in [r#"{"event":"play"}"#, r#"{"event":"pause"}"#] {
        let request = FetchRequest::new("POST", "/api/analytics/track")
            .with_header("content-type", "application/json")
            .with_body(event);
        let outcome = worker.fetch(request).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Queued);
        assert_eq!(outcome.response.status, 202);
    }
    assert_eq!(worker.queue().len().await, 2);

    // Still offline: the first record blocks and nothing is lost
    match worker.sync("sync-analytics").await.unwrap() {
        SyncOutcome::Drained(report) => {
            assert_eq!(report.replayed, 0);
            assert_eq!(report.remaining, 2);
        }
        other => panic!("unexpected sync outcome {:?}", other),
    }

    online.store(true, Ordering::SeqCst);
    match worker.sync("sync-analytics").await.unwrap() {
        SyncOutcome::Drained(report) => {
            assert_eq!(report.replayed, 2);
            assert_eq!(report.remaining, 0);
        }
        other => panic!("unexpected sync outcome {:?}", other),
    }

    let tracked = origin_state.tracked.lock().unwrap().clone();
    assert_eq!(tracked, vec![r#"{"event":"play"}"#, r#"{"event":"pause"}"#]);
    assert!(worker.queue().is_empty().await);
}

#[tokio::test]
async fn test_empty_push_uses_default_body() {
    let (origin, _) = spawn_origin().await;
    let (worker, _, sink) = switchable_worker(&origin).await;

    let intent = worker.push(None).await;

    assert_eq!(intent.body, "New update from Not a Label");
    assert_eq!(intent.vibrate, vec![200, 100, 200]);
    assert_eq!(sink.shown().len(), 1);

    let navigation = worker.notification_click("explore", &intent).unwrap();
    assert_eq!(navigation.url, "/dashboard/notifications");
    assert!(worker.notification_click("close", &intent).is_none());
}

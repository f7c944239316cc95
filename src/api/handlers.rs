//! API Handlers
//!
//! The proxy fallback that routes every application request through the
//! worker, plus the `/__worker` control endpoints that deliver runtime events.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Path, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::config::Config;
use crate::error::{Result, WorkerError};
use crate::fetch::{Destination, FetchOutcome, FetchRequest, HttpTransport};
use crate::models::{
    ClickRequest, ClickResponse, HealthResponse, InstallRequest, QueueResponse, StatsResponse,
};
use crate::notify::{NotificationIntent, RecordingSink};
use crate::worker::{ActivateReport, InstallReport, MessageReply, OfflineWorker, SyncOutcome, WorkerMessage};

/// Response header naming where a proxied response came from.
pub const SOURCE_HEADER: &str = "x-offline-source";

/// Largest request body the proxy buffers.
const MAX_PROXY_BODY: usize = 10 * 1024 * 1024;

/// Displayed notifications kept for GET /__worker/notifications.
const NOTIFICATION_LOG_SIZE: usize = 50;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<OfflineWorker<HttpTransport>>,
    /// Sink the worker displays notifications through
    pub notifications: Arc<RecordingSink>,
}

impl AppState {
    pub fn new(worker: Arc<OfflineWorker<HttpTransport>>, notifications: Arc<RecordingSink>) -> Self {
        Self {
            worker,
            notifications,
        }
    }

    /// Builds the transport, notification sink and worker from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.origin_url, Duration::from_secs(config.request_timeout))?;
        let notifications = Arc::new(RecordingSink::new(NOTIFICATION_LOG_SIZE));
        let worker = OfflineWorker::from_config(config.clone(), transport, notifications.clone()).await?;
        Ok(Self::new(Arc::new(worker), notifications))
    }
}

/// Fallback handler: every non-control request goes through the interceptor.
pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_PROXY_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return WorkerError::InvalidRequest(format!("Unreadable request body: {}", e)).into_response()
        }
    };

    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let mut fetch = FetchRequest::new(parts.method.as_str(), url)
        .with_destination(destination_of(&parts.method, &parts.headers))
        .with_body(body.to_vec());
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            fetch.headers.push((name.as_str().to_string(), value.to_string()));
        }
    }

    match state.worker.fetch(fetch).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => e.into_response(),
    }
}

/// Handler for POST /__worker/install
///
/// Installs a generation; an empty body installs the configured one.
pub async fn install_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<InstallReport>> {
    let req: InstallRequest = if body.is_empty() {
        InstallRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| WorkerError::InvalidRequest(e.to_string()))?
    };
    if let Some(error_msg) = req.validate() {
        return Err(WorkerError::InvalidRequest(error_msg));
    }

    let config = state.worker.config();
    let generation = req.generation.unwrap_or_else(|| config.cache_name.clone());
    let manifest = req.manifest.unwrap_or_else(|| config.precache_manifest.clone());

    let report = state.worker.install_generation(&generation, &manifest).await?;
    Ok(Json(report))
}

/// Handler for POST /__worker/activate
pub async fn activate_handler(State(state): State<AppState>) -> Result<Json<ActivateReport>> {
    Ok(Json(state.worker.activate().await?))
}

/// Handler for POST /__worker/sync/:tag
///
/// Delivers a reconnection signal.
pub async fn sync_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<SyncOutcome>> {
    Ok(Json(state.worker.sync(&tag).await?))
}

/// Handler for POST /__worker/push
///
/// The raw body is the push payload; an empty body means no payload.
pub async fn push_handler(State(state): State<AppState>, body: Bytes) -> Json<NotificationIntent> {
    let payload = (!body.is_empty()).then_some(&body[..]);
    Json(state.worker.push(payload).await)
}

/// Handler for POST /__worker/notifications/click
pub async fn notification_click_handler(
    State(state): State<AppState>,
    Json(req): Json<ClickRequest>,
) -> Json<ClickResponse> {
    let navigation = state.worker.notification_click(&req.action, &req.intent);
    Json(ClickResponse {
        action: req.action,
        navigate: navigation.map(|n| n.url),
    })
}

/// Handler for GET /__worker/notifications
pub async fn notifications_handler(State(state): State<AppState>) -> Json<Vec<NotificationIntent>> {
    Json(state.notifications.shown())
}

/// Handler for POST /__worker/message
pub async fn message_handler(
    State(state): State<AppState>,
    Json(message): Json<WorkerMessage>,
) -> Result<Json<MessageReply>> {
    Ok(Json(state.worker.message(message).await?))
}

/// Handler for GET /__worker/queue
pub async fn queue_handler(State(state): State<AppState>) -> Json<QueueResponse> {
    let queue = state.worker.queue();
    Json(QueueResponse::new(queue.snapshot().await, queue.is_draining()))
}

/// Handler for GET /__worker/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.worker.stats().await))
}

/// Handler for GET /__worker/health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let generation = state
        .worker
        .cache()
        .read()
        .await
        .current_generation()
        .map(str::to_string);
    Json(HealthResponse::healthy(generation))
}

/// Infers the fetch destination of an inbound request.
pub fn destination_of(method: &Method, headers: &HeaderMap) -> Destination {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(dest) = header_str("sec-fetch-dest") {
        return Destination::from_fetch_dest(dest);
    }
    if header_str("sec-fetch-mode") == Some("navigate") {
        return Destination::Document;
    }
    let wants_html = header_str(header::ACCEPT.as_str()).is_some_and(|accept| accept.contains("text/html"));
    if method == Method::GET && wants_html {
        Destination::Document
    } else {
        Destination::Empty
    }
}

fn outcome_response(outcome: FetchOutcome) -> Response {
    let FetchOutcome { mut response, source } = outcome;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let headers = std::mem::take(&mut response.headers);

    let mut http = Response::new(Body::from(response.into_body()));
    *http.status_mut() = status;
    let http_headers = http.headers_mut();
    for (name, value) in headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                http_headers.append(name, value);
            }
            _ => warn!("Dropping invalid response header '{}'", name),
        }
    }
    http_headers.insert(SOURCE_HEADER, HeaderValue::from_static(source.as_str()));
    http
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_destination_from_fetch_metadata() {
        let dest = destination_of(&Method::GET, &headers(&[("sec-fetch-dest", "image")]));
        assert_eq!(dest, Destination::Image);

        let dest = destination_of(&Method::GET, &headers(&[("sec-fetch-mode", "navigate")]));
        assert_eq!(dest, Destination::Document);
    }

    #[test]
    fn test_destination_from_accept_header() {
        let html = headers(&[("accept", "text/html,application/xhtml+xml")]);
        assert_eq!(destination_of(&Method::GET, &html), Destination::Document);
        assert_eq!(destination_of(&Method::POST, &html), Destination::Empty);
        assert_eq!(destination_of(&Method::GET, &HeaderMap::new()), Destination::Empty);
    }

    #[test]
    fn test_outcome_response_sets_source_header() {
        use crate::fetch::{FetchResponse, ResponseSource, ResponseType};

        let outcome = FetchOutcome {
            response: FetchResponse::new(
                200,
                ResponseType::Basic,
                "/",
                vec![("content-type".to_string(), "text/html".to_string())],
                b"<html>".to_vec(),
            ),
            source: ResponseSource::Cache,
        };
        let response = outcome_response(outcome);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SOURCE_HEADER], "cache");
        assert_eq!(response.headers()["content-type"], "text/html");
    }
}

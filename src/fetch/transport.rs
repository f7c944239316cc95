//! Network transport behind the interceptor.
//!
//! [`Transport`] is the seam between the offline layer and the real network;
//! [`HttpTransport`] forwards to the origin server with reqwest.

use std::future::Future;
use std::time::Duration;

use reqwest::{Method, Url};
use tracing::debug;

use crate::error::{Result, WorkerError};
use crate::fetch::{FetchRequest, FetchResponse, ResponseType};

/// Request headers owned by the connection, never forwarded upstream.
const SKIPPED_REQUEST_HEADERS: [&str; 5] =
    ["host", "connection", "content-length", "transfer-encoding", "keep-alive"];

/// Response headers recomputed by whoever serves the body.
const SKIPPED_RESPONSE_HEADERS: [&str; 3] = ["content-length", "transfer-encoding", "connection"];

/// Performs a real network exchange.
///
/// An `Err` means the network was unreachable or the exchange broke midway;
/// any HTTP status, including errors, is an `Ok` response.
pub trait Transport: Send + Sync + 'static {
    fn fetch(&self, request: FetchRequest) -> impl Future<Output = Result<FetchResponse>> + Send;
}

// == HTTP Transport ==
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    origin: Url,
}

impl HttpTransport {
    /// Creates a transport for `origin` with a per-request timeout.
    pub fn new(origin: &str, timeout: Duration) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| WorkerError::InvalidRequest(format!("Invalid origin '{}': {}", origin, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolves `url` against the origin. Anything landing on another
    /// origin (absolute or scheme-relative URLs) is rejected.
    fn resolve(&self, url: &str) -> Result<Url> {
        let resolved = self
            .origin
            .join(url)
            .map_err(|e| WorkerError::InvalidRequest(format!("Invalid URL '{}': {}", url, e)))?;
        if resolved.origin() != self.origin.origin() {
            return Err(WorkerError::InvalidRequest(format!(
                "URL '{}' leaves origin {}",
                url,
                self.origin.as_str()
            )));
        }
        Ok(resolved)
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let url = self.resolve(&request.url)?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| WorkerError::InvalidRequest(format!("Invalid method '{}'", request.method)))?;

        let mut builder = self.client.request(method, url);
        for (name, value) in &request.headers {
            if !SKIPPED_REQUEST_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| WorkerError::Network(e.to_string()))?;

        let response_type = if response.url().origin() == self.origin.origin() {
            ResponseType::Basic
        } else {
            ResponseType::Opaque
        };
        let status = response.status().as_u16();
        let final_url = match response_type {
            ResponseType::Basic => path_and_query(response.url()),
            _ => response.url().to_string(),
        };
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| {
                !SKIPPED_RESPONSE_HEADERS
                    .iter()
                    .any(|h| h.eq_ignore_ascii_case(name.as_str()))
            })
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| WorkerError::Network(e.to_string()))?
            .to_vec();

        debug!("{} {} -> {}", request.method, request.url, status);
        Ok(FetchResponse::new(status, response_type, final_url, headers, body))
    }
}

/// Origin-relative form of a same-origin URL.
fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

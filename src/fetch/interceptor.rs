//! Cache-first fetch interceptor.
//!
//! Order of operations for every request:
//! 1. Look the request up in the current cache generation. A hit is served
//!    as-is and never revalidated; staleness is bounded only by generation
//!    turnover.
//! 2. On a miss, go to the network. A 200 same-origin GET response is
//!    duplicated: the duplicate is written into the current generation and
//!    the original is returned untouched.
//! 3. When the network is unreachable, navigations get the offline fallback
//!    document, replayable writes are queued, everything else fails.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{CacheStore, RequestKey};
use crate::error::{Result, WorkerError};
use crate::fetch::{FetchRequest, FetchResponse, ResponseType, Transport};
use crate::sync::SyncQueue;

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    Fallback,
    Queued,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Fallback => "fallback",
            ResponseSource::Queued => "queued",
        }
    }
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub response: FetchResponse,
    pub source: ResponseSource,
}

/// Counters for decisions the cache store cannot see.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterceptorStats {
    pub network_fetches: u64,
    pub network_failures: u64,
    pub fallbacks_served: u64,
    pub writes_queued: u64,
}

#[derive(Debug, Default)]
struct Counters {
    network_fetches: AtomicU64,
    network_failures: AtomicU64,
    fallbacks_served: AtomicU64,
    writes_queued: AtomicU64,
}

// == Fetch Interceptor ==
pub struct FetchInterceptor<T: Transport> {
    cache: Arc<RwLock<CacheStore>>,
    transport: Arc<T>,
    queue: Arc<SyncQueue>,
    offline_fallback: String,
    counters: Counters,
}

impl<T: Transport> FetchInterceptor<T> {
    pub fn new(
        cache: Arc<RwLock<CacheStore>>,
        transport: Arc<T>,
        queue: Arc<SyncQueue>,
        offline_fallback: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            transport,
            queue,
            offline_fallback: offline_fallback.into(),
            counters: Counters::default(),
        }
    }

    // == Handle ==
    /// Applies the cache-first policy to one request.
    ///
    /// The cache write for an eligible response completes before this
    /// returns. A failed cache write is logged and the response still flows.
    pub async fn handle(&self, request: FetchRequest) -> Result<FetchOutcome> {
        let key = request.key();

        // Write lock: lookups update hit/miss counters
        let cached = self.cache.write().await.lookup(&key);
        if let Some(snapshot) = cached {
            debug!("Cache hit {}", key);
            return Ok(FetchOutcome {
                response: FetchResponse::from_snapshot(snapshot),
                source: ResponseSource::Cache,
            });
        }

        let is_navigation = request.destination.is_navigation();
        let deferred = (request.is_write() && self.queue.accepts(&key))
            .then(|| (request.headers.clone(), request.body.clone()));

        self.counters.network_fetches.fetch_add(1, Ordering::Relaxed);
        match self.transport.fetch(request).await {
            Ok(response) => {
                if is_cacheable(&key, &response) {
                    self.mirror(key, &response).await;
                } else {
                    debug!("Not caching {} (status {}, {:?})", key, response.status, response.response_type);
                }
                Ok(FetchOutcome {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(err) => {
                self.counters.network_failures.fetch_add(1, Ordering::Relaxed);
                self.recover(key, is_navigation, deferred, err).await
            }
        }
    }

    /// Stores an independent copy of `response` in the current generation.
    async fn mirror(&self, key: RequestKey, response: &FetchResponse) {
        let copy = response.duplicate();
        let mut cache = self.cache.write().await;

        let Some(generation) = cache.current_generation().map(str::to_string) else {
            debug!("No active generation, {} not cached", key);
            return;
        };

        let label = key.to_string();
        match cache.put(&generation, key, copy.into_snapshot()) {
            Ok(()) => debug!("Cached {} in '{}'", label, generation),
            Err(e) => warn!("Cache write for {} failed: {}", label, e),
        }
    }

    async fn recover(
        &self,
        key: RequestKey,
        is_navigation: bool,
        deferred: Option<(Vec<(String, String)>, Vec<u8>)>,
        err: WorkerError,
    ) -> Result<FetchOutcome> {
        if let Some((headers, payload)) = deferred {
            return match self.queue.enqueue(key.clone(), headers, payload).await {
                Ok(record) => {
                    self.counters.writes_queued.fetch_add(1, Ordering::Relaxed);
                    debug!("Network down, queued {} as #{}", key, record.id);
                    let body = json!({ "queued": true, "id": record.id }).to_string();
                    Ok(FetchOutcome {
                        response: FetchResponse::new(
                            202,
                            ResponseType::Synthetic,
                            key.url,
                            vec![("content-type".to_string(), "application/json".to_string())],
                            body.into_bytes(),
                        ),
                        source: ResponseSource::Queued,
                    })
                }
                Err(e) => {
                    warn!("Could not queue {}: {}", key, e);
                    Err(err)
                }
            };
        }

        if is_navigation {
            let fallback = self
                .cache
                .write()
                .await
                .lookup(&RequestKey::get(&self.offline_fallback));
            if let Some(snapshot) = fallback {
                self.counters.fallbacks_served.fetch_add(1, Ordering::Relaxed);
                debug!("Network down, serving {} for {}", self.offline_fallback, key);
                return Ok(FetchOutcome {
                    response: FetchResponse::from_snapshot(snapshot),
                    source: ResponseSource::Fallback,
                });
            }
            warn!("Network down and no offline fallback cached for {}", key);
        }

        Err(err)
    }

    pub fn stats(&self) -> InterceptorStats {
        InterceptorStats {
            network_fetches: self.counters.network_fetches.load(Ordering::Relaxed),
            network_failures: self.counters.network_failures.load(Ordering::Relaxed),
            fallbacks_served: self.counters.fallbacks_served.load(Ordering::Relaxed),
            writes_queued: self.counters.writes_queued.load(Ordering::Relaxed),
        }
    }
}

/// Only complete, inspectable answers to GETs are worth replaying later.
fn is_cacheable(key: &RequestKey, response: &FetchResponse) -> bool {
    key.method == "GET" && response.status == 200 && response.response_type == ResponseType::Basic
}

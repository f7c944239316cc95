//! Offline Worker
//!
//! Named async entry points for every runtime event: install, activate,
//! fetch, sync, push, notification click and message. The host awaits each
//! call to completion before treating the triggering event as finished.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStats, CacheStore, RequestKey};
use crate::config::Config;
use crate::error::{Result, WorkerError};
use crate::fetch::{
    FetchInterceptor, FetchOutcome, FetchRequest, InterceptorStats, ResponseType, Transport,
};
use crate::notify::{Navigation, NotificationDispatcher, NotificationIntent, NotificationSink};
use crate::sync::{DrainOutcome, DrainReport, Journal, SyncQueue};

// == Event Results ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub assets: usize,
    pub activated: bool,
    pub purged: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    /// Generation serving lookups after the call
    pub current: Option<String>,
    /// Whether a waiting generation was promoted
    pub activated: bool,
    pub purged: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Tag does not name a known queue
    Ignored,
    AlreadyDraining,
    Drained(DrainReport),
}

/// Control messages posted by the application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Promote the waiting generation now
    SkipWaiting,
    /// Fetch `url` and store it in the current generation
    CacheUrl { url: String },
    /// Drop every entry of the current generation
    ClearCache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MessageReply {
    Activated(ActivateReport),
    Cached { url: String },
    Cleared { entries: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub current_generation: Option<String>,
    pub waiting_generation: Option<String>,
    pub cache: CacheStats,
    pub fetch: InterceptorStats,
    pub queued_writes: usize,
}

// == Offline Worker ==
pub struct OfflineWorker<T: Transport> {
    config: Config,
    cache: Arc<RwLock<CacheStore>>,
    queue: Arc<SyncQueue>,
    transport: Arc<T>,
    interceptor: FetchInterceptor<T>,
    dispatcher: NotificationDispatcher,
    /// Installed generation not yet in control
    waiting: Mutex<Option<String>>,
}

impl<T: Transport> OfflineWorker<T> {
    pub fn new(config: Config, transport: T, queue: SyncQueue, sink: Arc<dyn NotificationSink>) -> Self {
        let cache = Arc::new(RwLock::new(CacheStore::new(config.cache_quota_bytes)));
        let transport = Arc::new(transport);
        let queue = Arc::new(queue);
        let interceptor = FetchInterceptor::new(
            cache.clone(),
            transport.clone(),
            queue.clone(),
            config.offline_fallback.clone(),
        );
        let dispatcher = NotificationDispatcher::new(sink, config.notifications.clone());

        Self {
            config,
            cache,
            queue,
            transport,
            interceptor,
            dispatcher,
            waiting: Mutex::new(None),
        }
    }

    /// Builds the worker, restoring the sync journal when one is configured.
    pub async fn from_config(config: Config, transport: T, sink: Arc<dyn NotificationSink>) -> Result<Self> {
        let queue = match &config.sync_journal_path {
            Some(path) => {
                SyncQueue::with_journal(config.sync_endpoint_prefix.clone(), Journal::new(path)).await?
            }
            None => SyncQueue::new(config.sync_endpoint_prefix.clone()),
        };
        Ok(Self::new(config, transport, queue, sink))
    }

    // == Install ==
    /// Installs the configured generation and manifest.
    pub async fn install(&self) -> Result<InstallReport> {
        let name = self.config.cache_name.clone();
        let manifest = self.config.precache_manifest.clone();
        self.install_generation(&name, &manifest).await
    }

    /// Fetches every manifest asset and commits them as `generation`.
    ///
    /// All or nothing: if any asset fails, nothing is stored and whichever
    /// generation was active stays in control.
    pub async fn install_generation(&self, generation: &str, manifest: &[String]) -> Result<InstallReport> {
        info!("Installing cache generation '{}' ({} assets)", generation, manifest.len());

        let mut staged = Vec::with_capacity(manifest.len());
        for asset in manifest {
            let request = FetchRequest::get(asset.clone());
            let key = request.key();
            let failure = match self.transport.fetch(request).await {
                Ok(response) if response.status == 200 && response.response_type == ResponseType::Basic => {
                    staged.push((key, response.into_snapshot()));
                    continue;
                }
                Ok(response) if response.status != 200 => format!("status {}", response.status),
                Ok(response) => format!("cross-origin response ({:?})", response.response_type),
                Err(e) => e.to_string(),
            };

            error!("Install of '{}' aborted: {} failed ({})", generation, asset, failure);
            return Err(WorkerError::InstallFailed {
                generation: generation.to_string(),
                asset: asset.clone(),
                reason: failure,
            });
        }

        if let Err(e) = self.cache.write().await.install_generation(generation, staged) {
            error!("Install of '{}' aborted: {}", generation, e);
            return Err(e);
        }
        *self.waiting.lock().await = Some(generation.to_string());

        let mut report = InstallReport {
            generation: generation.to_string(),
            assets: manifest.len(),
            activated: false,
            purged: 0,
        };
        if self.config.skip_waiting {
            let activation = self.activate().await?;
            report.activated = activation.activated;
            report.purged = activation.purged;
        }
        Ok(report)
    }

    // == Activate ==
    /// Promotes the waiting generation and purges every other one.
    pub async fn activate(&self) -> Result<ActivateReport> {
        let mut waiting = self.waiting.lock().await;
        let mut cache = self.cache.write().await;

        let Some(name) = waiting.take() else {
            debug!("Activate with no waiting generation");
            return Ok(ActivateReport {
                current: cache.current_generation().map(str::to_string),
                activated: false,
                purged: 0,
            });
        };

        let purged = cache.activate(&name)?;
        info!("Cache generation '{}' active ({} purged)", name, purged);
        Ok(ActivateReport {
            current: Some(name),
            activated: true,
            purged,
        })
    }

    // == Fetch ==
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome> {
        self.interceptor.handle(request).await
    }

    // == Sync ==
    /// Handles a reconnection signal. Unknown tags are ignored.
    pub async fn sync(&self, tag: &str) -> Result<SyncOutcome> {
        if tag != self.config.sync_tag {
            debug!("Ignoring sync tag '{}'", tag);
            return Ok(SyncOutcome::Ignored);
        }

        match self.queue.drain(self.transport.as_ref()).await {
            Ok(DrainOutcome::Completed(report)) => Ok(SyncOutcome::Drained(report)),
            Ok(DrainOutcome::AlreadyDraining) => Ok(SyncOutcome::AlreadyDraining),
            Err(e) => {
                error!("Sync '{}' failed: {}", tag, e);
                Err(e)
            }
        }
    }

    // == Push ==
    pub async fn push(&self, payload: Option<&[u8]>) -> NotificationIntent {
        self.dispatcher.on_push(payload).await
    }

    // == Notification Click ==
    pub fn notification_click(&self, action: &str, intent: &NotificationIntent) -> Option<Navigation> {
        self.dispatcher.on_action(action, intent)
    }

    // == Message ==
    pub async fn message(&self, message: WorkerMessage) -> Result<MessageReply> {
        match message {
            WorkerMessage::SkipWaiting => Ok(MessageReply::Activated(self.activate().await?)),
            WorkerMessage::CacheUrl { url } => {
                self.cache_url(&url).await?;
                Ok(MessageReply::Cached { url })
            }
            WorkerMessage::ClearCache => {
                let mut cache = self.cache.write().await;
                let current = current_or_err(&cache)?;
                let entries = cache.clear_generation(&current)?;
                info!("Cleared {} entries from '{}'", entries, current);
                Ok(MessageReply::Cleared { entries })
            }
        }
    }

    async fn cache_url(&self, url: &str) -> Result<()> {
        let request = FetchRequest::get(url);
        let key = request.key();
        let response = self.transport.fetch(request).await?;
        if response.status != 200 || response.response_type != ResponseType::Basic {
            return Err(WorkerError::InvalidRequest(format!(
                "{} is not cacheable (status {})",
                url, response.status
            )));
        }

        let mut cache = self.cache.write().await;
        let current = current_or_err(&cache)?;
        cache.put(&current, key, response.into_snapshot())
    }

    // == Connectivity ==
    /// Whether the origin answers on the health path. Bypasses the cache.
    pub async fn probe(&self) -> bool {
        match self
            .transport
            .fetch(FetchRequest::get(self.config.health_path.clone()))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!("Connectivity probe failed: {}", e);
                false
            }
        }
    }

    // == Accessors ==
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn cache(&self) -> &Arc<RwLock<CacheStore>> {
        &self.cache
    }

    pub async fn stats(&self) -> WorkerStats {
        let (current_generation, cache) = {
            let store = self.cache.read().await;
            (store.current_generation().map(str::to_string), store.stats())
        };
        WorkerStats {
            current_generation,
            waiting_generation: self.waiting.lock().await.clone(),
            cache,
            fetch: self.interceptor.stats(),
            queued_writes: self.queue.len().await,
        }
    }

    /// Whether `key` is reachable through the current generation.
    pub async fn is_cached(&self, key: &RequestKey) -> bool {
        self.cache.write().await.lookup(key).is_some()
    }

    // == Reset ==
    /// Drops all cache generations, queued writes and the waiting slot.
    pub async fn reset(&self) -> Result<()> {
        self.cache.write().await.reset();
        *self.waiting.lock().await = None;
        let dropped = self.queue.clear().await?;
        if dropped > 0 {
            warn!("Reset dropped {} queued write(s)", dropped);
        }
        Ok(())
    }
}

fn current_or_err(cache: &CacheStore) -> Result<String> {
    cache
        .current_generation()
        .map(str::to_string)
        .ok_or_else(|| WorkerError::InvalidRequest("No active cache generation".to_string()))
}

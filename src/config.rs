//! Configuration Module
//!
//! Handles loading and managing worker configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

// == Defaults ==
const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8080";
const DEFAULT_CACHE_NAME: &str = "not-a-label-v1";
const DEFAULT_MANIFEST: [&str; 5] = ["/", "/styles.css", "/app.js", "/offline.html", "/api/health"];
const DEFAULT_OFFLINE_FALLBACK: &str = "/offline.html";
const DEFAULT_SYNC_TAG: &str = "sync-analytics";
const DEFAULT_SYNC_PREFIX: &str = "/api/analytics/track";
const DEFAULT_HEALTH_PATH: &str = "/api/health";
const DEFAULT_QUOTA_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Worker configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the origin server the proxy fronts
    pub origin_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Name of the cache generation installed at startup
    pub cache_name: String,
    /// Assets pre-populated at install time, in order
    pub precache_manifest: Vec<String>,
    /// Document served to navigations when the network is down
    pub offline_fallback: String,
    /// Reconnection signal tag that drains the sync queue
    pub sync_tag: String,
    /// URL prefix of write endpoints eligible for deferred replay
    pub sync_endpoint_prefix: String,
    /// Optional journal file backing the sync queue
    pub sync_journal_path: Option<PathBuf>,
    /// Total bytes the cache store may hold across generations
    pub cache_quota_bytes: usize,
    /// Connectivity probe interval in seconds, 0 disables the probe
    pub connectivity_interval: u64,
    /// Path probed to detect connectivity
    pub health_path: String,
    /// Upstream request timeout in seconds
    pub request_timeout: u64,
    /// Activate a freshly installed generation without waiting
    pub skip_waiting: bool,
    /// Notification presentation settings
    pub notifications: NotificationConfig,
}

/// Presentation defaults for push notifications.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub title: String,
    pub default_body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    /// Where the "view" action navigates when the payload names no URL
    pub default_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "Not a Label".to_string(),
            default_body: "New update from Not a Label".to_string(),
            icon: "/icons/icon-192x192.png".to_string(),
            badge: "/icons/badge-72x72.png".to_string(),
            vibrate: vec![200, 100, 200],
            default_url: "/dashboard/notifications".to_string(),
        }
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `ORIGIN_URL` - Origin server base URL (default: http://127.0.0.1:8080)
    /// - `SERVER_PORT` - Proxy listen port (default: 3000)
    /// - `CACHE_NAME` - Cache generation name (default: not-a-label-v1)
    /// - `PRECACHE_MANIFEST` - Comma separated asset paths
    /// - `OFFLINE_FALLBACK` - Offline document path (default: /offline.html)
    /// - `SYNC_TAG` - Reconnection tag (default: sync-analytics)
    /// - `SYNC_ENDPOINT_PREFIX` - Replayable write prefix (default: /api/analytics/track)
    /// - `SYNC_JOURNAL_PATH` - Sync queue journal file (default: none, memory only)
    /// - `CACHE_QUOTA_BYTES` - Cache byte budget (default: 50 MB)
    /// - `CONNECTIVITY_INTERVAL` - Probe interval in seconds (default: 15)
    /// - `HEALTH_PATH` - Probe path (default: /api/health)
    /// - `REQUEST_TIMEOUT` - Upstream timeout in seconds (default: 10)
    /// - `SKIP_WAITING` - Activate new generations immediately (default: true)
    /// - `NOTIFICATION_TITLE` / `NOTIFICATION_DEFAULT_BODY`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut notifications = defaults.notifications;
        if let Ok(title) = env::var("NOTIFICATION_TITLE") {
            notifications.title = title;
        }
        if let Ok(body) = env::var("NOTIFICATION_DEFAULT_BODY") {
            notifications.default_body = body;
        }

        Self {
            origin_url: env::var("ORIGIN_URL").unwrap_or(defaults.origin_url),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cache_name: env::var("CACHE_NAME").unwrap_or(defaults.cache_name),
            precache_manifest: env::var("PRECACHE_MANIFEST")
                .ok()
                .map(|v| parse_manifest(&v))
                .unwrap_or(defaults.precache_manifest),
            offline_fallback: env::var("OFFLINE_FALLBACK").unwrap_or(defaults.offline_fallback),
            sync_tag: env::var("SYNC_TAG").unwrap_or(defaults.sync_tag),
            sync_endpoint_prefix: env::var("SYNC_ENDPOINT_PREFIX")
                .unwrap_or(defaults.sync_endpoint_prefix),
            sync_journal_path: env::var("SYNC_JOURNAL_PATH").ok().map(PathBuf::from),
            cache_quota_bytes: parse_var("CACHE_QUOTA_BYTES").unwrap_or(defaults.cache_quota_bytes),
            connectivity_interval: parse_var("CONNECTIVITY_INTERVAL")
                .unwrap_or(defaults.connectivity_interval),
            health_path: env::var("HEALTH_PATH").unwrap_or(defaults.health_path),
            request_timeout: parse_var("REQUEST_TIMEOUT").unwrap_or(defaults.request_timeout),
            skip_waiting: parse_var("SKIP_WAITING").unwrap_or(defaults.skip_waiting),
            notifications,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin_url: DEFAULT_ORIGIN.to_string(),
            server_port: 3000,
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            precache_manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            offline_fallback: DEFAULT_OFFLINE_FALLBACK.to_string(),
            sync_tag: DEFAULT_SYNC_TAG.to_string(),
            sync_endpoint_prefix: DEFAULT_SYNC_PREFIX.to_string(),
            sync_journal_path: None,
            cache_quota_bytes: DEFAULT_QUOTA_BYTES,
            connectivity_interval: 15,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            request_timeout: 10,
            skip_waiting: true,
            notifications: NotificationConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Splits a comma separated manifest, dropping blanks and duplicates while
/// keeping the first occurrence order.
fn parse_manifest(raw: &str) -> Vec<String> {
    let mut manifest: Vec<String> = Vec::new();
    for path in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if !manifest.iter().any(|p| p == path) {
            manifest.push(path.to_string());
        }
    }
    manifest
}

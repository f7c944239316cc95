//! Response DTOs for the worker control API
//!
//! Defines the structure of outgoing control response bodies.

use serde::Serialize;

use crate::sync::QueuedWrite;
use crate::worker::WorkerStats;

/// Response body for POST /__worker/notifications/click
#[derive(Debug, Clone, Serialize)]
pub struct ClickResponse {
    pub action: String,
    /// Where the application should navigate, None when dismissed
    pub navigate: Option<String>,
}

/// Response body for GET /__worker/queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    pub pending: usize,
    pub draining: bool,
    pub records: Vec<QueuedWrite>,
}

impl QueueResponse {
    pub fn new(records: Vec<QueuedWrite>, draining: bool) -> Self {
        Self {
            pending: records.len(),
            draining,
            records,
        }
    }
}

/// Response body for GET /__worker/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: WorkerStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(stats: WorkerStats) -> Self {
        let hit_rate = stats.cache.hit_rate();
        Self { stats, hit_rate }
    }
}

/// Response body for GET /__worker/health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Generation currently serving lookups
    pub generation: Option<String>,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(generation: Option<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            generation,
        }
    }
}

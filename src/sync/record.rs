//! Write-intent records held by the sync queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::RequestKey;
use crate::fetch::FetchRequest;

/// A buffered write that has not been acknowledged by the origin yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedWrite {
    /// Monotonic per-queue identifier; also the FIFO position
    pub id: u64,
    pub key: RequestKey,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub payload: Vec<u8>,
    pub enqueued_at: DateTime<Utc>,
    /// Failed replays so far
    #[serde(default)]
    pub attempts: u32,
}

impl QueuedWrite {
    pub fn new(id: u64, key: RequestKey, headers: Vec<(String, String)>, payload: Vec<u8>) -> Self {
        Self {
            id,
            key,
            headers,
            payload,
            enqueued_at: Utc::now(),
            attempts: 0,
        }
    }

    /// Rebuilds the original request for replay.
    pub fn to_request(&self) -> FetchRequest {
        let mut request = FetchRequest::new(&self.key.method, self.key.url.clone())
            .with_body(self.payload.clone());
        request.headers = self.headers.clone();
        request
    }
}

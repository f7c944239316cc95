//! Cache Entry Module
//!
//! Defines request identity, response snapshots and the stored cache entry.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Headers never persisted with a snapshot (hop-by-hop or credential bearing).
const UNCACHED_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "set-cookie",
];

// == Request Key ==
/// Canonical request identity: upper-cased method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: impl AsRef<str>, url: impl AsRef<str>) -> Self {
        let url = url.as_ref();
        let url = url.split('#').next().unwrap_or(url);
        Self {
            method: method.as_ref().trim().to_ascii_uppercase(),
            url: url.to_string(),
        }
    }

    /// Shorthand for a GET identity.
    pub fn get(url: impl AsRef<str>) -> Self {
        Self::new("GET", url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

// == Response Snapshot ==
/// Replayable copy of a response as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseSnapshot {
    /// Builds a snapshot, keeping only the cacheable subset of headers.
    pub fn new(status: u16, url: impl Into<String>, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        let headers = headers
            .into_iter()
            .filter(|(name, _)| is_cacheable_header(name))
            .collect();
        Self {
            status,
            url: url.into(),
            headers,
            body,
        }
    }

    /// Approximate storage footprint, used for quota accounting.
    pub fn size_bytes(&self) -> usize {
        self.url.len()
            + self.body.len()
            + self
                .headers
                .iter()
                .map(|(n, v)| n.len() + v.len())
                .sum::<usize>()
    }
}

/// Returns false for headers that must not outlive the original exchange.
pub fn is_cacheable_header(name: &str) -> bool {
    !UNCACHED_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

// == Cache Entry ==
/// A snapshot stored in exactly one generation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: ResponseSnapshot,
    /// Generation the entry was inserted into
    pub generation: String,
    /// Insertion timestamp (Unix milliseconds)
    pub inserted_at: u64,
}

impl CacheEntry {
    pub fn new(snapshot: ResponseSnapshot, generation: impl Into<String>) -> Self {
        Self {
            snapshot,
            generation: generation.into(),
            inserted_at: current_timestamp_ms(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.snapshot.size_bytes()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

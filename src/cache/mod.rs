//! Cache Module
//!
//! Versioned response cache: generations of request → response snapshots
//! with a single current generation and a byte quota.

mod entry;
mod generation;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, is_cacheable_header, CacheEntry, RequestKey, ResponseSnapshot};
pub use generation::{Generation, GenerationState};
pub use stats::CacheStats;
pub use store::{CacheStore, GenerationHandle};

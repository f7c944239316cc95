//! Sync Module
//!
//! Durable FIFO of write-intent records replayed on reconnection.

mod journal;
mod queue;
mod record;

pub use journal::Journal;
pub use queue::{DrainOutcome, DrainReport, SyncQueue};
pub use record::QueuedWrite;

//! Offline Worker - an offline resilience layer for a web application
//!
//! Sits in front of an origin server as a local proxy. Responses are served
//! cache-first from versioned cache generations, failed analytics writes are
//! queued and replayed in order on reconnection, and push payloads become
//! user-visible notifications.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod sync;
pub mod tasks;
pub mod worker;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{Result, WorkerError};
pub use tasks::spawn_connectivity_task;
pub use worker::OfflineWorker;

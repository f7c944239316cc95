//! Background Tasks Module
//!
//! Contains background tasks that run alongside the proxy.
//!
//! # Tasks
//! - Connectivity probe: emits the reconnection signal when the origin comes back

mod connectivity;

pub use connectivity::spawn_connectivity_task;

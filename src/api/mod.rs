//! API Module
//!
//! HTTP surface of the worker: a proxy fallback that sends application
//! traffic through the fetch interceptor, and `/__worker` control endpoints
//! that deliver install, activate, sync, push, click and message events.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

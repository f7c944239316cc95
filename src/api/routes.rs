//! API Routes
//!
//! Configures the Axum router: worker control endpoints under `/__worker`
//! and a fallback that proxies everything else through the worker.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    activate_handler, health_handler, install_handler, message_handler,
    notification_click_handler, notifications_handler, proxy_handler, push_handler,
    queue_handler, stats_handler, sync_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /__worker/install` - Install a cache generation
/// - `POST /__worker/activate` - Promote the waiting generation
/// - `POST /__worker/sync/:tag` - Deliver a reconnection signal
/// - `POST /__worker/push` - Deliver a push payload
/// - `POST /__worker/notifications/click` - Deliver a notification action
/// - `GET /__worker/notifications` - Recently displayed notifications
/// - `POST /__worker/message` - Post a control message
/// - `GET /__worker/queue` - Pending deferred writes
/// - `GET /__worker/stats` - Worker statistics
/// - `GET /__worker/health` - Health check endpoint
/// - anything else - proxied through the fetch interceptor
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let control = Router::new()
        .route("/install", post(install_handler))
        .route("/activate", post(activate_handler))
        .route("/sync/:tag", post(sync_handler))
        .route("/push", post(push_handler))
        .route("/notifications/click", post(notification_click_handler))
        .route("/notifications", get(notifications_handler))
        .route("/message", post(message_handler))
        .route("/queue", get(queue_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler));

    Router::new()
        .nest("/__worker", control)
        .fallback(proxy_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

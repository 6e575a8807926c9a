//! Notifier HTTP routes — Pub/Sub push endpoint and health check.

pub mod pubsub;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::services::notify_service::Notifier;

/// Shared state for route handlers.
#[derive(Clone)]
pub struct NotifierState {
    pub notifier: Arc<Notifier>,
}

/// Build the notifier's Axum router.
pub fn notifier_router(state: NotifierState) -> Router {
    Router::new()
        .route("/pubsub/push", post(pubsub::push_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// The router as served: requests outliving `request_timeout` get a 504,
/// like a notifier deadline.
pub fn notifier_app(state: NotifierState, request_timeout: Duration) -> Router {
    notifier_router(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

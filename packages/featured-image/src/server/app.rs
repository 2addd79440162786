//! Application setup and server configuration.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::Extension,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::kernel::{DiagnosticLog, NonceService, ServerDeps};
use crate::server::middleware::operator_auth_middleware;
use crate::server::routes::{
    clear_log_handler, generation_status_handler, health_handler, post_status_handler,
    read_log_handler, read_settings_handler, regenerate_handler, regenerate_token_handler,
    update_settings_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: ServerDeps,
    pub nonces: Arc<NonceService>,
    pub diagnostic_log: Arc<DiagnosticLog>,
    /// Bearer token -> operator name
    pub operator_tokens: Arc<HashMap<String, String>>,
    /// Operators allowed to change settings
    pub admin_operators: Arc<Vec<String>>,
    /// Expected `x-webhook-secret` on inbound events, when set
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn is_admin(&self, operator: &str) -> bool {
        self.admin_operators.iter().any(|admin| admin == operator)
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/events/post-status", post(post_status_handler))
        .route("/posts/:id/generation", get(generation_status_handler))
        .route("/posts/:id/regenerate-token", get(regenerate_token_handler))
        .route("/posts/:id/regenerate", post(regenerate_handler))
        .route("/log", get(read_log_handler).delete(clear_log_handler))
        .route(
            "/settings",
            get(read_settings_handler).put(update_settings_handler),
        )
        .layer(middleware::from_fn(operator_auth_middleware))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

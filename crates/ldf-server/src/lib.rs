//! The HTTP control plane: route table, shared state, and the persistence
//! glue (`db`, `entities`) the routes call into.

pub mod db;
pub mod entities;
pub mod error;
pub mod middleware;
mod routes;
pub mod state;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Assembles the full router: resource endpoints plus the auth and
/// rate-limit layers, applied outermost-last so auth runs before rate
/// limiting sees an authenticated key.
pub fn build_router(state: Arc<AppState>) -> Router {
    routes::router()
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit_layer))
        .layer(from_fn_with_state(state.clone(), middleware::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

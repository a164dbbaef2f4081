//! REST route aggregation. Each submodule owns one resource's handlers and
//! exposes a `router()` merged here onto a shared `Router<Arc<AppState>>`.

mod components;
mod distributions;
mod downloads;
mod misc;
mod settings;
mod sources;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(misc::router())
        .merge(distributions::router())
        .merge(components::router())
        .merge(sources::router())
        .merge(downloads::router())
        .merge(settings::router())
}

//! HTTP surface.

mod connections;
mod cron;
mod health;
mod rules;
mod runs;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/rules", get(rules::list).post(rules::create))
        .route("/rules/{id}", get(rules::get).patch(rules::update))
        .route("/rules/{id}/run", post(rules::run))
        .route("/rules/{id}/runs", get(runs::history))
        .route("/runs/latest", get(runs::latest))
        .route("/cron", get(cron::trigger).post(cron::trigger))
        .route("/connections/google", post(connections::store_google))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

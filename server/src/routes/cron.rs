use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use mail2drive::{BatchReport, Trigger};

use crate::auth::authorize_cron;
use crate::error::ApiError;
use crate::state::AppState;

/// Runs every enabled rule once, sequentially.
pub async fn trigger(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<BatchReport>, ApiError> {
    authorize_cron(&state.cron, &headers)?;
    Ok(Json(state.batch.run_enabled(Trigger::Scheduled).await?))
}

use axum::extract::{Path, Query, State};
use axum::Json;
use mail2drive::rules;
use mail2drive::{RunLedger, RunRecord};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: u32 = 20;
const MAX_HISTORY_LIMIT: u32 = 200;

/// Most recent run of each of the caller's rules.
pub async fn latest(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Vec<RunRecord>>, ApiError> {
    Ok(Json(RunLedger::new(state.db.clone()).latest_by_rule(&user)?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    limit: Option<u32>,
}

pub async fn history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<RunRecord>>, ApiError> {
    // Ownership check
    rules::get_rule(&state.db, &user, &id)?;

    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
    Ok(Json(RunLedger::new(state.db.clone()).history(&id, limit)?))
}

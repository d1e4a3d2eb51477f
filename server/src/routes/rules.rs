use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mail2drive::rules::{self, RuleInput, RuleSummary};
use mail2drive::{RunOutcome, Trigger};
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Vec<RuleSummary>>, ApiError> {
    Ok(Json(rules::list_rules(&state.db, &user)?))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<RuleSummary>, ApiError> {
    Ok(Json(rules::get_rule(&state.db, &user, &id)?))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<RuleInput>,
) -> Result<(StatusCode, Json<RuleSummary>), ApiError> {
    let summary = rules::create_rule(&state.db, &user, input)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<RuleInput>,
) -> Result<Json<RuleSummary>, ApiError> {
    Ok(Json(rules::update_rule(&state.db, &user, &id, input)?))
}

#[derive(Debug, Serialize)]
struct RunResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<&'static str>,
    #[serde(flatten)]
    outcome: RunOutcome,
}

/// Runs the rule synchronously. A failed run is still a recorded run, so
/// it comes back as the outcome with a 500 status.
pub async fn run(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let outcome = state.runner.run(&id, &user, Trigger::Manual).await?;
    let status = if outcome.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let body = RunResponse {
        ok: outcome.is_success(),
        step: outcome.error.as_ref().map(|e| e.step.as_str()),
        outcome,
    };
    Ok((status, Json(body)).into_response())
}

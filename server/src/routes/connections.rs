use axum::extract::State;
use axum::Json;
use mail2drive::credentials::{store_connection, ConnectionInput, CredentialResolver};
use serde_json::{json, Value};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Stores the caller's Google tokens. A refresh token is required.
pub async fn store_google(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<ConnectionInput>,
) -> Result<Json<Value>, ApiError> {
    store_connection(&state.db, &state.encryptor, &user, input)?;
    state.credentials.invalidate(&user).await;
    Ok(Json(json!({ "ok": true })))
}

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
    users::User,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(profile))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
}

pub async fn root() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Backend is running...",
    })
}

/// Current user without credentials.
#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<User>> {
    let user = state.users.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(%user_id, "token for missing user");
        ApiError::not_found("User not found")
    })?;
    Ok(Json(user))
}

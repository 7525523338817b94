// Current user and history routes

use axum::{extract::State, routing::get, Json, Router};
use dealflow_core::{CurrentUser, ProfileUpdate, SessionRecord};

use crate::common::ListResponse;
use crate::error::ApiError;
use crate::sessions::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/me", get(get_me).patch(update_me))
        .route("/v1/history", get(list_history))
        .with_state(state)
}

/// GET /v1/me - Current user
#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Current user", body = CurrentUser)
    ),
    tag = "users"
)]
pub async fn get_me(State(state): State<AppState>) -> Json<CurrentUser> {
    Json(state.session_service.current_user())
}

/// PATCH /v1/me - Update profile fields
///
/// Only provided fields change; blank company or signature clears it.
/// Sessions created afterwards run with the updated profile.
#[utoipa::path(
    patch,
    path = "/v1/me",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated user", body = CurrentUser)
    ),
    tag = "users"
)]
pub async fn update_me(
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> Json<CurrentUser> {
    let user = state.session_service.update_user(&update);
    tracing::info!(user_id = %user.id, "Profile updated");
    Json(user)
}

/// GET /v1/history - Pushed sessions of the current user, newest first
#[utoipa::path(
    get,
    path = "/v1/history",
    responses(
        (status = 200, description = "Session history", body = ListResponse<SessionRecord>),
        (status = 500, description = "History store failed", body = ApiError)
    ),
    tag = "users"
)]
pub async fn list_history(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<SessionRecord>>, ApiError> {
    let records = state.session_service.history().await.map_err(|e| {
        tracing::error!("Failed to list history: {:#}", e);
        ApiError::new(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "failed to load history",
        )
    })?;
    Ok(Json(ListResponse::new(records)))
}

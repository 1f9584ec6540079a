use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::extractors::AuthUser;
use crate::auth::handlers::is_valid_email;
use crate::auth::repo::User;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::UpdateUserRequest;
use crate::users::repo::{self, UserSummary};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).put(update_user))
}

#[instrument(skip(state, user))]
async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = repo::list_others(&state.db, user.id).await?;
    Ok(Json(users))
}

#[instrument(skip(state, _user))]
async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserSummary>, ApiError> {
    let found = repo::find_summary(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(found))
}

#[instrument(skip(state, user, payload))]
async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Result<Json<UserSummary>, ApiError> {
    if id != user.id {
        return Err(ApiError::forbidden("You can only update your own profile"));
    }

    if let Some(name) = payload.name.as_deref() {
        if name.trim().len() < 2 {
            return Err(ApiError::validation("Name too short"));
        }
    }
    if let Some(email) = payload.email.as_mut() {
        *email = email.trim().to_lowercase();
        if !is_valid_email(email) {
            return Err(ApiError::validation("Invalid email"));
        }
        if let Some(existing) = User::find_by_email(&state.db, email).await? {
            if existing.id != user.id {
                return Err(ApiError::conflict("Email already registered"));
            }
        }
    }
    if payload.name.is_none() && payload.email.is_none() {
        return Err(ApiError::validation("Nothing to update"));
    }

    let updated = repo::update_profile(
        &state.db,
        user.id,
        payload.name.as_deref(),
        payload.email.as_deref(),
    )
    .await?;
    info!(user_id = %user.id, "profile updated");
    Ok(Json(updated))
}

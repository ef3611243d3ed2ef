//! User administration (admins only).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use stockroom_core::{UserRole, UserUid};

use crate::error::{AppError, JsonBody};
use crate::middleware::RequireAdmin;
use crate::models::UserProfile;
use crate::services::NewUserForm;
use crate::state::AppState;

/// Body of a role change.
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

/// List all users.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    Ok(Json(state.user_admin().list_users(&admin).await?))
}

/// Create a user with an identity account and a profile.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(form): JsonBody<NewUserForm>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let profile = state.user_admin().create_user(&admin, form).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Change a user's role.
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(uid): Path<String>,
    JsonBody(body): JsonBody<RoleRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state
        .user_admin()
        .set_role(&admin, &UserUid::new(uid), body.role)
        .await?;
    Ok(Json(profile))
}

/// Delete a user's profile.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(uid): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .user_admin()
        .delete_profile(&admin, &UserUid::new(uid))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

//! The signed-in user's own profile.

use axum::{Json, extract::State};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, JsonBody};
use crate::middleware::{RequireUser, set_current_session};
use crate::models::UserProfile;
use crate::services::ProfileForm;
use crate::state::AppState;

/// Current profile.
pub async fn show(RequireUser(user): RequireUser) -> Json<UserProfile> {
    Json(user)
}

/// Apply the profile edit form.
///
/// Credential changes re-authenticate with the current password; the
/// refreshed provider session replaces the stored one.
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    JsonBody(form): JsonBody<ProfileForm>,
) -> Result<Json<UserProfile>, AppError> {
    let outcome = state.profile_editor().save(&user, form).await?;

    if let Some(auth) = &outcome.session {
        set_current_session(&session, auth).await?;
    }

    Ok(Json(outcome.profile))
}

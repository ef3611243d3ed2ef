//! Sign-in and sign-out.

use axum::{Json, extract::State, http::StatusCode};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, JsonBody, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_session, set_current_session};
use crate::models::UserProfile;
use crate::state::AppState;

/// Sign-in request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub handle: String,
    #[serde(default)]
    pub password: String,
}

/// Sign in with a handle and password.
///
/// On success the provider session is stored server-side and the profile
/// is returned.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let password = SecretString::from(body.password);
    let (profile, auth) = state.auth().login(&body.handle, &password).await?;

    set_current_session(&session, &auth).await?;
    set_sentry_user(&profile.uid, Some(profile.email.as_str()));
    tracing::info!(uid = %profile.uid, "Signed in");

    Ok(Json(profile))
}

/// Sign out. Succeeds whether or not a session existed.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_session(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

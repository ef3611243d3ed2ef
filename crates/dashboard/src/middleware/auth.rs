//! Authentication extractors.
//!
//! Every protected handler takes [`RequireUser`] or [`RequireAdmin`]. The
//! extractor reads the provider session from the cookie session, asks the
//! [`SessionGate`](crate::services::SessionGate) for the profile, and
//! rejects before the handler body runs. A provider session renewed by the
//! gate is written back so later requests use the fresh ID token.

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::backend::AuthSession;
use crate::error::set_sentry_user;
use crate::models::{UserProfile, session::keys};
use crate::services::GateRejection;
use crate::state::AppState;

/// Login page that unauthenticated browser requests are sent to.
pub const LOGIN_PATH: &str = "/login";

/// Extractor that requires a signed-in user with a profile.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireUser(pub UserProfile);

/// Extractor that requires a signed-in admin.
pub struct RequireAdmin(pub UserProfile);

/// Rejection produced by the authentication extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Browser request without a valid session.
    RedirectToLogin,
    /// API request without a valid session.
    Unauthorized,
    /// Signed in, but not an admin.
    Forbidden,
}

impl AuthRejection {
    fn from_gate(rejection: GateRejection, parts: &Parts) -> Self {
        match rejection {
            GateRejection::Forbidden => Self::Forbidden,
            GateRejection::Unauthenticated => Self::unauthenticated(parts),
        }
    }

    fn unauthenticated(parts: &Parts) -> Self {
        if parts.uri.path().starts_with("/api/") {
            Self::Unauthorized
        } else {
            Self::RedirectToLogin
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Please sign in" })),
            )
                .into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Only admins can access this resource" })),
            )
                .into_response(),
        }
    }
}

/// Load the provider session stored in the cookie session, if any.
///
/// A stored value that no longer deserializes is treated as absent.
pub async fn current_session(session: &Session) -> Option<AuthSession> {
    session
        .get::<AuthSession>(keys::CURRENT_SESSION)
        .await
        .ok()
        .flatten()
}

/// Store the provider session after a successful sign-in or re-authentication.
///
/// The session id is cycled so a pre-login cookie cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_session(
    session: &Session,
    auth: &AuthSession,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_SESSION, auth).await
}

/// Drop the whole session (logout).
///
/// # Errors
///
/// Returns an error if the session store cannot be updated.
pub async fn clear_current_session(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

async fn gate_profile(
    parts: &Parts,
    state: &AppState,
    admin_only: bool,
) -> Result<UserProfile, AuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or_else(|| AuthRejection::unauthenticated(parts))?;
    let auth = current_session(session).await;

    let gate = state.gate();
    let result = if admin_only {
        gate.require_admin(auth.as_ref()).await
    } else {
        gate.resolve(auth.as_ref()).await
    };
    let outcome = result.map_err(|rejection| AuthRejection::from_gate(rejection, parts))?;

    if let Some(renewed) = &outcome.renewed
        && let Err(e) = session.insert(keys::CURRENT_SESSION, renewed).await
    {
        tracing::warn!(error = %e, "Failed to store refreshed session");
    }

    let profile = outcome.profile;

    set_sentry_user(&profile.uid, Some(profile.email.as_str()));
    Ok(profile)
}

impl<S> FromRequestParts<S> for RequireUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        gate_profile(parts, &state, false).await.map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        gate_profile(parts, &state, true).await.map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_for(path: &str) -> Parts {
        Request::builder()
            .uri(path)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_api_paths_get_unauthorized() {
        let parts = parts_for("/api/me");
        assert_eq!(
            AuthRejection::from_gate(GateRejection::Unauthenticated, &parts),
            AuthRejection::Unauthorized
        );
    }

    #[test]
    fn test_page_paths_redirect_to_login() {
        let parts = parts_for("/");
        let rejection = AuthRejection::from_gate(GateRejection::Unauthenticated, &parts);
        assert_eq!(rejection, AuthRejection::RedirectToLogin);

        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], LOGIN_PATH);
    }

    #[test]
    fn test_forbidden_is_forbidden_everywhere() {
        for path in ["/", "/api/users"] {
            let parts = parts_for(path);
            assert_eq!(
                AuthRejection::from_gate(GateRejection::Forbidden, &parts),
                AuthRejection::Forbidden
            );
        }
    }
}

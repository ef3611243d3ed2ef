//! Session gate.
//!
//! Turns the provider session stored in the cookie session into a profile,
//! or a rejection the caller turns into a redirect. One identity lookup,
//! then one profile read; no retries. ID tokens are short-lived, so a
//! session whose token the provider reports stale is renewed once with its
//! refresh token instead of being turned away.

use thiserror::Error;
use tracing::instrument;

use stockroom_core::UserUid;

use crate::backend::{AuthSession, DocumentStore, IdentityProvider};
use crate::db::ProfileRepository;
use crate::models::UserProfile;

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateRejection {
    /// No usable session or no profile for the session identity.
    #[error("not signed in")]
    Unauthenticated,
    /// Signed in, but the profile lacks the required role.
    #[error("insufficient permissions")]
    Forbidden,
}

/// A resolved profile plus the renewed provider session, if one was minted.
#[derive(Debug)]
pub struct GateOutcome {
    pub profile: UserProfile,
    /// Replaces the stored session when the ID token had to be refreshed.
    pub renewed: Option<AuthSession>,
}

/// Resolves provider sessions to profiles.
pub struct SessionGate<'a> {
    identity: &'a dyn IdentityProvider,
    profiles: ProfileRepository<'a>,
}

impl<'a> SessionGate<'a> {
    /// Create a gate over the given backend handles.
    #[must_use]
    pub const fn new(identity: &'a dyn IdentityProvider, store: &'a dyn DocumentStore) -> Self {
        Self {
            identity,
            profiles: ProfileRepository::new(store),
        }
    }

    /// Resolve the ambient provider session to the signed-in user's profile.
    ///
    /// Every failure, including backend errors and a missing profile, is
    /// reported as [`GateRejection::Unauthenticated`].
    ///
    /// # Errors
    ///
    /// Returns `GateRejection::Unauthenticated` if there is no session, the
    /// provider rejects its token and refresh, or no readable profile exists.
    #[instrument(skip_all)]
    pub async fn resolve(
        &self,
        session: Option<&AuthSession>,
    ) -> Result<GateOutcome, GateRejection> {
        let Some(session) = session else {
            tracing::debug!("No session token");
            return Err(GateRejection::Unauthenticated);
        };

        let (uid, renewed) = match self.identity.resolve_session(&session.id_token).await {
            Ok(uid) => (uid, None),
            Err(e) if e.is_stale_token() && session.refresh_token.is_some() => {
                let renewed = self.identity.refresh_session(session).await.map_err(|e| {
                    tracing::info!(error = %e, "Session refresh refused");
                    GateRejection::Unauthenticated
                })?;
                tracing::debug!(uid = %renewed.uid, "Session token refreshed");
                (renewed.uid.clone(), Some(renewed))
            }
            Err(e) => {
                tracing::debug!(error = %e, "Session token rejected");
                return Err(GateRejection::Unauthenticated);
            }
        };

        let profile = self.load_profile(&uid).await?;
        Ok(GateOutcome { profile, renewed })
    }

    /// Like [`resolve`](Self::resolve), additionally requiring the admin role.
    ///
    /// # Errors
    ///
    /// Returns `GateRejection::Unauthenticated` as for `resolve`, or
    /// `GateRejection::Forbidden` if the user is not an admin.
    #[instrument(skip_all)]
    pub async fn require_admin(
        &self,
        session: Option<&AuthSession>,
    ) -> Result<GateOutcome, GateRejection> {
        let outcome = self.resolve(session).await?;
        if !outcome.profile.is_admin() {
            tracing::info!(uid = %outcome.profile.uid, "Non-admin denied admin access");
            return Err(GateRejection::Forbidden);
        }
        Ok(outcome)
    }

    async fn load_profile(&self, uid: &UserUid) -> Result<UserProfile, GateRejection> {
        match self.profiles.get(uid).await {
            Ok(Some(profile)) => Ok(profile),
            Ok(None) => {
                tracing::warn!(uid = %uid, "Signed-in identity has no profile");
                Err(GateRejection::Unauthenticated)
            }
            Err(e) => {
                tracing::warn!(uid = %uid, error = %e, "Failed to load profile");
                Err(GateRejection::Unauthenticated)
            }
        }
    }
}

//! Identity Toolkit v1 account endpoints and the Secure Token refresh grant.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use stockroom_core::{Email, UserUid};

use super::{RestBackend, read_json, with_segments};
use crate::backend::{AuthSession, BackendError, IdentityProvider, ProviderCode, SessionToken};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordSignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    return_secure_token: bool,
}

/// Response shared by sign-in, sign-up and update.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

/// The token endpoint answers in snake case, unlike the accounts API.
#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
}

impl RestBackend {
    fn accounts_url(&self, method: &str) -> Url {
        let mut url = with_segments(&self.inner.identity_base, [method]);
        url.query_pairs_mut()
            .append_pair("key", self.config().api_key.expose_secret());
        url
    }

    async fn post_accounts<B: Serialize + Sync, T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .client()
            .post(self.accounts_url(method))
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    fn token_url(&self) -> Url {
        let mut url = with_segments(&self.inner.token_base, ["token"]);
        url.query_pairs_mut()
            .append_pair("key", self.config().api_key.expose_secret());
        url
    }

    /// Turn a token response into a session, keeping the old tokens when the
    /// provider does not rotate them.
    fn session_from(
        response: TokenResponse,
        previous: Option<&AuthSession>,
    ) -> Result<AuthSession, BackendError> {
        let id_token = match (response.id_token, previous) {
            (Some(token), _) => SessionToken::new(token),
            (None, Some(previous)) => previous.id_token.clone(),
            (None, None) => {
                return Err(BackendError::Decode("response carried no idToken".to_owned()));
            }
        };
        let refresh_token = response
            .refresh_token
            .map(SessionToken::new)
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

        Ok(AuthSession {
            uid: UserUid::new(response.local_id),
            id_token,
            refresh_token,
        })
    }
}

#[async_trait]
impl IdentityProvider for RestBackend {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn authenticate(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let response: TokenResponse = self
            .post_accounts(
                "accounts:signInWithPassword",
                &PasswordSignInRequest {
                    email: email.as_str(),
                    password: password.expose_secret(),
                    return_secure_token: true,
                },
            )
            .await?;
        Self::session_from(response, None)
    }

    #[instrument(skip_all)]
    async fn resolve_session(&self, token: &SessionToken) -> Result<UserUid, BackendError> {
        let response: LookupResponse = self
            .post_accounts(
                "accounts:lookup",
                &LookupRequest {
                    id_token: token.expose(),
                },
            )
            .await?;

        response
            .users
            .into_iter()
            .next()
            .map(|user| UserUid::new(user.local_id))
            .ok_or(BackendError::Provider(ProviderCode::InvalidIdToken))
    }

    #[instrument(skip(self, session), fields(uid = %session.uid))]
    async fn refresh_session(&self, session: &AuthSession) -> Result<AuthSession, BackendError> {
        let refresh_token = session
            .refresh_token
            .as_ref()
            .ok_or(BackendError::Provider(ProviderCode::InvalidRefreshToken))?;

        let response = self
            .client()
            .post(self.token_url())
            .json(&RefreshRequest {
                grant_type: "refresh_token",
                refresh_token: refresh_token.expose(),
            })
            .send()
            .await?;
        let response: RefreshResponse = read_json(response).await?;

        if response.user_id != session.uid.as_str() {
            return Err(BackendError::Decode(
                "refreshed token belongs to a different user".to_owned(),
            ));
        }
        Ok(AuthSession {
            uid: UserUid::new(response.user_id),
            id_token: SessionToken::new(response.id_token),
            refresh_token: Some(SessionToken::new(response.refresh_token)),
        })
    }

    #[instrument(skip(self, session), fields(uid = %session.uid, email = %email))]
    async fn update_email(
        &self,
        session: &AuthSession,
        email: &Email,
    ) -> Result<AuthSession, BackendError> {
        let response: TokenResponse = self
            .post_accounts(
                "accounts:update",
                &UpdateRequest {
                    id_token: session.id_token.expose(),
                    email: Some(email.as_str()),
                    password: None,
                    return_secure_token: true,
                },
            )
            .await?;
        Self::session_from(response, Some(session))
    }

    #[instrument(skip(self, session, password), fields(uid = %session.uid))]
    async fn update_password(
        &self,
        session: &AuthSession,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let response: TokenResponse = self
            .post_accounts(
                "accounts:update",
                &UpdateRequest {
                    id_token: session.id_token.expose(),
                    email: None,
                    password: Some(password.expose_secret()),
                    return_secure_token: true,
                },
            )
            .await?;
        Self::session_from(response, Some(session))
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn create_account(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<UserUid, BackendError> {
        let response: TokenResponse = self
            .post_accounts(
                "accounts:signUp",
                &PasswordSignInRequest {
                    email: email.as_str(),
                    password: password.expose_secret(),
                    return_secure_token: false,
                },
            )
            .await?;
        Ok(UserUid::new(response.local_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn token_response(json: &str) -> TokenResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_update_without_new_tokens_keeps_previous() {
        let previous = AuthSession {
            uid: UserUid::new("u1"),
            id_token: SessionToken::new("old-id"),
            refresh_token: Some(SessionToken::new("old-refresh")),
        };
        let session =
            RestBackend::session_from(token_response(r#"{"localId":"u1"}"#), Some(&previous))
                .unwrap();
        assert_eq!(session, previous);
    }

    #[test]
    fn test_rotated_tokens_replace_previous() {
        let previous = AuthSession {
            uid: UserUid::new("u1"),
            id_token: SessionToken::new("old-id"),
            refresh_token: None,
        };
        let session = RestBackend::session_from(
            token_response(r#"{"localId":"u1","idToken":"new-id","refreshToken":"new-refresh"}"#),
            Some(&previous),
        )
        .unwrap();
        assert_eq!(session.id_token.expose(), "new-id");
        assert_eq!(
            session.refresh_token.as_ref().map(SessionToken::expose),
            Some("new-refresh")
        );
    }

    #[test]
    fn test_sign_in_without_token_is_a_decode_error() {
        assert!(matches!(
            RestBackend::session_from(token_response(r#"{"localId":"u1"}"#), None),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn test_refresh_wire_format() {
        let body = serde_json::to_value(RefreshRequest {
            grant_type: "refresh_token",
            refresh_token: "r1",
        })
        .unwrap();
        assert_eq!(body["grant_type"], "refresh_token");
        assert_eq!(body["refresh_token"], "r1");

        let response: RefreshResponse = serde_json::from_str(
            r#"{"expires_in":"3600","token_type":"Bearer","refresh_token":"r2","id_token":"t2","user_id":"u1","project_id":"p"}"#,
        )
        .unwrap();
        assert_eq!(response.id_token, "t2");
        assert_eq!(response.refresh_token, "r2");
        assert_eq!(response.user_id, "u1");
    }

    #[test]
    fn test_update_request_omits_unchanged_credentials() {
        let body = serde_json::to_value(UpdateRequest {
            id_token: "t",
            email: Some("a@example.com"),
            password: None,
            return_secure_token: true,
        })
        .unwrap();
        assert_eq!(body["idToken"], "t");
        assert_eq!(body["email"], "a@example.com");
        assert!(body.get("password").is_none());
        assert_eq!(body["returnSecureToken"], true);
    }
}

//! REST client for the hosted identity and document backend.
//!
//! Speaks the Identity Toolkit v1 API for accounts, the Secure Token v1 API
//! for refreshing ID tokens and the Firestore v1 REST API for documents.
//! All share one `reqwest::Client` and the same error
//! envelope:
//!
//! ```json
//! { "error": { "code": 400, "message": "INVALID_LOGIN_CREDENTIALS" } }
//! ```

mod codec;
mod documents;
mod identity;

use std::sync::Arc;

use serde::{Deserialize, de::DeserializeOwned};
use url::Url;

use super::{BackendError, ProviderCode};
use crate::config::RestBackendConfig;

/// Maximum number of error body bytes kept in [`BackendError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Firebase-compatible REST backend.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    config: RestBackendConfig,
    identity_base: Url,
    documents_base: Url,
    token_base: Url,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl RestBackend {
    /// Create a client for the configured endpoints.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Config` if an endpoint is not a valid base URL,
    /// or `BackendError::Http` if the HTTP client cannot be built.
    pub fn new(config: RestBackendConfig) -> Result<Self, BackendError> {
        let identity_base = parse_base(&config.identity_url)?;
        let documents_base = parse_base(&config.documents_url)?;
        let token_base = parse_base(&config.token_url)?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(RestBackendInner {
                client,
                config,
                identity_base,
                documents_base,
                token_base,
            }),
        })
    }

    fn client(&self) -> &reqwest::Client {
        &self.inner.client
    }

    fn config(&self) -> &RestBackendConfig {
        &self.inner.config
    }
}

fn parse_base(raw: &str) -> Result<Url, BackendError> {
    let url = Url::parse(raw).map_err(|e| BackendError::Config(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(BackendError::Config(format!("{raw}: not a base URL")));
    }
    Ok(url)
}

/// Append path segments to a base URL, percent-encoding each one.
fn with_segments<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Decode a successful response body, or map the error envelope.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return Ok(serde_json::from_str(&body)?);
    }
    Err(error_from_body(status.as_u16(), body))
}

/// Map a non-success response to a [`BackendError`].
fn error_from_body(status: u16, body: String) -> BackendError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body)
        && !envelope.error.message.is_empty()
    {
        let code = ProviderCode::parse(&envelope.error.message);
        // Documents API errors carry prose, not codes; keep the status for those.
        if !matches!(code, ProviderCode::Other(_)) {
            return BackendError::Provider(code);
        }
    }

    let mut body = body;
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    BackendError::Status { status, body }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_maps_to_provider_code() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#;
        assert!(matches!(
            error_from_body(400, body.to_owned()),
            BackendError::Provider(ProviderCode::EmailExists)
        ));
    }

    #[test]
    fn test_unrecognised_error_keeps_status() {
        let body = r#"{"error":{"code":403,"message":"Missing or insufficient permissions."}}"#;
        match error_from_body(403, body.to_owned()) {
            BackendError::Status { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("insufficient permissions"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_long_error_bodies_are_truncated() {
        let body = "é".repeat(MAX_ERROR_BODY);
        match error_from_body(500, body) {
            BackendError::Status { body, .. } => assert!(body.len() <= MAX_ERROR_BODY),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_segments_are_encoded() {
        let base = Url::parse("https://firestore.example.com/v1/").unwrap();
        let url = with_segments(&base, ["projects", "demo", "documents", "a b"]);
        assert_eq!(
            url.as_str(),
            "https://firestore.example.com/v1/projects/demo/documents/a%20b"
        );
    }

    #[test]
    fn test_relative_endpoint_rejected() {
        assert!(matches!(
            parse_base("not a url"),
            Err(BackendError::Config(_))
        ));
        assert!(matches!(
            parse_base("mailto:ops@example.com"),
            Err(BackendError::Config(_))
        ));
    }
}

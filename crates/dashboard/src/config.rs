//! Dashboard configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DASHBOARD_BASE_URL` - Public URL for the dashboard
//!
//! ## Required (REST backend)
//! - `BACKEND_API_KEY` - Identity provider web API key
//! - `BACKEND_PROJECT_ID` - Document store project id
//!
//! ## Optional
//! - `DASHBOARD_HOST` - Bind address (default: 127.0.0.1)
//! - `DASHBOARD_PORT` - Listen port (default: 3002)
//! - `DASHBOARD_BACKEND` - `rest` or `memory` (default: rest)
//! - `DASHBOARD_TRACKED_COLLECTIONS` - Comma-separated collections with
//!   unseen-item counters (default: inventory,requests)
//! - `BACKEND_IDENTITY_URL` - Identity endpoint base (default: Identity Toolkit v1)
//! - `BACKEND_DOCUMENTS_URL` - Document endpoint base (default: Firestore v1)
//! - `BACKEND_TOKEN_URL` - Token refresh endpoint base (default: Secure Token v1)
//! - `BACKEND_ACCESS_TOKEN` - Bearer token for document requests
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

use stockroom_core::CollectionName;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_TRACKED_COLLECTIONS: &str = "inventory,requests";
const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_DOCUMENTS_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Dashboard application configuration.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the dashboard
    pub base_url: String,
    /// Identity and document backend
    pub backend: BackendConfig,
    /// Collections with unseen-item counters, in display order
    pub tracked_collections: Vec<CollectionName>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Which backend implementation to talk to.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Hosted identity provider and document store.
    Rest(RestBackendConfig),
    /// In-process backend; nothing survives a restart.
    Memory,
}

/// REST backend endpoints and credentials.
///
/// Implements `Debug` manually to redact the API key and access token.
#[derive(Clone)]
pub struct RestBackendConfig {
    /// Identity provider web API key
    pub api_key: SecretString,
    /// Document store project id
    pub project_id: String,
    /// Identity endpoint base URL
    pub identity_url: String,
    /// Document endpoint base URL
    pub documents_url: String,
    /// Token refresh endpoint base URL
    pub token_url: String,
    /// Optional bearer token for document requests
    pub access_token: Option<SecretString>,
}

impl std::fmt::Debug for RestBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackendConfig")
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("identity_url", &self.identity_url)
            .field("documents_url", &self.documents_url)
            .field("token_url", &self.token_url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl RestBackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let access_token = get_optional_env("BACKEND_ACCESS_TOKEN").map(|token| {
            if let Err(e) = validate_secret_strength(&token, "BACKEND_ACCESS_TOKEN") {
                tracing::warn!("BACKEND_ACCESS_TOKEN validation warning: {e}");
            }
            SecretString::from(token)
        });

        Ok(Self {
            api_key: get_validated_secret("BACKEND_API_KEY")?,
            project_id: get_required_env("BACKEND_PROJECT_ID")?,
            identity_url: get_env_or_default("BACKEND_IDENTITY_URL", DEFAULT_IDENTITY_URL),
            documents_url: get_env_or_default("BACKEND_DOCUMENTS_URL", DEFAULT_DOCUMENTS_URL),
            token_url: get_env_or_default("BACKEND_TOKEN_URL", DEFAULT_TOKEN_URL),
            access_token,
        })
    }
}

impl BackendConfig {
    /// Load backend selection and credentials from environment.
    ///
    /// Shared with the CLI, which talks to the same backend.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DASHBOARD_BACKEND` is unknown or REST
    /// credentials are missing or fail validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        match get_env_or_default("DASHBOARD_BACKEND", "rest").as_str() {
            "rest" => Ok(Self::Rest(RestBackendConfig::from_env()?)),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidEnvVar(
                "DASHBOARD_BACKEND".to_string(),
                format!("expected 'rest' or 'memory', got '{other}'"),
            )),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("DASHBOARD_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("DASHBOARD_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("DASHBOARD_PORT", "3002")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("DASHBOARD_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("DASHBOARD_BASE_URL")?;
        let backend = BackendConfig::from_env()?;
        let tracked_collections = tracked_collections_from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            host,
            port,
            base_url,
            backend,
            tracked_collections,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Configuration for local development and tests: in-memory backend,
    /// default tracked collections, no Sentry.
    #[must_use]
    pub fn local(tracked_collections: Vec<CollectionName>) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3002,
            base_url: "http://localhost:3002".to_string(),
            backend: BackendConfig::Memory,
            tracked_collections,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the dashboard is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Parse a comma-separated collection list.
///
/// Blank entries are skipped and duplicates keep their first position.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for an invalid name or an empty list.
pub fn parse_tracked_collections(raw: &str) -> Result<Vec<CollectionName>, ConfigError> {
    let invalid = |msg: String| {
        ConfigError::InvalidEnvVar("DASHBOARD_TRACKED_COLLECTIONS".to_string(), msg)
    };

    let mut collections: Vec<CollectionName> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let name = CollectionName::parse(entry).map_err(|e| invalid(e.to_string()))?;
        if !collections.contains(&name) {
            collections.push(name);
        }
    }

    if collections.is_empty() {
        return Err(invalid("at least one collection is required".to_string()));
    }
    Ok(collections)
}

/// Load tracked collections from `DASHBOARD_TRACKED_COLLECTIONS`.
///
/// # Errors
///
/// See [`parse_tracked_collections`].
pub fn tracked_collections_from_env() -> Result<Vec<CollectionName>, ConfigError> {
    parse_tracked_collections(&get_env_or_default(
        "DASHBOARD_TRACKED_COLLECTIONS",
        DEFAULT_TRACKED_COLLECTIONS,
    ))
}

/// The built-in tracked collections.
#[must_use]
pub fn default_tracked_collections() -> Vec<CollectionName> {
    DEFAULT_TRACKED_COLLECTIONS
        .split(',')
        .filter_map(|name| CollectionName::parse(name).ok())
        .collect()
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "BACKEND_API_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "BACKEND_API_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_provider_style_key() {
        let result =
            validate_secret_strength("AIzaSyD4v9Qk2Lm7Xw1Rt8Bn3Hc6Fp0Zs5Jy", "BACKEND_API_KEY");
        assert!(result.is_ok());
    }

    #[test]
    fn test_tracked_collections_keep_order_and_dedupe() {
        let collections = parse_tracked_collections(" requests, inventory ,,requests").unwrap();
        let names: Vec<&str> = collections.iter().map(CollectionName::as_str).collect();
        assert_eq!(names, vec!["requests", "inventory"]);
    }

    #[test]
    fn test_tracked_collections_reject_empty_and_invalid() {
        assert!(matches!(
            parse_tracked_collections(" , "),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(matches!(
            parse_tracked_collections("inventory,users/abc"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_default_tracked_collections() {
        let names: Vec<String> = default_tracked_collections()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, vec!["inventory", "requests"]);
    }

    #[test]
    fn test_socket_addr() {
        let config = DashboardConfig::local(default_tracked_collections());
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3002);
        assert!(!config.is_secure());
    }

    #[test]
    fn test_rest_backend_config_debug_redacts_secrets() {
        let config = RestBackendConfig {
            api_key: SecretString::from("AIzaSy-super-secret-key"),
            project_id: "stockroom-prod".to_string(),
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            documents_url: DEFAULT_DOCUMENTS_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            access_token: Some(SecretString::from("ya29.super-secret-token")),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("stockroom-prod"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-key"));
        assert!(!debug_output.contains("super-secret-token"));
    }
}

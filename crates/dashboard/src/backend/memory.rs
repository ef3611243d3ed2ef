//! In-process backend.
//!
//! Implements both backend traits over plain maps so the dashboard can run
//! without network access. Server timestamps resolve to the local clock.
//! Call counters let tests assert which operations reached the backend.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use uuid::Uuid;

use stockroom_core::{Email, UserUid};

use super::{
    AuthSession, BackendError, Comparison, Document, DocumentStore, FieldValue, Fields,
    IdentityProvider, ProviderCode, SessionToken,
};

/// Consecutive failed sign-ins before an account is locked out.
const MAX_FAILED_ATTEMPTS: u32 = 5;

/// Minimum password length enforced by the provider.
const MIN_PASSWORD_LENGTH: usize = 6;

struct Account {
    uid: UserUid,
    password: String,
    failed_attempts: u32,
}

#[derive(Default)]
struct MemoryBackendInner {
    /// Accounts keyed by normalized email.
    accounts: RwLock<HashMap<Email, Account>>,
    /// Live ID tokens.
    tokens: RwLock<HashMap<String, UserUid>>,
    /// ID tokens past their lifetime.
    expired_tokens: RwLock<HashSet<String>>,
    /// Refresh tokens.
    refresh_tokens: RwLock<HashMap<String, UserUid>>,
    /// collection -> document id -> fields
    documents: RwLock<BTreeMap<String, BTreeMap<String, Fields>>>,
    /// Collections whose queries fail, for exercising degraded paths.
    failing_collections: RwLock<HashSet<String>>,
    /// Collections whose writes and deletes fail.
    failing_writes: RwLock<HashSet<String>>,
    identity_calls: AtomicUsize,
    store_calls: AtomicUsize,
}

/// In-memory identity provider and document store.
///
/// Cloning is cheap; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryBackendInner>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identity provider calls made so far.
    #[must_use]
    pub fn identity_calls(&self) -> usize {
        self.inner.identity_calls.load(Ordering::SeqCst)
    }

    /// Number of document store calls made so far.
    #[must_use]
    pub fn store_calls(&self) -> usize {
        self.inner.store_calls.load(Ordering::SeqCst)
    }

    /// Total backend calls made so far.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.identity_calls() + self.store_calls()
    }

    /// Create an account without counting it as a backend call.
    ///
    /// # Errors
    ///
    /// Returns `ProviderCode::EmailExists` if the email is already registered.
    pub async fn seed_account(&self, email: &Email, password: &str) -> Result<UserUid, BackendError> {
        let mut accounts = self.inner.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(BackendError::Provider(ProviderCode::EmailExists));
        }
        let uid = UserUid::new(Uuid::new_v4().simple().to_string());
        accounts.insert(
            email.clone(),
            Account {
                uid: uid.clone(),
                password: password.to_owned(),
                failed_attempts: 0,
            },
        );
        Ok(uid)
    }

    /// Write a document without counting it as a backend call.
    pub async fn seed_document(&self, collection: &str, id: &str, fields: Fields) {
        let mut documents = self.inner.documents.write().await;
        documents
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), resolve_server_timestamps(fields));
    }

    /// Read a document without counting it as a backend call.
    pub async fn peek_document(&self, collection: &str, id: &str) -> Option<Fields> {
        let documents = self.inner.documents.read().await;
        documents.get(collection)?.get(id).cloned()
    }

    /// Make every query against `collection` fail.
    pub async fn fail_collection(&self, collection: &str) {
        self.inner
            .failing_collections
            .write()
            .await
            .insert(collection.to_owned());
    }

    /// Expire every live ID token, as the provider does once their lifetime
    /// passes. Refresh tokens stay usable.
    pub async fn expire_tokens(&self) {
        let live: Vec<String> = self.inner.tokens.write().await.drain().map(|(t, _)| t).collect();
        self.inner.expired_tokens.write().await.extend(live);
    }

    async fn check_queryable(&self, collection: &str) -> Result<(), BackendError> {
        if self.inner.failing_collections.read().await.contains(collection) {
            return Err(BackendError::Status {
                status: 503,
                body: format!("collection {collection} unavailable"),
            });
        }
        Ok(())
    }

    /// Make every write or delete against `collection` fail.
    pub async fn fail_writes(&self, collection: &str) {
        self.inner
            .failing_writes
            .write()
            .await
            .insert(collection.to_owned());
    }

    async fn check_writable(&self, collection: &str) -> Result<(), BackendError> {
        if self.inner.failing_writes.read().await.contains(collection) {
            return Err(BackendError::Status {
                status: 503,
                body: format!("collection {collection} is read-only"),
            });
        }
        Ok(())
    }

    fn record_identity_call(&self) {
        self.inner.identity_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn record_store_call(&self) {
        self.inner.store_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn issue_session(&self, uid: UserUid) -> AuthSession {
        let refresh = Uuid::new_v4().to_string();
        self.inner
            .refresh_tokens
            .write()
            .await
            .insert(refresh.clone(), uid.clone());
        self.issue_id_token(uid, SessionToken::new(refresh)).await
    }

    async fn issue_id_token(&self, uid: UserUid, refresh_token: SessionToken) -> AuthSession {
        let token = Uuid::new_v4().to_string();
        self.inner
            .tokens
            .write()
            .await
            .insert(token.clone(), uid.clone());
        AuthSession {
            uid,
            id_token: SessionToken::new(token),
            refresh_token: Some(refresh_token),
        }
    }

    async fn require_live_session(&self, session: &AuthSession) -> Result<(), BackendError> {
        let tokens = self.inner.tokens.read().await;
        match tokens.get(session.id_token.expose()) {
            Some(uid) if *uid == session.uid => Ok(()),
            _ => Err(BackendError::Provider(ProviderCode::InvalidIdToken)),
        }
    }
}

fn check_password_strength(password: &SecretString) -> Result<(), BackendError> {
    if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(BackendError::Provider(ProviderCode::WeakPassword));
    }
    Ok(())
}

fn resolve_server_timestamps(fields: Fields) -> Fields {
    let now = Utc::now();
    fields
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                FieldValue::ServerTimestamp => FieldValue::Timestamp(now),
                FieldValue::Map(inner) => FieldValue::Map(resolve_server_timestamps(inner)),
                other => other,
            };
            (name, value)
        })
        .collect()
}

fn matches(fields: &Fields, field: &str, op: Comparison, value: &FieldValue) -> bool {
    let Some(actual) = fields.get(field) else {
        return false;
    };
    match op {
        Comparison::Equal => actual == value,
        Comparison::GreaterThan => {
            actual.compare(value) == Some(std::cmp::Ordering::Greater)
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn authenticate(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        self.record_identity_call();
        let uid = {
            let mut accounts = self.inner.accounts.write().await;
            let account = accounts
                .get_mut(email)
                .ok_or(BackendError::Provider(ProviderCode::InvalidLoginCredentials))?;

            if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
                return Err(BackendError::Provider(ProviderCode::TooManyAttempts));
            }
            if account.password != password.expose_secret() {
                account.failed_attempts += 1;
                return Err(BackendError::Provider(ProviderCode::InvalidLoginCredentials));
            }
            account.failed_attempts = 0;
            account.uid.clone()
        };
        Ok(self.issue_session(uid).await)
    }

    async fn resolve_session(&self, token: &SessionToken) -> Result<UserUid, BackendError> {
        self.record_identity_call();
        if let Some(uid) = self.inner.tokens.read().await.get(token.expose()) {
            return Ok(uid.clone());
        }
        if self.inner.expired_tokens.read().await.contains(token.expose()) {
            return Err(BackendError::Provider(ProviderCode::TokenExpired));
        }
        Err(BackendError::Provider(ProviderCode::InvalidIdToken))
    }

    async fn refresh_session(&self, session: &AuthSession) -> Result<AuthSession, BackendError> {
        self.record_identity_call();
        let refresh_token = session
            .refresh_token
            .clone()
            .ok_or(BackendError::Provider(ProviderCode::InvalidRefreshToken))?;
        let owner = self
            .inner
            .refresh_tokens
            .read()
            .await
            .get(refresh_token.expose())
            .cloned();
        match owner {
            Some(uid) if uid == session.uid => Ok(self.issue_id_token(uid, refresh_token).await),
            _ => Err(BackendError::Provider(ProviderCode::InvalidRefreshToken)),
        }
    }

    async fn update_email(
        &self,
        session: &AuthSession,
        email: &Email,
    ) -> Result<AuthSession, BackendError> {
        self.record_identity_call();
        self.require_live_session(session).await?;
        {
            let mut accounts = self.inner.accounts.write().await;
            let owner = accounts.get(email).map(|existing| existing.uid.clone());
            match owner {
                Some(uid) if uid != session.uid => {
                    return Err(BackendError::Provider(ProviderCode::EmailExists));
                }
                Some(_) => {}
                None => {
                    let current = accounts
                        .iter()
                        .find(|(_, account)| account.uid == session.uid)
                        .map(|(key, _)| key.clone())
                        .ok_or(BackendError::Provider(ProviderCode::InvalidIdToken))?;
                    if let Some(account) = accounts.remove(&current) {
                        accounts.insert(email.clone(), account);
                    }
                }
            }
        }
        Ok(self.issue_session(session.uid.clone()).await)
    }

    async fn update_password(
        &self,
        session: &AuthSession,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        self.record_identity_call();
        self.require_live_session(session).await?;
        check_password_strength(password)?;
        {
            let mut accounts = self.inner.accounts.write().await;
            let account = accounts
                .values_mut()
                .find(|account| account.uid == session.uid)
                .ok_or(BackendError::Provider(ProviderCode::InvalidIdToken))?;
            password.expose_secret().clone_into(&mut account.password);
        }
        Ok(self.issue_session(session.uid.clone()).await)
    }

    async fn create_account(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<UserUid, BackendError> {
        self.record_identity_call();
        check_password_strength(password)?;
        self.seed_account(email, password.expose_secret()).await
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Fields>, BackendError> {
        self.record_store_call();
        Ok(self.peek_document(collection, id).await)
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> Result<(), BackendError> {
        self.record_store_call();
        self.check_writable(collection).await?;
        let fields = resolve_server_timestamps(fields);
        let mut documents = self.inner.documents.write().await;
        let collection = documents.entry(collection.to_owned()).or_default();
        match collection.get_mut(id) {
            Some(existing) if merge => existing.extend(fields),
            _ => {
                collection.insert(id.to_owned(), fields);
            }
        }
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        self.record_store_call();
        self.check_writable(collection).await?;
        if let Some(docs) = self.inner.documents.write().await.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn query_where(
        &self,
        collection: &str,
        field: &str,
        op: Comparison,
        value: FieldValue,
    ) -> Result<Vec<Document>, BackendError> {
        self.record_store_call();
        self.check_queryable(collection).await?;

        let documents = self.inner.documents.read().await;
        Ok(documents
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| matches(fields, field, op, &value))
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count_where(
        &self,
        collection: &str,
        field: &str,
        op: Comparison,
        value: FieldValue,
    ) -> Result<usize, BackendError> {
        self.record_store_call();
        self.check_queryable(collection).await?;

        let documents = self.inner.documents.read().await;
        Ok(documents.get(collection).map_or(0, |docs| {
            docs.values()
                .filter(|fields| matches(fields, field, op, &value))
                .count()
        }))
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, BackendError> {
        self.record_store_call();
        let documents = self.inner.documents.read().await;
        Ok(documents
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[tokio::test]
    async fn test_authenticate_and_resolve_session() {
        let backend = MemoryBackend::new();
        let uid = backend.seed_account(&email("a@example.com"), "hunter22").await.unwrap();

        let session = backend
            .authenticate(&email("a@example.com"), &secret("hunter22"))
            .await
            .unwrap();
        assert_eq!(session.uid, uid);
        assert_eq!(backend.resolve_session(&session.id_token).await.unwrap(), uid);
    }

    #[tokio::test]
    async fn test_expired_token_can_be_refreshed() {
        let backend = MemoryBackend::new();
        let uid = backend.seed_account(&email("a@example.com"), "hunter22").await.unwrap();
        let session = backend
            .authenticate(&email("a@example.com"), &secret("hunter22"))
            .await
            .unwrap();

        backend.expire_tokens().await;
        let err = backend.resolve_session(&session.id_token).await.unwrap_err();
        assert!(matches!(err, BackendError::Provider(ProviderCode::TokenExpired)));

        let renewed = backend.refresh_session(&session).await.unwrap();
        assert_ne!(renewed.id_token, session.id_token);
        assert_eq!(backend.resolve_session(&renewed.id_token).await.unwrap(), uid);

        let forged = AuthSession {
            refresh_token: Some(SessionToken::new("forged")),
            ..session
        };
        assert!(matches!(
            backend.refresh_session(&forged).await,
            Err(BackendError::Provider(ProviderCode::InvalidRefreshToken))
        ));
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_the_same() {
        let backend = MemoryBackend::new();
        backend.seed_account(&email("a@example.com"), "hunter22").await.unwrap();

        let unknown = backend
            .authenticate(&email("b@example.com"), &secret("hunter22"))
            .await
            .unwrap_err();
        let wrong = backend
            .authenticate(&email("a@example.com"), &secret("nope-nope"))
            .await
            .unwrap_err();
        assert!(matches!(
            unknown,
            BackendError::Provider(ProviderCode::InvalidLoginCredentials)
        ));
        assert!(matches!(
            wrong,
            BackendError::Provider(ProviderCode::InvalidLoginCredentials)
        ));
    }

    #[tokio::test]
    async fn test_repeated_failures_lock_the_account() {
        let backend = MemoryBackend::new();
        backend.seed_account(&email("a@example.com"), "hunter22").await.unwrap();

        for _ in 0..MAX_FAILED_ATTEMPTS {
            let _ = backend
                .authenticate(&email("a@example.com"), &secret("wrong-guess"))
                .await;
        }
        let locked = backend
            .authenticate(&email("a@example.com"), &secret("hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(
            locked,
            BackendError::Provider(ProviderCode::TooManyAttempts)
        ));
    }

    #[tokio::test]
    async fn test_update_email_moves_account() {
        let backend = MemoryBackend::new();
        backend.seed_account(&email("old@example.com"), "hunter22").await.unwrap();
        let session = backend
            .authenticate(&email("old@example.com"), &secret("hunter22"))
            .await
            .unwrap();

        backend
            .update_email(&session, &email("new@example.com"))
            .await
            .unwrap();

        assert!(backend
            .authenticate(&email("new@example.com"), &secret("hunter22"))
            .await
            .is_ok());
        assert!(backend
            .authenticate(&email("old@example.com"), &secret("hunter22"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_weak_password_rejected() {
        let backend = MemoryBackend::new();
        let err = backend
            .create_account(&email("a@example.com"), &secret("12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Provider(ProviderCode::WeakPassword)));
    }

    #[tokio::test]
    async fn test_merge_keeps_other_fields() {
        let backend = MemoryBackend::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        backend
            .seed_document(
                "lastViewed",
                "u1",
                Fields::from([
                    ("inventory".to_owned(), FieldValue::Timestamp(t0)),
                    ("requests".to_owned(), FieldValue::Timestamp(t0)),
                ]),
            )
            .await;

        backend
            .set_document(
                "lastViewed",
                "u1",
                Fields::from([("inventory".to_owned(), FieldValue::ServerTimestamp)]),
                true,
            )
            .await
            .unwrap();

        let doc = backend.peek_document("lastViewed", "u1").await.unwrap();
        assert_eq!(doc["requests"], FieldValue::Timestamp(t0));
        assert!(doc["inventory"].as_timestamp().unwrap() > t0);
    }

    #[tokio::test]
    async fn test_set_without_merge_replaces() {
        let backend = MemoryBackend::new();
        backend
            .seed_document(
                "users",
                "u1",
                Fields::from([("name".to_owned(), FieldValue::from("A"))]),
            )
            .await;
        backend
            .set_document(
                "users",
                "u1",
                Fields::from([("role".to_owned(), FieldValue::from("staff"))]),
                false,
            )
            .await
            .unwrap();

        let doc = backend.peek_document("users", "u1").await.unwrap();
        assert!(!doc.contains_key("name"));
    }

    #[tokio::test]
    async fn test_failing_writes_leave_documents_untouched() {
        let backend = MemoryBackend::new();
        backend
            .seed_document(
                "users",
                "u1",
                Fields::from([("name".to_owned(), FieldValue::from("A"))]),
            )
            .await;
        backend.fail_writes("users").await;

        let err = backend
            .set_document("users", "u1", Fields::new(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 503, .. }));
        assert!(backend.delete_document("users", "u1").await.is_err());
        assert_eq!(
            backend.peek_document("users", "u1").await.unwrap()["name"],
            FieldValue::from("A")
        );
    }

    #[tokio::test]
    async fn test_query_greater_than_is_strict() {
        let backend = MemoryBackend::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        for (id, at) in [
            ("before", t0 - Duration::seconds(1)),
            ("equal", t0),
            ("after", t0 + Duration::seconds(1)),
        ] {
            backend
                .seed_document(
                    "inventory",
                    id,
                    Fields::from([("createdAt".to_owned(), FieldValue::Timestamp(at))]),
                )
                .await;
        }

        let docs = backend
            .query_where("inventory", "createdAt", Comparison::GreaterThan, t0.into())
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "after");

        let count = backend
            .count_where("inventory", "createdAt", Comparison::GreaterThan, t0.into())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_call_counters() {
        let backend = MemoryBackend::new();
        backend.seed_document("users", "u1", Fields::new()).await;
        assert_eq!(backend.total_calls(), 0);

        backend.get_document("users", "u1").await.unwrap();
        let _ = backend
            .resolve_session(&SessionToken::new("missing"))
            .await;
        assert_eq!(backend.store_calls(), 1);
        assert_eq!(backend.identity_calls(), 1);
    }
}

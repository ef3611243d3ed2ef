//! View-state repository for the `lastViewed` collection.

use std::collections::BTreeMap;

use tracing::instrument;

use stockroom_core::{CollectionName, UserUid};

use super::RepositoryError;
use crate::backend::{DocumentStore, FieldValue, Fields};
use crate::models::view_state::{VIEW_STATE_COLLECTION, ViewState};

/// Repository for per-user last-viewed records.
pub struct ViewStateRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> ViewStateRepository<'a> {
    /// Create a new view-state repository.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Read a user's view state, or `None` if it was never created.
    ///
    /// Fields that are not timestamps under a valid collection name are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the read fails.
    #[instrument(skip(self), fields(uid = %uid))]
    pub async fn get(&self, uid: &UserUid) -> Result<Option<ViewState>, RepositoryError> {
        let Some(doc) = self
            .store
            .get_document(VIEW_STATE_COLLECTION, uid.as_str())
            .await?
        else {
            return Ok(None);
        };

        let last_viewed: BTreeMap<_, _> = doc
            .iter()
            .filter_map(|(name, value)| {
                let collection = CollectionName::parse(name).ok()?;
                let Some(at) = value.as_timestamp() else {
                    tracing::debug!(field = %name, "Ignoring non-timestamp view-state field");
                    return None;
                };
                Some((collection, at))
            })
            .collect();

        Ok(Some(ViewState {
            uid: uid.clone(),
            last_viewed,
        }))
    }

    /// Set the watermark of each collection to the store's clock, merging
    /// into the existing record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the write fails.
    #[instrument(skip(self, collections), fields(uid = %uid, count = collections.len()))]
    pub async fn mark(
        &self,
        uid: &UserUid,
        collections: &[CollectionName],
    ) -> Result<(), RepositoryError> {
        let doc: Fields = collections
            .iter()
            .map(|c| (c.as_str().to_owned(), FieldValue::ServerTimestamp))
            .collect();
        self.store
            .set_document(VIEW_STATE_COLLECTION, uid.as_str(), doc, true)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn collection(name: &str) -> CollectionName {
        CollectionName::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_missing_record_is_none() {
        let backend = MemoryBackend::new();
        let repo = ViewStateRepository::new(&backend);
        assert!(repo.get(&UserUid::new("u1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_merges_into_existing_record() {
        let backend = MemoryBackend::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        backend
            .seed_document(
                VIEW_STATE_COLLECTION,
                "u1",
                Fields::from([
                    ("inventory".to_owned(), t0.into()),
                    ("requests".to_owned(), t0.into()),
                ]),
            )
            .await;
        let repo = ViewStateRepository::new(&backend);
        let uid = UserUid::new("u1");

        repo.mark(&uid, &[collection("requests")]).await.unwrap();

        let state = repo.get(&uid).await.unwrap().unwrap();
        assert_eq!(state.last_viewed(&collection("inventory")), Some(t0));
        assert!(state.last_viewed(&collection("requests")).unwrap() > t0);
    }

    #[tokio::test]
    async fn test_non_timestamp_fields_are_ignored() {
        let backend = MemoryBackend::new();
        backend
            .seed_document(
                VIEW_STATE_COLLECTION,
                "u1",
                Fields::from([("inventory".to_owned(), "yesterday".into())]),
            )
            .await;
        let state = ViewStateRepository::new(&backend)
            .get(&UserUid::new("u1"))
            .await
            .unwrap()
            .unwrap();
        assert!(state.last_viewed.is_empty());
    }
}

//! Unseen-item counter.
//!
//! Each tracked collection gets a count of items created since the user
//! last opened it. Watermarks live in the user's view-state record; item
//! creation times in each item's `createdAt` field.

use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use tracing::instrument;

use stockroom_core::{CollectionName, UserUid};

use super::AccountError;
use crate::backend::{BackendError, Comparison, DocumentStore, FieldValue};
use crate::db::ViewStateRepository;
use crate::models::UnseenCount;

/// Item field holding the creation timestamp.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Computes and resets unseen-item counts.
pub struct UnseenCounter<'a> {
    store: &'a dyn DocumentStore,
    view_states: ViewStateRepository<'a>,
    tracked: &'a [CollectionName],
}

impl<'a> UnseenCounter<'a> {
    /// Create a counter for the given tracked collections.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore, tracked: &'a [CollectionName]) -> Self {
        Self {
            store,
            view_states: ViewStateRepository::new(store),
            tracked,
        }
    }

    /// Returns `true` if `collection` has a counter.
    #[must_use]
    pub fn is_tracked(&self, collection: &CollectionName) -> bool {
        self.tracked.contains(collection)
    }

    /// Count items in `collection` created strictly after `last_viewed`.
    ///
    /// Without a watermark nothing counts as unseen and the store is not
    /// queried.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails.
    #[instrument(skip(self), fields(collection = %collection))]
    pub async fn count(
        &self,
        collection: &CollectionName,
        last_viewed: Option<DateTime<Utc>>,
    ) -> Result<usize, BackendError> {
        let Some(since) = last_viewed else {
            return Ok(0);
        };

        self.store
            .count_where(
                collection.as_str(),
                CREATED_AT_FIELD,
                Comparison::GreaterThan,
                FieldValue::Timestamp(since),
            )
            .await
    }

    /// Count unseen items in every tracked collection.
    ///
    /// Never fails: a failed count reads as zero. On a user's first visit
    /// the view-state record is created with every watermark at the store's
    /// clock and all counts are zero.
    #[instrument(skip(self), fields(uid = %uid))]
    pub async fn count_all(&self, uid: &UserUid) -> Vec<UnseenCount> {
        let zeros = || -> Vec<UnseenCount> {
            self.tracked.iter().cloned().map(UnseenCount::zero).collect()
        };

        let state = match self.view_states.get(uid).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::info!("Creating view-state record on first visit");
                if let Err(e) = self.view_states.mark(uid, self.tracked).await {
                    tracing::warn!(error = %e, "Failed to create view-state record");
                }
                return zeros();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read view-state record");
                return zeros();
            }
        };

        let counts = self.tracked.iter().map(|collection| {
            let last_viewed = state.last_viewed(collection);
            async move {
                let count = match self.count(collection, last_viewed).await {
                    Ok(count) => count,
                    Err(e) => {
                        tracing::warn!(
                            collection = %collection,
                            error = %e,
                            "Unseen count failed; reporting zero"
                        );
                        0
                    }
                };
                UnseenCount {
                    collection: collection.clone(),
                    count,
                }
            }
        });

        join_all(counts).await
    }

    /// Count unseen items without touching the view-state record.
    ///
    /// Returns `None` if the user has never opened the dashboard. Unlike
    /// [`count_all`](Self::count_all), failures are reported, not zeroed.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the view state or any count cannot be read.
    #[instrument(skip(self), fields(uid = %uid))]
    pub async fn peek_all(
        &self,
        uid: &UserUid,
    ) -> Result<Option<Vec<UnseenCount>>, AccountError> {
        let Some(state) = self.view_states.get(uid).await? else {
            return Ok(None);
        };

        let counts = self.tracked.iter().map(|collection| {
            let last_viewed = state.last_viewed(collection);
            async move {
                let count = self.count(collection, last_viewed).await?;
                Ok::<_, BackendError>(UnseenCount {
                    collection: collection.clone(),
                    count,
                })
            }
        });

        Ok(Some(try_join_all(counts).await?))
    }

    /// Record that the user has just opened `collection`.
    ///
    /// Other collections' watermarks are left untouched. Returns the new
    /// count for the collection, which is always zero.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` for an untracked collection, or a
    /// backend error if the write fails.
    #[instrument(skip(self), fields(uid = %uid, collection = %collection))]
    pub async fn mark_viewed(
        &self,
        uid: &UserUid,
        collection: &CollectionName,
    ) -> Result<UnseenCount, AccountError> {
        if !self.is_tracked(collection) {
            return Err(AccountError::Validation(format!(
                "'{collection}' is not a tracked collection"
            )));
        }

        self.view_states
            .mark(uid, std::slice::from_ref(collection))
            .await?;
        Ok(UnseenCount::zero(collection.clone()))
    }
}

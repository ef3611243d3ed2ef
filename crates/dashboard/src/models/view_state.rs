//! Per-user last-viewed watermarks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use stockroom_core::{CollectionName, UserUid};

/// Collection holding one view-state document per user, keyed by uid.
pub const VIEW_STATE_COLLECTION: &str = "lastViewed";

/// When a user last opened each tracked collection.
///
/// Collections the user has never opened have no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    /// Owner of the record.
    pub uid: UserUid,
    /// Last-viewed timestamp per collection.
    pub last_viewed: BTreeMap<CollectionName, DateTime<Utc>>,
}

impl ViewState {
    /// The watermark for `collection`, if one was recorded.
    #[must_use]
    pub fn last_viewed(&self, collection: &CollectionName) -> Option<DateTime<Utc>> {
        self.last_viewed.get(collection).copied()
    }
}

//! Unseen-item notification counts.

use serde::Serialize;

use stockroom_core::CollectionName;

/// Number of items created in a collection since the user last viewed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnseenCount {
    pub collection: CollectionName,
    pub count: usize,
}

impl UnseenCount {
    /// A zero count, reported after marking a collection viewed or when a
    /// count cannot be computed.
    #[must_use]
    pub const fn zero(collection: CollectionName) -> Self {
        Self {
            collection,
            count: 0,
        }
    }
}

//! Unseen-item counters.

use axum::{
    Json,
    extract::{Path, State},
};
use stockroom_core::CollectionName;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::UnseenCount;
use crate::services::AccountError;
use crate::state::AppState;

/// Unseen counts for every tracked collection, in configured order.
///
/// Never fails: collections whose query fails report zero.
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Json<Vec<UnseenCount>> {
    Json(state.unseen_counter().count_all(&user.uid).await)
}

/// Record that the user has viewed a collection.
#[instrument(skip_all)]
pub async fn mark_viewed(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(collection): Path<String>,
) -> Result<Json<UnseenCount>, AppError> {
    let collection = CollectionName::parse(&collection).map_err(AccountError::from)?;
    let count = state
        .unseen_counter()
        .mark_viewed(&user.uid, &collection)
        .await?;
    Ok(Json(count))
}

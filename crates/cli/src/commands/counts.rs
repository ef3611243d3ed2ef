//! Unseen-item counts for a user.

use stockroom_dashboard::config::tracked_collections_from_env;
use stockroom_dashboard::services::UnseenCounter;

use super::{CliError, Context};

/// Print the unseen counts the dashboard would show `handle`.
///
/// Read-only: a user who has never opened the dashboard gets no view-state
/// record created here.
///
/// # Errors
///
/// Fails if the tracked collection list is invalid, the user is unknown, or
/// a count cannot be read.
pub async fn print(ctx: &Context, handle: &str) -> Result<(), CliError> {
    let tracked = tracked_collections_from_env()?;
    let profile = ctx.profile(handle).await?;

    let counter = UnseenCounter::new(ctx.backends.store.as_ref(), &tracked);
    let Some(counts) = counter.peek_all(&profile.uid).await? else {
        tracing::info!("{} has never opened the dashboard", profile.username);
        return Ok(());
    };

    tracing::info!("Unseen items for {}:", profile.username);
    for count in &counts {
        tracing::info!("  {:<24} {}", count.collection, count.count);
    }
    Ok(())
}

//! Inspect stored push subscriptions.

use campus_market_core::UserId;
use campus_market_storefront::backend::SubscriptionStore;

use super::{CommandError, connect};

/// Log every endpoint stored for a user.
///
/// # Errors
///
/// Fails on bad configuration or a backend error.
pub async fn list(user_id: UserId) -> Result<(), CommandError> {
    let (_, backend) = connect()?;
    let subscriptions = backend.subscriptions_for_user(user_id).await?;

    if subscriptions.is_empty() {
        tracing::info!(%user_id, "no subscriptions stored");
        return Ok(());
    }

    for subscription in &subscriptions {
        tracing::info!(endpoint = %subscription.endpoint, "subscription");
    }
    tracing::info!(%user_id, count = subscriptions.len(), "subscriptions listed");
    Ok(())
}

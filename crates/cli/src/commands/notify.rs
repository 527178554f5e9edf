//! Push a notification from the command line.
//!
//! Goes through the same fan-out as `POST /api/send-notification`, so a
//! failing endpoint is reported and the rest are still attempted.

use campus_market_core::UserId;
use campus_market_storefront::{
    models::NotificationPayload,
    services::push::{RelayPushSender, deliver_to_user},
};

use super::{CommandError, connect};

/// Deliver a notification and log the outcome per endpoint.
///
/// # Errors
///
/// Fails on bad configuration, a backend error, or when the user has no
/// subscriptions. Individual delivery failures are only logged.
pub async fn send(
    user_id: UserId,
    title: String,
    body: String,
    url: Option<String>,
) -> Result<(), CommandError> {
    let (config, backend) = connect()?;
    let sender = RelayPushSender::new(&config.push)?;

    let payload = NotificationPayload { title, body, url };
    let results = deliver_to_user(&backend, &sender, user_id, &payload).await?;

    let mut delivered = 0usize;
    for result in &results {
        if result.success {
            delivered += 1;
            tracing::info!(endpoint = %result.endpoint, "delivered");
        } else {
            tracing::warn!(
                endpoint = %result.endpoint,
                error = result.error.as_deref().unwrap_or("unknown"),
                "delivery failed"
            );
        }
    }

    tracing::info!(
        %user_id,
        delivered,
        attempted = results.len(),
        "notification sent"
    );
    Ok(())
}

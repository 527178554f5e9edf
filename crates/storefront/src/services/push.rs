//! Web-push relay.
//!
//! Encryption and delivery belong to a push relay service; this module only
//! looks up a user's subscriptions and forwards each one with the payload.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use campus_market_core::UserId;

use crate::backend::{RemoteError, SubscriptionStore};
use crate::config::PushRelayConfig;
use crate::models::{DeliveryResult, NotificationPayload, PushSubscription};

/// Errors from a single delivery attempt.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid relay URL: {0}")]
    Url(#[from] url::ParseError),

    /// The relay answered with a non-success status.
    #[error("relay rejected delivery: {status} - {message}")]
    Rejected { status: u16, message: String },
}

/// Errors that abort a whole fan-out.
#[derive(Debug, Error)]
pub enum DeliverError {
    /// The user has no stored subscriptions.
    #[error("no subscriptions found for user {0}")]
    NoSubscriptions(UserId),

    #[error("backend error: {0}")]
    Remote(#[from] RemoteError),
}

/// Delivers one notification to one subscription.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError>;
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    subscription: &'a PushSubscription,
    payload: &'a NotificationPayload,
}

/// Push relay client.
#[derive(Clone)]
pub struct RelayPushSender {
    client: reqwest::Client,
    url: url::Url,
    token: SecretString,
}

impl RelayPushSender {
    /// Create a relay client.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &PushRelayConfig) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            url: url::Url::parse(&config.url)?,
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl PushSender for RelayPushSender {
    #[instrument(skip(self, payload), fields(endpoint = %subscription.endpoint))]
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(self.token.expose_secret())
            .json(&RelayRequest {
                subscription,
                payload,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(PushError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

/// Send `payload` to every subscription of `user_id`.
///
/// Attempts run one after another; a failed attempt is recorded in its result
/// and does not stop the rest.
///
/// # Errors
///
/// Returns [`DeliverError::NoSubscriptions`] without attempting anything if the
/// user has none, or [`DeliverError::Remote`] if they cannot be read.
#[instrument(skip(store, sender, payload))]
pub async fn deliver_to_user<S, P>(
    store: &S,
    sender: &P,
    user_id: UserId,
    payload: &NotificationPayload,
) -> Result<Vec<DeliveryResult>, DeliverError>
where
    S: SubscriptionStore + ?Sized,
    P: PushSender + ?Sized,
{
    let subscriptions = store.subscriptions_for_user(user_id).await?;
    if subscriptions.is_empty() {
        return Err(DeliverError::NoSubscriptions(user_id));
    }

    let mut results = Vec::with_capacity(subscriptions.len());
    for subscription in &subscriptions {
        let result = match sender.send(subscription, payload).await {
            Ok(()) => DeliveryResult {
                endpoint: subscription.endpoint.clone(),
                success: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!(endpoint = %subscription.endpoint, error = %e, "push delivery failed");
                DeliveryResult {
                    endpoint: subscription.endpoint.clone(),
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        };
        results.push(result);
    }

    let delivered = results.iter().filter(|r| r.success).count();
    tracing::info!(delivered, attempted = results.len(), "push fan-out finished");
    Ok(results)
}

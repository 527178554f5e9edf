//! Web-push handlers.
//!
//! Request fields are all optional at the type level so that missing input is
//! answered with a 400 and a readable message. Bodies that do not decode at
//! all are a 400 as well, through [`JsonBody`].

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use campus_market_core::UserId;

use crate::error::{AppError, Result};
use crate::extract::JsonBody;
use crate::models::{DeliveryResult, NotificationPayload, PushSubscription, SubscriptionKeys};
use crate::services::push::deliver_to_user;
use crate::state::AppState;

/// Body of `POST /api/save-subscription`.
#[derive(Debug, Deserialize)]
pub struct SaveSubscriptionRequest {
    pub user_id: Option<UserId>,
    pub endpoint: Option<String>,
    pub keys: Option<KeysRequest>,
}

/// Subscription keys as sent by the browser; either may be absent.
#[derive(Debug, Default, Deserialize)]
pub struct KeysRequest {
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}

impl KeysRequest {
    fn into_keys(self) -> Option<SubscriptionKeys> {
        match (self.p256dh, self.auth) {
            (Some(p256dh), Some(auth)) if !p256dh.is_empty() && !auth.is_empty() => {
                Some(SubscriptionKeys { p256dh, auth })
            }
            _ => None,
        }
    }
}

/// Body of `POST /api/send-notification`.
#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub user_id: Option<UserId>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
}

/// Response of `POST /api/save-subscription`.
#[derive(Debug, Serialize)]
pub struct SaveSubscriptionResponse {
    pub success: bool,
}

/// Response of `POST /api/send-notification`.
#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    pub success: bool,
    pub results: Vec<DeliveryResult>,
}

/// Store a browser's push subscription, replacing any with the same endpoint.
///
/// POST /api/save-subscription
#[instrument(skip(state, req))]
pub async fn save_subscription(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SaveSubscriptionRequest>,
) -> Result<Json<SaveSubscriptionResponse>> {
    let endpoint = req.endpoint.filter(|e| !e.is_empty());
    let keys = req.keys.and_then(KeysRequest::into_keys);
    let (Some(endpoint), Some(keys)) = (endpoint, keys) else {
        return Err(AppError::BadRequest("Missing endpoint or keys".to_string()));
    };

    state
        .backend()
        .upsert_subscription(&PushSubscription {
            user_id: req.user_id,
            endpoint,
            keys,
        })
        .await?;

    Ok(Json(SaveSubscriptionResponse { success: true }))
}

/// Deliver a notification to every subscription of a user.
///
/// Always 200 once at least one subscription exists; each attempt reports its
/// own outcome.
///
/// POST /api/send-notification
#[instrument(skip(state, req))]
pub async fn send_notification(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SendNotificationRequest>,
) -> Result<Json<SendNotificationResponse>> {
    let user_id = req
        .user_id
        .ok_or_else(|| AppError::BadRequest("Missing user_id".to_string()))?;

    let payload = NotificationPayload {
        title: req.title.unwrap_or_default(),
        body: req.body.unwrap_or_default(),
        url: req.url,
    };

    let results = deliver_to_user(state.backend(), state.push(), user_id, &payload).await?;
    Ok(Json(SendNotificationResponse {
        success: true,
        results,
    }))
}

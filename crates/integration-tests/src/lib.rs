//! Integration test harness for Campus Market.
//!
//! Runs the full storefront router in-process against the in-memory backend
//! and a recording push sender. Requests go through `tower::ServiceExt::oneshot`,
//! and the session cookie is carried from one request to the next like a
//! browser would.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p campus-market-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart` - Cart API over bearer tokens
//! - `admin_gate` - OTP gate and dashboard re-validation
//! - `admin_editor` - Master-admin management
//! - `push` - Subscription storage and notification fan-out

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderValue, Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

use campus_market_core::{AdminRole, Email, Price, ProductId};
use campus_market_storefront::{
    backend::{Backend, MemoryBackend},
    config::StorefrontConfig,
    models::{AdminRecord, Identity, NotificationPayload, ProductSummary, PushSubscription},
    routes,
    services::push::{PushError, PushSender},
    state::AppState,
};

/// Name of the session cookie set by the storefront.
pub const SESSION_COOKIE: &str = "cm_session";

/// Push sender that records every attempt and fails endpoints containing
/// `"broken"`.
#[derive(Debug, Default)]
pub struct RecordingSender {
    attempts: Mutex<Vec<(String, NotificationPayload)>>,
}

impl RecordingSender {
    /// Endpoints attempted so far, in order.
    pub fn attempted_endpoints(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }

    /// Payloads sent so far, in order.
    pub fn payloads(&self) -> Vec<NotificationPayload> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl PushSender for RecordingSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((subscription.endpoint.clone(), payload.clone()));
        if subscription.endpoint.contains("broken") {
            return Err(PushError::Rejected {
                status: 410,
                message: "subscription gone".to_string(),
            });
        }
        Ok(())
    }
}

/// A response with its body read and, when possible, parsed as JSON.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub text: String,
    pub json: Value,
}

/// The storefront under test plus handles to its collaborators.
pub struct TestApp {
    router: Router,
    cookie: Option<HeaderValue>,
    pub backend: Arc<MemoryBackend>,
    pub push: Arc<RecordingSender>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Fresh app with an empty backend and no session.
    #[must_use]
    pub fn new() -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let push = Arc::new(RecordingSender::default());
        let state = AppState::from_parts(
            StorefrontConfig::local_defaults(),
            Arc::clone(&backend) as Arc<dyn Backend>,
            Arc::clone(&push) as Arc<dyn PushSender>,
        );
        Self {
            router: routes::app(state),
            cookie: None,
            backend,
            push,
        }
    }

    /// Register a user and sign them in.
    ///
    /// # Panics
    ///
    /// Panics if `email` is not a valid address.
    pub async fn user(&self, email: &str) -> Identity {
        let email = Email::parse(email).unwrap_or_else(|e| panic!("bad test email: {e}"));
        let user_id = self.backend.add_user(&email).await;
        self.backend.sign_in(user_id).await
    }

    /// Add a product priced in cents.
    ///
    /// # Panics
    ///
    /// Panics if `cents` is negative.
    pub async fn product(&self, name: &str, cents: i64) -> ProductId {
        let id = ProductId::random();
        let price = Price::new(Decimal::new(cents, 2))
            .unwrap_or_else(|e| panic!("bad test price: {e}"));
        self.backend
            .add_product(ProductSummary {
                id,
                name: name.to_string(),
                price,
                image_url: None,
            })
            .await;
        id
    }

    /// Register an admin and walk the OTP gate with this app's session.
    ///
    /// # Panics
    ///
    /// Panics if the gate does not end up authorized.
    pub async fn admin_session(&mut self, email: &str, is_master_admin: bool) -> AdminRecord {
        let identity = self.user(email).await;
        let record = self
            .backend
            .add_admin_record(identity.user_id, AdminRole::Admin, true, is_master_admin)
            .await;

        let sent = self
            .post("/admin/otp/send", None, json!({ "email": email }))
            .await;
        assert_eq!(sent.status, StatusCode::OK, "{}", sent.text);

        let verified = self
            .post(
                "/admin/otp/verify",
                None,
                json!({ "code": MemoryBackend::DEFAULT_OTP_CODE }),
            )
            .await;
        assert_eq!(verified.json["state"], "authorized", "{}", verified.text);
        record
    }

    /// Forget the session cookie, as a new browser would.
    pub fn drop_session(&mut self) {
        self.cookie = None;
    }

    /// Send a request, attaching and then refreshing the session cookie.
    ///
    /// # Panics
    ///
    /// Panics if the router fails or the body cannot be read.
    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request.headers_mut().insert(header::COOKIE, cookie.clone());
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|e| match e {});

        if let Some(cookie) = session_cookie(response.headers().get_all(header::SET_COOKIE)) {
            self.cookie = Some(cookie);
        }

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_else(|e| panic!("failed to read body: {e}"));
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let json = serde_json::from_str(&text).unwrap_or(Value::Null);
        TestResponse { status, text, json }
    }

    /// `GET` without a body.
    pub async fn get(&mut self, uri: &str, token: Option<&Identity>) -> TestResponse {
        self.send(build(Method::GET, uri, token, None)).await
    }

    /// `POST` with a JSON body.
    pub async fn post(&mut self, uri: &str, token: Option<&Identity>, body: Value) -> TestResponse {
        self.send(build(Method::POST, uri, token, Some(body))).await
    }

    /// `PATCH` with a JSON body.
    pub async fn patch(
        &mut self,
        uri: &str,
        token: Option<&Identity>,
        body: Value,
    ) -> TestResponse {
        self.send(build(Method::PATCH, uri, token, Some(body))).await
    }

    /// `DELETE` without a body.
    pub async fn delete(&mut self, uri: &str, token: Option<&Identity>) -> TestResponse {
        self.send(build(Method::DELETE, uri, token, None)).await
    }
}

fn build(method: Method, uri: &str, who: Option<&Identity>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(who) = who {
        builder = builder.header(
            header::AUTHORIZATION,
            format!("Bearer {}", who.access_token.expose()),
        );
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder
        .body(body)
        .unwrap_or_else(|e| panic!("bad test request: {e}"))
}

fn session_cookie<'a>(
    values: impl IntoIterator<Item = &'a HeaderValue>,
) -> Option<HeaderValue> {
    values.into_iter().find_map(|value| {
        let pair = value.to_str().ok()?.split(';').next()?.trim();
        pair.starts_with(&format!("{SESSION_COOKIE}="))
            .then(|| HeaderValue::from_str(pair).ok())
            .flatten()
    })
}

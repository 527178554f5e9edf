//! Authentication extractors.
//!
//! Shoppers authenticate with a bearer token issued by the managed backend.
//! Admins additionally hold an [`AdminCapability`] in their session, which is
//! re-checked against the live admin record on every admin request.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use tower_sessions::Session;

use campus_market_core::AccessToken;

use crate::backend::AdminDirectory;
use crate::error::{AppError, set_sentry_user};
use crate::models::{Identity, session_keys};
use crate::services::admin::{AdminCapability, AdminEditor, AdminGate};
use crate::state::AppState;

/// Extractor that resolves an optional bearer token to an identity.
///
/// A missing or unknown token yields `None`; only a backend failure rejects.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(BearerIdentity(who): BearerIdentity) -> impl IntoResponse {
///     match who {
///         Some(identity) => format!("Hello, {}!", identity.user_id),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct BearerIdentity(pub Option<Identity>);

impl FromRequestParts<AppState> for BearerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Self(None));
        };

        let identity = state.backend().resolve_token(&token).await?;
        if let Some(identity) = &identity {
            set_sentry_user(
                &identity.user_id,
                identity.email.as_ref().map(campus_market_core::Email::as_str),
            );
        }
        Ok(Self(identity))
    }
}

/// Extractor that requires a signed-in shopper.
pub struct RequireIdentity(pub Identity);

impl FromRequestParts<AppState> for RequireIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerIdentity(identity) = BearerIdentity::from_request_parts(parts, state).await?;
        identity
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))
    }
}

/// Extractor that requires a session which passed the admin gate.
///
/// The capability is re-validated against the backend on every request; a
/// revoked or deactivated admin loses the session's capability immediately.
pub struct RequireAdmin(pub AdminCapability);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let mut gate = load_gate(&session).await?;
        if gate.capability().is_none() {
            return Err(AppError::Unauthorized("admin sign-in required".to_string()));
        }

        let checked = gate
            .revalidate(state.backend(), Utc::now())
            .await
            .cloned();
        store_gate(&session, &gate).await?;
        Ok(Self(checked?))
    }
}

/// Extractor that requires the master-admin capability.
pub struct RequireMasterAdmin(pub AdminCapability);

impl RequireMasterAdmin {
    /// Admin editor acting as this master admin.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] if the capability lost master rights.
    pub fn editor<'a, D: AdminDirectory + ?Sized>(
        &'a self,
        directory: &'a D,
    ) -> Result<AdminEditor<'a, D>, AppError> {
        self.0
            .master()
            .map(|master| AdminEditor::new(directory, master))
            .ok_or_else(forbidden)
    }
}

impl FromRequestParts<AppState> for RequireMasterAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAdmin(capability) = RequireAdmin::from_request_parts(parts, state).await?;
        if capability.master().is_none() {
            return Err(forbidden());
        }
        Ok(Self(capability))
    }
}

fn forbidden() -> AppError {
    AppError::Forbidden("master admin required".to_string())
}

fn bearer_token(parts: &Parts) -> Option<AccessToken> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(AccessToken::new)
}

/// Load the admin gate from the session, starting fresh if absent.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn load_gate(session: &Session) -> Result<AdminGate, tower_sessions::session::Error> {
    Ok(session
        .get::<AdminGate>(session_keys::ADMIN_GATE)
        .await?
        .unwrap_or_default())
}

/// Store the admin gate in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn store_gate(
    session: &Session,
    gate: &AdminGate,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::ADMIN_GATE, gate).await
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/cart");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (parts, ()) = builder
            .body(())
            .unwrap_or_else(|_| unreachable!("static request is valid"))
            .into_parts();
        parts
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(
            bearer_token(&parts(Some("Bearer abc.def"))).map(|t| t.expose().to_string()),
            Some("abc.def".to_string())
        );
        assert!(bearer_token(&parts(Some("Basic dXNlcg=="))).is_none());
        assert!(bearer_token(&parts(Some("Bearer   "))).is_none());
        assert!(bearer_token(&parts(None)).is_none());
    }
}

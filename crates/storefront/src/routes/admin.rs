//! Admin gate and admin management handlers.
//!
//! The gate state lives in the session. Every state-changing handler loads
//! it, applies one transition and writes it back before responding.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use campus_market_core::{AdminId, AdminRole, Email};

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::extract::JsonBody;
use crate::middleware::{RequireAdmin, RequireMasterAdmin, load_gate, store_gate};
use crate::models::{AdminRecord, AdminUpdate, session_keys};
use crate::services::admin::{
    AdminGate, AdminListing, GateOutcome, GateState, Redirect, VerifiedCandidate, list_admins,
};
use crate::state::AppState;

/// Body of `POST /admin/otp/send`.
#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    pub email: String,
}

/// Body of `POST /admin/otp/verify`.
#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    pub code: String,
}

/// Gate status as seen by the client.
#[derive(Debug, Serialize)]
pub struct GateView {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
}

impl GateView {
    fn of(gate: &AdminGate, remaining_seconds: Option<u64>) -> Self {
        let message = match gate.state() {
            GateState::Denied { reason } => Some(reason.message()),
            _ => None,
        };
        Self {
            state: gate.state().name(),
            remaining_seconds,
            message,
            redirect: gate.state().redirect(),
        }
    }
}

/// Request a code for an admin email.
///
/// POST /admin/otp/send
#[instrument(skip(state, session))]
pub async fn send_code(
    State(state): State<AppState>,
    session: Session,
    JsonBody(req): JsonBody<SendCodeRequest>,
) -> Result<Json<GateView>> {
    let now = Utc::now();
    let mut gate = load_gate(&session).await?;
    gate.request_code(state.backend(), &req.email, now).await?;
    let remaining = gate.tick(now);
    store_gate(&session, &gate).await?;
    Ok(Json(GateView::of(&gate, remaining)))
}

/// Countdown status. Expiry is applied here.
///
/// GET /admin/otp/status
pub async fn status(session: Session) -> Result<Json<GateView>> {
    let mut gate = load_gate(&session).await?;
    let remaining = gate.tick(Utc::now());
    store_gate(&session, &gate).await?;
    Ok(Json(GateView::of(&gate, remaining)))
}

/// Submit the emailed code.
///
/// POST /admin/otp/verify
#[instrument(skip(state, session, req))]
pub async fn verify_code(
    State(state): State<AppState>,
    session: Session,
    JsonBody(req): JsonBody<VerifyCodeRequest>,
) -> Result<Json<GateView>> {
    let now = Utc::now();
    let mut gate = load_gate(&session).await?;
    let result = gate.verify(state.backend(), &req.code, now).await;

    if matches!(result, Ok(GateOutcome::Authorized)) {
        // New privileges, new session id
        session.cycle_id().await?;
        if let Some(capability) = gate.capability() {
            let identity = capability.identity();
            set_sentry_user(&identity.user_id, identity.email.as_ref().map(Email::as_str));
        }
    }
    store_gate(&session, &gate).await?;

    result?;
    let remaining = gate.tick(now);
    Ok(Json(GateView::of(&gate, remaining)))
}

/// Leave the admin area.
///
/// POST /admin/logout
pub async fn logout(session: Session) -> Result<Json<GateView>> {
    let mut gate = load_gate(&session).await?;
    gate.logout();
    store_gate(&session, &gate).await?;
    session
        .remove::<VerifiedCandidate>(session_keys::ADMIN_CANDIDATE)
        .await?;
    clear_sentry_user();
    Ok(Json(GateView::of(&gate, None)))
}

/// The signed-in admin.
#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub admin_id: AdminId,
    pub email: Option<Email>,
    pub role: AdminRole,
    pub is_master_admin: bool,
    pub verified_at: DateTime<Utc>,
}

/// Admin landing page data; re-validated on every request.
///
/// GET /admin/dashboard
pub async fn dashboard(RequireAdmin(capability): RequireAdmin) -> Json<DashboardView> {
    Json(DashboardView {
        admin_id: capability.admin_id(),
        email: capability.identity().email.clone(),
        role: capability.role(),
        is_master_admin: capability.master().is_some(),
        verified_at: capability.verified_at(),
    })
}

/// All admins with presentation flags for the viewer.
///
/// GET /admin/admins
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(capability): RequireAdmin,
) -> Result<Json<Vec<AdminListing>>> {
    Ok(Json(list_admins(state.backend(), &capability).await?))
}

/// Body of `POST /admin/admins/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyCandidateRequest {
    pub email: String,
}

/// Phase one of adding an admin: check the email and remember the candidate.
///
/// POST /admin/admins/verify
#[instrument(skip(state, master, session))]
pub async fn verify_candidate(
    State(state): State<AppState>,
    master: RequireMasterAdmin,
    session: Session,
    JsonBody(req): JsonBody<VerifyCandidateRequest>,
) -> Result<Json<VerifiedCandidate>> {
    let candidate = master
        .editor(state.backend())?
        .verify_candidate(&req.email)
        .await?;
    session
        .insert(session_keys::ADMIN_CANDIDATE, &candidate)
        .await?;
    Ok(Json(candidate))
}

/// Body of `POST /admin/admins`.
#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub role: AdminRole,
}

/// Phase two of adding an admin: submit the verified candidate with a role.
///
/// POST /admin/admins
#[instrument(skip(state, master, session))]
pub async fn create(
    State(state): State<AppState>,
    master: RequireMasterAdmin,
    session: Session,
    JsonBody(req): JsonBody<CreateAdminRequest>,
) -> Result<(StatusCode, Json<AdminRecord>)> {
    let editor = master.editor(state.backend())?;
    let candidate = session
        .remove::<VerifiedCandidate>(session_keys::ADMIN_CANDIDATE)
        .await?
        .ok_or_else(|| AppError::BadRequest("verify the email first".to_string()))?;

    let record = editor.add(candidate, req.role).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Change an admin's role, status or profile.
///
/// PATCH /admin/admins/{id}
#[instrument(skip(state, master))]
pub async fn update(
    State(state): State<AppState>,
    master: RequireMasterAdmin,
    Path(id): Path<AdminId>,
    JsonBody(update): JsonBody<AdminUpdate>,
) -> Result<Json<AdminRecord>> {
    let record = master.editor(state.backend())?.update(id, &update).await?;
    Ok(Json(record))
}

/// Delete an admin.
///
/// DELETE /admin/admins/{id}
#[instrument(skip(state, master))]
pub async fn delete(
    State(state): State<AppState>,
    master: RequireMasterAdmin,
    Path(id): Path<AdminId>,
) -> Result<StatusCode> {
    master.editor(state.backend())?.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

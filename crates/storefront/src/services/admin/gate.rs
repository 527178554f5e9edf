//! Admin OTP gate.
//!
//! ```text
//! Idle --request_code--> OtpSent --verify--> Authorized
//!                           |        \-----> Denied(NotAdmin | Inactive)
//!                           \--countdown---> Expired
//! ```
//!
//! The gate lives in the caller's session. Reaching `Authorized` stores an
//! [`AdminCapability`]; the dashboard re-checks it against the live admin
//! record on every request with [`AdminGate::revalidate`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use campus_market_core::{AdminId, AdminRole, Email, EmailError, OtpCode, OtpCodeError};

use crate::backend::{AdminDirectory, AuthProvider, RemoteError};
use crate::models::{AdminRecord, Identity};

/// Seconds a sent code stays usable.
pub const OTP_TTL_SECONDS: i64 = 120;

/// Where to send someone who got a denial.
const DENIED_PATH: &str = "/";

/// Where to send someone whose code expired.
const EXPIRED_PATH: &str = "/onboarding";

/// Landing page after authorization.
const DASHBOARD_PATH: &str = "/admin/dashboard";

/// Seconds an inactive admin sees the message before being redirected.
const INACTIVE_REDIRECT_DELAY: u32 = 3;

/// Errors from gate transitions.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("invalid code: {0}")]
    InvalidCode(#[from] OtpCodeError),

    /// Verify without a code having been sent.
    #[error("no code has been requested")]
    NoPendingChallenge,

    /// The countdown ran out.
    #[error("the code has expired")]
    Expired,

    /// The auth service would not send a code to this address.
    #[error("a code could not be sent to this address")]
    SendRejected,

    #[error("already signed in as admin")]
    AlreadyAuthorized,

    /// The auth service refused the code.
    #[error("the code is incorrect")]
    CodeRejected,

    /// No (longer a) valid capability.
    #[error("admin access required")]
    NotAuthorized,

    #[error("backend error: {0}")]
    Remote(#[from] RemoteError),
}

/// A code sent to an email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub email: Email,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    fn issue(email: Email, now: DateTime<Utc>) -> Self {
        Self {
            email,
            issued_at: now,
            expires_at: now + Duration::seconds(OTP_TTL_SECONDS),
        }
    }

    /// Whole seconds left on the countdown, zero once expired.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((self.expires_at - now).num_seconds()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Why a verified user was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NotAdmin,
    Inactive,
}

impl DenialReason {
    /// Message shown to the user.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotAdmin => "You are not authorized to access the admin area.",
            Self::Inactive => "Your admin account has been deactivated. Contact a master admin.",
        }
    }
}

/// Navigation instruction for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub to: &'static str,
    pub after_seconds: u32,
}

/// Proof that a user passed the gate as an active admin.
///
/// Only the gate constructs one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCapability {
    admin_id: AdminId,
    identity: Identity,
    role: AdminRole,
    is_master_admin: bool,
    verified_at: DateTime<Utc>,
}

impl AdminCapability {
    pub(crate) fn from_record(record: &AdminRecord, identity: Identity, now: DateTime<Utc>) -> Self {
        Self {
            admin_id: record.id,
            identity,
            role: record.role,
            is_master_admin: record.is_master_admin,
            verified_at: now,
        }
    }

    #[must_use]
    pub const fn admin_id(&self) -> AdminId {
        self.admin_id
    }

    /// The authenticated user behind the capability.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub const fn role(&self) -> AdminRole {
        self.role
    }

    #[must_use]
    pub const fn verified_at(&self) -> DateTime<Utc> {
        self.verified_at
    }

    /// Master-admin capability, if this admin has it.
    #[must_use]
    pub fn master(&self) -> Option<MasterAdmin<'_>> {
        self.is_master_admin.then_some(MasterAdmin { capability: self })
    }
}

/// Capability to manage other admin records.
#[derive(Debug, Clone, Copy)]
pub struct MasterAdmin<'a> {
    capability: &'a AdminCapability,
}

impl MasterAdmin<'_> {
    #[must_use]
    pub const fn capability(&self) -> &AdminCapability {
        self.capability
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.capability.identity
    }
}

/// Gate states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    #[default]
    Idle,
    OtpSent { challenge: OtpChallenge },
    Authorized { capability: AdminCapability },
    Denied { reason: DenialReason },
    Expired,
}

impl GateState {
    /// Short state name for clients.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::OtpSent { .. } => "otp_sent",
            Self::Authorized { .. } => "authorized",
            Self::Denied { .. } => "denied",
            Self::Expired => "expired",
        }
    }

    /// Where the client should go from this state, if anywhere.
    #[must_use]
    pub const fn redirect(&self) -> Option<Redirect> {
        match self {
            Self::Idle | Self::OtpSent { .. } => None,
            Self::Authorized { .. } => Some(Redirect {
                to: DASHBOARD_PATH,
                after_seconds: 0,
            }),
            Self::Denied {
                reason: DenialReason::NotAdmin,
            } => Some(Redirect {
                to: DENIED_PATH,
                after_seconds: 0,
            }),
            Self::Denied {
                reason: DenialReason::Inactive,
            } => Some(Redirect {
                to: DENIED_PATH,
                after_seconds: INACTIVE_REDIRECT_DELAY,
            }),
            Self::Expired => Some(Redirect {
                to: EXPIRED_PATH,
                after_seconds: 0,
            }),
        }
    }
}

/// Result of a completed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Authorized,
    Denied(DenialReason),
}

/// Session-scoped gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminGate {
    state: GateState,
}

impl AdminGate {
    #[must_use]
    pub const fn state(&self) -> &GateState {
        &self.state
    }

    /// The stored capability, if authorized.
    #[must_use]
    pub const fn capability(&self) -> Option<&AdminCapability> {
        match &self.state {
            GateState::Authorized { capability } => Some(capability),
            _ => None,
        }
    }

    /// Send a code to `email` and start the countdown.
    ///
    /// Starts over from any state except `Authorized`.
    ///
    /// # Errors
    ///
    /// - [`GateError::InvalidEmail`] if `email` is malformed (nothing is sent)
    /// - [`GateError::AlreadyAuthorized`] if the session already passed
    /// - [`GateError::SendRejected`] if the auth service refused the address
    /// - [`GateError::Remote`] if the code could not be sent
    #[instrument(skip(self, auth))]
    pub async fn request_code<A: AuthProvider + ?Sized>(
        &mut self,
        auth: &A,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<&OtpChallenge, GateError> {
        if matches!(self.state, GateState::Authorized { .. }) {
            return Err(GateError::AlreadyAuthorized);
        }
        let email = Email::parse(email)?;
        match auth.send_otp(&email).await {
            Ok(()) => {}
            Err(e) if e.is_client_rejection() => {
                tracing::info!(%email, error = %e, "admin code not sent");
                return Err(GateError::SendRejected);
            }
            Err(e) => return Err(e.into()),
        }

        self.state = GateState::OtpSent {
            challenge: OtpChallenge::issue(email, now),
        };
        match &self.state {
            GateState::OtpSent { challenge } => Ok(challenge),
            _ => Err(GateError::NoPendingChallenge),
        }
    }

    /// Advance the countdown. Returns the seconds left while a code is
    /// pending.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<u64> {
        let GateState::OtpSent { challenge } = &self.state else {
            return None;
        };
        if challenge.is_expired(now) {
            tracing::info!(email = %challenge.email, "admin code expired");
            self.state = GateState::Expired;
            return None;
        }
        Some(challenge.remaining_seconds(now))
    }

    /// Check a submitted code and decide access.
    ///
    /// A rejected code keeps the challenge pending. A verified user without an
    /// active admin record ends in `Denied`.
    ///
    /// # Errors
    ///
    /// - [`GateError::Expired`] if the countdown ran out
    /// - [`GateError::NoPendingChallenge`] outside `OtpSent`
    /// - [`GateError::InvalidCode`] if `code` is not six digits
    /// - [`GateError::CodeRejected`] if the auth service refused it
    /// - [`GateError::Remote`] on backend failure
    #[instrument(skip(self, backend, code))]
    pub async fn verify<B: AuthProvider + AdminDirectory + ?Sized>(
        &mut self,
        backend: &B,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<GateOutcome, GateError> {
        self.tick(now);
        let challenge = match &self.state {
            GateState::OtpSent { challenge } => challenge.clone(),
            GateState::Expired => return Err(GateError::Expired),
            _ => return Err(GateError::NoPendingChallenge),
        };
        let code = OtpCode::parse(code)?;

        let identity = match backend.verify_otp(&challenge.email, &code).await {
            Ok(identity) => identity,
            Err(e) if e.is_client_rejection() => {
                tracing::info!(email = %challenge.email, error = %e, "admin code rejected");
                return Err(GateError::CodeRejected);
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = match backend.admin_for_user(&identity).await? {
            None => {
                tracing::warn!(user_id = %identity.user_id, "non-admin passed OTP for admin gate");
                self.state = GateState::Denied {
                    reason: DenialReason::NotAdmin,
                };
                GateOutcome::Denied(DenialReason::NotAdmin)
            }
            Some(record) if !record.is_active => {
                tracing::warn!(admin_id = %record.id, "inactive admin refused");
                self.state = GateState::Denied {
                    reason: DenialReason::Inactive,
                };
                GateOutcome::Denied(DenialReason::Inactive)
            }
            Some(record) => {
                tracing::info!(admin_id = %record.id, role = %record.role, "admin authorized");
                self.state = GateState::Authorized {
                    capability: AdminCapability::from_record(&record, identity, now),
                };
                GateOutcome::Authorized
            }
        };
        Ok(outcome)
    }

    /// Re-check the stored capability against the live admin record.
    ///
    /// Any failure, including a backend error, clears the gate.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::NotAuthorized`] if there is no capability or the
    /// record is gone or inactive, and [`GateError::Remote`] if the check could
    /// not be made.
    pub async fn revalidate<D: AdminDirectory + ?Sized>(
        &mut self,
        directory: &D,
        now: DateTime<Utc>,
    ) -> Result<&AdminCapability, GateError> {
        let GateState::Authorized { capability } = &self.state else {
            return Err(GateError::NotAuthorized);
        };
        let identity = capability.identity.clone();

        let record = match directory.admin_for_user(&identity).await {
            Ok(Some(record)) if record.is_active => record,
            Ok(_) => {
                tracing::warn!(user_id = %identity.user_id, "admin capability revoked");
                self.state = GateState::Idle;
                return Err(GateError::NotAuthorized);
            }
            Err(e) => {
                self.state = GateState::Idle;
                return Err(e.into());
            }
        };

        self.state = GateState::Authorized {
            capability: AdminCapability::from_record(&record, identity, now),
        };
        self.capability().ok_or(GateError::NotAuthorized)
    }

    /// Drop any progress or capability.
    pub fn logout(&mut self) {
        self.state = GateState::Idle;
    }
}

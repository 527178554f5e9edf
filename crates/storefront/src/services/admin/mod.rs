//! Admin access: the OTP gate and admin record management.

pub mod editor;
pub mod gate;

pub use editor::{AdminEditor, AdminListing, EditorError, VerifiedCandidate, can_delete, list_admins};
pub use gate::{
    AdminCapability, AdminGate, DenialReason, GateError, GateOutcome, GateState, MasterAdmin,
    OTP_TTL_SECONDS, OtpChallenge, Redirect,
};

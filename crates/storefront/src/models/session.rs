//! Caller identity and session keys.

use serde::{Deserialize, Serialize};

use campus_market_core::{AccessToken, Email, UserId};

/// A user the managed backend has authenticated.
///
/// Carries the caller's access token so user-scoped requests run under the
/// backend's row-level security policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<Email>,
    pub access_token: AccessToken,
}

/// Session keys for admin gate data.
pub mod keys {
    /// Key for the admin gate state machine.
    pub const ADMIN_GATE: &str = "admin_gate";

    /// Key for the candidate verified in phase one of the add-admin flow.
    pub const ADMIN_CANDIDATE: &str = "admin_candidate";
}

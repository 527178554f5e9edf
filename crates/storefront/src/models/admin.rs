//! Admin record types.
//!
//! Admin records live in the backend's `admins` table and are only changed
//! through its procedures, which authorize against the caller's own record.

use serde::{Deserialize, Serialize};

use campus_market_core::{AdminId, AdminRole, Email, UserId};

/// A row of the `admins` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRecord {
    pub id: AdminId,
    pub user_id: UserId,
    pub email: Email,
    pub role: AdminRole,
    pub is_active: bool,
    pub is_master_admin: bool,
    pub full_name: Option<String>,
    pub username: Option<String>,
}

/// Arguments for the `add_admin` procedure.
#[derive(Debug, Clone, Serialize)]
pub struct NewAdmin {
    pub user_id: UserId,
    pub email: Email,
    pub role: AdminRole,
}

/// Arguments for the `update_admin` procedure. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AdminRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl AdminUpdate {
    /// Whether the update would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.is_active.is_none()
            && self.full_name.is_none()
            && self.username.is_none()
    }
}

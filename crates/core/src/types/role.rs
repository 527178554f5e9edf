//! Admin roles.

use serde::{Deserialize, Serialize};

/// Role assigned to an admin record.
///
/// The role is presentation data for the admin surface; what an admin may
/// actually change is decided by the backend's procedures, and managing other
/// admins additionally requires the master-admin flag on the caller's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Manages listings, orders and users.
    Admin,
    /// Reviews and moderates listings.
    Moderator,
    /// Handles support requests.
    Support,
}

impl AdminRole {
    /// All roles, in the order they are offered when assigning one.
    pub const ALL: [Self; 3] = [Self::Admin, Self::Moderator, Self::Support];
}

impl std::fmt::Display for AdminRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Moderator => write!(f, "moderator"),
            Self::Support => write!(f, "support"),
        }
    }
}

impl std::str::FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "support" => Ok(Self::Support),
            _ => Err(format!("invalid admin role: {s}")),
        }
    }
}

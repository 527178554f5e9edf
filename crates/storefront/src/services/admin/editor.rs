//! Admin record management for master admins.
//!
//! Adding an admin is two-phase: [`AdminEditor::verify_candidate`] checks that
//! the email belongs to a known user who is not an admin yet, and only the
//! resulting [`VerifiedCandidate`] can be submitted with a role. The backend
//! procedures authorize every change; this module only gates what is offered.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use campus_market_core::{AdminId, AdminRole, Email, EmailError, UserId};

use super::gate::{AdminCapability, MasterAdmin};
use crate::backend::{AdminDirectory, RemoteError};
use crate::models::{AdminRecord, AdminUpdate, NewAdmin};

/// Errors from admin record management.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// No auth user has this email.
    #[error("no user is registered with {0}")]
    UnknownUser(Email),

    #[error("{0} is already an admin")]
    AlreadyAdmin(Email),

    #[error("nothing to update")]
    EmptyUpdate,

    #[error("backend error: {0}")]
    Remote(#[from] RemoteError),
}

/// A user that passed both add-admin checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedCandidate {
    pub user_id: UserId,
    pub email: Email,
}

/// An admin row plus what the viewer may do with it.
#[derive(Debug, Clone, Serialize)]
pub struct AdminListing {
    #[serde(flatten)]
    pub record: AdminRecord,
    pub can_delete: bool,
}

/// Whether `viewer` is offered the delete action for `record`.
///
/// Masters may delete any record but their own.
#[must_use]
pub fn can_delete(viewer: &AdminCapability, record: &AdminRecord) -> bool {
    viewer.master().is_some() && record.id != viewer.admin_id()
}

/// All admins, annotated for `viewer`.
///
/// # Errors
///
/// Returns [`EditorError::Remote`] if the list cannot be read.
pub async fn list_admins<D: AdminDirectory + ?Sized>(
    directory: &D,
    viewer: &AdminCapability,
) -> Result<Vec<AdminListing>, EditorError> {
    let records = directory.list_admins(viewer.identity()).await?;
    Ok(records
        .into_iter()
        .map(|record| AdminListing {
            can_delete: can_delete(viewer, &record),
            record,
        })
        .collect())
}

/// Admin management on behalf of a master admin.
pub struct AdminEditor<'a, D: AdminDirectory + ?Sized> {
    directory: &'a D,
    master: MasterAdmin<'a>,
}

impl<'a, D: AdminDirectory + ?Sized> AdminEditor<'a, D> {
    #[must_use]
    pub const fn new(directory: &'a D, master: MasterAdmin<'a>) -> Self {
        Self { directory, master }
    }

    /// Phase one of adding an admin.
    ///
    /// # Errors
    ///
    /// - [`EditorError::InvalidEmail`] if `email` is malformed
    /// - [`EditorError::UnknownUser`] if no user has the email
    /// - [`EditorError::AlreadyAdmin`] if the user already has a record
    #[instrument(skip(self))]
    pub async fn verify_candidate(&self, email: &str) -> Result<VerifiedCandidate, EditorError> {
        let email = Email::parse(email)?;
        let who = self.master.identity();

        let user_id = self
            .directory
            .user_id_by_email(who, &email)
            .await?
            .ok_or_else(|| EditorError::UnknownUser(email.clone()))?;

        if self.directory.admin_by_email(who, &email).await?.is_some() {
            return Err(EditorError::AlreadyAdmin(email));
        }

        Ok(VerifiedCandidate { user_id, email })
    }

    /// Phase two: create the admin record.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Remote`] if the procedure refuses or fails.
    #[instrument(skip(self), fields(email = %candidate.email))]
    pub async fn add(
        &self,
        candidate: VerifiedCandidate,
        role: AdminRole,
    ) -> Result<AdminRecord, EditorError> {
        let record = self
            .directory
            .add_admin(
                self.master.identity(),
                &NewAdmin {
                    user_id: candidate.user_id,
                    email: candidate.email,
                    role,
                },
            )
            .await?;
        tracing::info!(admin_id = %record.id, %role, "admin added");
        Ok(record)
    }

    /// Change role, status or profile fields.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::EmptyUpdate`] if `update` changes nothing, or
    /// [`EditorError::Remote`] if the procedure refuses or fails.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: AdminId,
        update: &AdminUpdate,
    ) -> Result<AdminRecord, EditorError> {
        if update.is_empty() {
            return Err(EditorError::EmptyUpdate);
        }
        let record = self
            .directory
            .update_admin(self.master.identity(), id, update)
            .await?;
        tracing::info!(admin_id = %id, "admin updated");
        Ok(record)
    }

    /// Delete an admin record.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Remote`] if the procedure refuses or fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: AdminId) -> Result<(), EditorError> {
        self.directory
            .delete_admin(self.master.identity(), id)
            .await?;
        tracing::info!(admin_id = %id, "admin deleted");
        Ok(())
    }

    /// The acting master admin.
    #[must_use]
    pub const fn actor(&self) -> &AdminCapability {
        self.master.capability()
    }
}

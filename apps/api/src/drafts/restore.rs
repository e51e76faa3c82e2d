//! Restoration and soft deletion. Neither rewrites history: restore appends a
//! new head carrying old content, delete only tombstones.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::drafts::engine::VersionOutcome;
use crate::drafts::errors::{DraftError, Invariant};
use crate::drafts::store::Deactivation;
use crate::drafts::DraftService;
use crate::models::draft::OriginSource;

impl DraftService {
    /// Replays the content and metadata of `version_id` onto the family head.
    /// A no-op when the head already holds that content.
    pub async fn restore_version(
        &self,
        version_id: Uuid,
        owner_id: Uuid,
    ) -> Result<VersionOutcome, DraftError> {
        let target = self.get_version(version_id, owner_id).await?;
        let head = self.get_head(target.id, owner_id).await?;

        let outcome = self
            .create_version_if_changed(
                head.id,
                target.content,
                target.metadata,
                owner_id,
                OriginSource::Restore,
            )
            .await?;

        if let VersionOutcome::Created { version } = &outcome {
            info!(
                "Restored v{} of draft family as v{} ({})",
                target.version_number, version.version_number, version.id
            );
        }
        Ok(outcome)
    }

    /// Tombstones a version, refusing to deactivate the last active one.
    pub async fn delete_version(&self, version_id: Uuid, owner_id: Uuid) -> Result<(), DraftError> {
        match self.store.deactivate_unless_last(version_id, owner_id).await? {
            Deactivation::Deactivated => {
                info!("Soft-deleted draft version {version_id}");
                Ok(())
            }
            Deactivation::AlreadyInactive => {
                debug!("Draft version {version_id} already deleted");
                Ok(())
            }
            Deactivation::LastActive => {
                warn!("Refusing to delete {version_id}: last active version of its family");
                Err(DraftError::InvariantViolation(Invariant::LastActiveVersion))
            }
            Deactivation::NotFound => Err(DraftError::NotFound(version_id.to_string())),
        }
    }
}

//! Version creation, gated on whether the content actually changed.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::drafts::errors::DraftError;
use crate::drafts::hashing::content_hash;
use crate::drafts::DraftService;
use crate::models::draft::{DraftPatch, DraftVersion, NewDraftVersion, OriginSource};

/// Result of a change-gated write. `Unchanged` means zero rows were written.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VersionOutcome {
    Created { version: DraftVersion },
    Unchanged { current_id: Uuid },
}

impl VersionOutcome {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, VersionOutcome::Unchanged { .. })
    }
}

/// A document saved for the first time.
#[derive(Debug, Clone)]
pub struct NewDraft {
    pub owner_id: Uuid,
    pub name: String,
    pub template_id: Option<Uuid>,
    pub content: Value,
    pub metadata: Value,
    pub origin_source: OriginSource,
}

impl DraftService {
    /// Saves a new family root (version 1, no parent).
    pub async fn create_draft(&self, draft: NewDraft) -> Result<DraftVersion, DraftError> {
        let content_hash = content_hash(&draft.content);
        let root = self
            .store
            .create(NewDraftVersion {
                owner_id: draft.owner_id,
                name: draft.name,
                parent_id: None,
                origin_source: draft.origin_source,
                template_id: draft.template_id,
                content: draft.content,
                metadata: draft.metadata,
                content_hash,
            })
            .await?;

        info!("Created draft {} for owner {}", root.id, root.owner_id);
        Ok(root)
    }

    pub async fn get_version(&self, id: Uuid, owner_id: Uuid) -> Result<DraftVersion, DraftError> {
        self.store
            .fetch_by_id(id, owner_id)
            .await?
            .ok_or_else(|| DraftError::NotFound(id.to_string()))
    }

    /// Appends a child of `draft_id` carrying `content`, unless `content` hashes
    /// the same as the current record. The store assigns the version number.
    pub async fn create_version_if_changed(
        &self,
        draft_id: Uuid,
        content: Value,
        metadata: Value,
        owner_id: Uuid,
        origin_source: OriginSource,
    ) -> Result<VersionOutcome, DraftError> {
        let current = self.get_version(draft_id, owner_id).await?;

        let new_hash = content_hash(&content);
        if new_hash == current.content_hash {
            debug!("Draft {draft_id} content unchanged, skipping version");
            return Ok(VersionOutcome::Unchanged {
                current_id: current.id,
            });
        }

        let version = self
            .store
            .create(NewDraftVersion {
                owner_id,
                name: current.name,
                parent_id: Some(current.id),
                origin_source,
                template_id: current.template_id,
                content,
                metadata,
                content_hash: new_hash,
            })
            .await?;

        info!(
            "Draft {} v{} created from {} ({})",
            version.id, version.version_number, draft_id, origin_source
        );
        Ok(VersionOutcome::Created { version })
    }

    /// Updates display fields and metadata without creating a version.
    pub async fn update_draft_in_place(
        &self,
        id: Uuid,
        patch: DraftPatch,
        owner_id: Uuid,
    ) -> Result<DraftVersion, DraftError> {
        if !self.store.update_fields(id, owner_id, &patch).await? {
            return Err(DraftError::NotFound(id.to_string()));
        }
        self.get_version(id, owner_id).await
    }
}

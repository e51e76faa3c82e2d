//! In-process store with the same contract as the Postgres adapter.
//! Backs `DRAFT_STORE=memory` and the engine tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::drafts::store::{Deactivation, DraftStore, StoreError};
use crate::models::draft::{DraftPatch, DraftVersion, NewDraftVersion};

struct StoredVersion {
    root_id: Uuid,
    version: DraftVersion,
}

#[derive(Default)]
pub struct MemoryDraftStore {
    rows: RwLock<Vec<StoredVersion>>,
    fail_writes: AtomicBool,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    /// Makes every subsequent write fail with `StoreError::Unavailable`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

fn root_of(rows: &[StoredVersion], id: Uuid, owner_id: Uuid) -> Option<Uuid> {
    rows.iter()
        .find(|r| r.version.id == id && r.version.owner_id == owner_id)
        .map(|r| r.root_id)
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn create(&self, new: NewDraftVersion) -> Result<DraftVersion, StoreError> {
        self.check_writable()?;
        // Numbering happens under the write lock, so appends are serialized.
        let mut rows = self.rows.write().await;

        let id = Uuid::new_v4();
        let (root_id, version_number) = match new.parent_id {
            None => (id, 1),
            Some(parent_id) => {
                let root_id = root_of(&rows, parent_id, new.owner_id)
                    .ok_or(StoreError::MissingParent(parent_id))?;
                let max = rows
                    .iter()
                    .filter(|r| r.root_id == root_id)
                    .map(|r| r.version.version_number)
                    .max()
                    .unwrap_or(0);
                (root_id, max + 1)
            }
        };

        let now = Utc::now();
        let version = DraftVersion {
            id,
            owner_id: new.owner_id,
            name: new.name,
            version_number,
            is_active: true,
            parent_id: new.parent_id,
            origin_source: new.origin_source,
            template_id: new.template_id,
            content: new.content,
            metadata: new.metadata,
            content_hash: new.content_hash,
            created_at: now,
            updated_at: now,
        };
        rows.push(StoredVersion {
            root_id,
            version: version.clone(),
        });
        Ok(version)
    }

    async fn fetch_by_id(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<DraftVersion>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|r| r.version.id == id && r.version.owner_id == owner_id)
            .map(|r| r.version.clone()))
    }

    async fn fetch_family(
        &self,
        any_member_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<DraftVersion>, StoreError> {
        let rows = self.rows.read().await;
        let Some(root_id) = root_of(&rows, any_member_id, owner_id) else {
            return Ok(Vec::new());
        };
        let mut family: Vec<DraftVersion> = rows
            .iter()
            .filter(|r| r.root_id == root_id && r.version.owner_id == owner_id)
            .map(|r| r.version.clone())
            .collect();
        family.sort_by_key(|v| v.version_number);
        Ok(family)
    }

    async fn fetch_active_head(
        &self,
        root_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<DraftVersion>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|r| {
                r.root_id == root_id && r.version.owner_id == owner_id && r.version.is_active
            })
            .max_by_key(|r| r.version.version_number)
            .map(|r| r.version.clone()))
    }

    async fn update_fields(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: &DraftPatch,
    ) -> Result<bool, StoreError> {
        self.check_writable()?;
        let mut rows = self.rows.write().await;
        let Some(row) = rows
            .iter_mut()
            .find(|r| r.version.id == id && r.version.owner_id == owner_id)
        else {
            return Ok(false);
        };
        if let Some(name) = &patch.name {
            row.version.name = name.clone();
        }
        if let Some(template_id) = patch.template_id {
            row.version.template_id = template_id;
        }
        if let Some(metadata) = &patch.metadata {
            row.version.metadata = metadata.clone();
        }
        row.version.updated_at = Utc::now();
        Ok(true)
    }

    async fn deactivate_unless_last(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Deactivation, StoreError> {
        self.check_writable()?;
        // Count and flip under one write lock.
        let mut rows = self.rows.write().await;
        let Some(pos) = rows
            .iter()
            .position(|r| r.version.id == id && r.version.owner_id == owner_id)
        else {
            return Ok(Deactivation::NotFound);
        };
        if !rows[pos].version.is_active {
            return Ok(Deactivation::AlreadyInactive);
        }

        let root_id = rows[pos].root_id;
        let active = rows
            .iter()
            .filter(|r| {
                r.root_id == root_id && r.version.owner_id == owner_id && r.version.is_active
            })
            .count();
        if active <= 1 {
            return Ok(Deactivation::LastActive);
        }

        rows[pos].version.is_active = false;
        Ok(Deactivation::Deactivated)
    }

    async fn count_active(&self, root_id: Uuid, owner_id: Uuid) -> Result<i64, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|r| {
                r.root_id == root_id && r.version.owner_id == owner_id && r.version.is_active
            })
            .count() as i64)
    }
}

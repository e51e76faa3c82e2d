//! Version store adapter — the only I/O boundary of the draft versioning core.
//!
//! Every query is scoped by owner. Families are located through the `root_id`
//! column materialized on each row, and `version_number` is assigned inside the
//! INSERT itself, guarded by `UNIQUE (root_id, version_number)`.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::draft::{DraftPatch, DraftVersion, NewDraftVersion};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("version append kept conflicting after {attempts} attempts")]
    AppendConflict { attempts: u32 },

    #[error("parent version {0} does not exist")]
    MissingParent(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result of a guarded tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deactivation {
    Deactivated,
    AlreadyInactive,
    LastActive,
    NotFound,
}

/// Persistence contract required by the versioning engine.
///
/// Carried in `AppState` as `Arc<dyn DraftStore>`.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Inserts a version. Assigns `id`, timestamps and the next family-wide
    /// `version_number` (1 for a root).
    async fn create(&self, new: NewDraftVersion) -> Result<DraftVersion, StoreError>;

    async fn fetch_by_id(&self, id: Uuid, owner_id: Uuid)
        -> Result<Option<DraftVersion>, StoreError>;

    /// All members of the family containing `any_member_id`, ascending by
    /// `version_number`, tombstoned rows included. Empty if the id is unknown.
    async fn fetch_family(
        &self,
        any_member_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<DraftVersion>, StoreError>;

    /// Highest-numbered active version of the family rooted at `root_id`.
    async fn fetch_active_head(
        &self,
        root_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<DraftVersion>, StoreError>;

    /// Applies a non-content patch and bumps `updated_at`.
    /// Returns false when no row matched.
    async fn update_fields(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: &DraftPatch,
    ) -> Result<bool, StoreError>;

    /// Tombstones `id` unless it is the last active version of its family.
    /// The check and the flip are one atomic step; only `is_active` changes.
    async fn deactivate_unless_last(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Deactivation, StoreError>;

    async fn count_active(&self, root_id: Uuid, owner_id: Uuid) -> Result<i64, StoreError>;
}

/// Column list shared by every SELECT / RETURNING.
const DRAFT_COLUMNS: &str = "id, owner_id, name, version_number, is_active, parent_id, \
    origin_source, template_id, content, metadata, content_hash, created_at, updated_at";

/// Postgres-backed store.
pub struct PgDraftStore {
    pool: PgPool,
    max_append_attempts: u32,
}

impl PgDraftStore {
    pub fn new(pool: PgPool, max_append_attempts: u32) -> Self {
        Self {
            pool,
            max_append_attempts: max_append_attempts.max(1),
        }
    }

    async fn insert_root(&self, new: &NewDraftVersion) -> Result<DraftVersion, sqlx::Error> {
        let id = Uuid::new_v4();
        let query = format!(
            "INSERT INTO draft_versions
                (id, owner_id, root_id, parent_id, name, version_number, is_active,
                 origin_source, template_id, content, metadata, content_hash)
             VALUES ($1, $2, $1, NULL, $3, 1, TRUE, $4, $5, $6, $7, $8)
             RETURNING {DRAFT_COLUMNS}"
        );
        sqlx::query_as::<_, DraftVersion>(&query)
            .bind(id)
            .bind(new.owner_id)
            .bind(&new.name)
            .bind(new.origin_source.as_str())
            .bind(new.template_id)
            .bind(&new.content)
            .bind(&new.metadata)
            .bind(&new.content_hash)
            .fetch_one(&self.pool)
            .await
    }

    /// Appends below `parent_id`, numbering from the family's current maximum.
    async fn insert_child(
        &self,
        parent_id: Uuid,
        new: &NewDraftVersion,
    ) -> Result<Option<DraftVersion>, sqlx::Error> {
        let id = Uuid::new_v4();
        let query = format!(
            "INSERT INTO draft_versions
                (id, owner_id, root_id, parent_id, name, version_number, is_active,
                 origin_source, template_id, content, metadata, content_hash)
             SELECT $1, p.owner_id, p.root_id, p.id, $4,
                    (SELECT COALESCE(MAX(v.version_number), 0) + 1
                     FROM draft_versions v WHERE v.root_id = p.root_id),
                    TRUE, $5, $6, $7, $8, $9
             FROM draft_versions p
             WHERE p.id = $2 AND p.owner_id = $3
             RETURNING {DRAFT_COLUMNS}"
        );
        sqlx::query_as::<_, DraftVersion>(&query)
            .bind(id)
            .bind(parent_id)
            .bind(new.owner_id)
            .bind(&new.name)
            .bind(new.origin_source.as_str())
            .bind(new.template_id)
            .bind(&new.content)
            .bind(&new.metadata)
            .bind(&new.content_hash)
            .fetch_optional(&self.pool)
            .await
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl DraftStore for PgDraftStore {
    async fn create(&self, new: NewDraftVersion) -> Result<DraftVersion, StoreError> {
        let Some(parent_id) = new.parent_id else {
            return Ok(self.insert_root(&new).await?);
        };

        for attempt in 1..=self.max_append_attempts {
            match self.insert_child(parent_id, &new).await {
                Ok(Some(row)) => return Ok(row),
                Ok(None) => return Err(StoreError::MissingParent(parent_id)),
                Err(e) if is_unique_violation(&e) => {
                    warn!("Version number race under {parent_id} (attempt {attempt}), retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::AppendConflict {
            attempts: self.max_append_attempts,
        })
    }

    async fn fetch_by_id(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<DraftVersion>, StoreError> {
        let query =
            format!("SELECT {DRAFT_COLUMNS} FROM draft_versions WHERE id = $1 AND owner_id = $2");
        Ok(sqlx::query_as::<_, DraftVersion>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn fetch_family(
        &self,
        any_member_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<DraftVersion>, StoreError> {
        let query = format!(
            "SELECT {DRAFT_COLUMNS} FROM draft_versions
             WHERE owner_id = $2
               AND root_id = (SELECT root_id FROM draft_versions WHERE id = $1 AND owner_id = $2)
             ORDER BY version_number ASC"
        );
        Ok(sqlx::query_as::<_, DraftVersion>(&query)
            .bind(any_member_id)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn fetch_active_head(
        &self,
        root_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<DraftVersion>, StoreError> {
        let query = format!(
            "SELECT {DRAFT_COLUMNS} FROM draft_versions
             WHERE root_id = $1 AND owner_id = $2 AND is_active
             ORDER BY version_number DESC
             LIMIT 1"
        );
        Ok(sqlx::query_as::<_, DraftVersion>(&query)
            .bind(root_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: &DraftPatch,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE draft_versions SET
                name = COALESCE($3, name),
                template_id = CASE WHEN $4 THEN $5 ELSE template_id END,
                metadata = COALESCE($6, metadata),
                updated_at = NOW()
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .bind(patch.name.as_deref())
        .bind(patch.template_id.is_some())
        .bind(patch.template_id.flatten())
        .bind(patch.metadata.as_ref())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_unless_last(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Deactivation, StoreError> {
        let mut tx = self.pool.begin().await?;

        let root_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT root_id FROM draft_versions WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(root_id) = root_id else {
            return Ok(Deactivation::NotFound);
        };

        // Locks the whole family so concurrent deletes serialize on the count.
        let family: Vec<(Uuid, bool)> = sqlx::query_as(
            "SELECT id, is_active FROM draft_versions
             WHERE root_id = $1 AND owner_id = $2
             FOR UPDATE",
        )
        .bind(root_id)
        .bind(owner_id)
        .fetch_all(&mut *tx)
        .await?;

        let target_active = family.iter().any(|(v, active)| *v == id && *active);
        if !target_active {
            return Ok(Deactivation::AlreadyInactive);
        }
        if family.iter().filter(|(_, active)| *active).count() <= 1 {
            return Ok(Deactivation::LastActive);
        }

        sqlx::query("UPDATE draft_versions SET is_active = FALSE WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Deactivation::Deactivated)
    }

    async fn count_active(&self, root_id: Uuid, owner_id: Uuid) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM draft_versions
             WHERE root_id = $1 AND owner_id = $2 AND is_active",
        )
        .bind(root_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?)
    }
}

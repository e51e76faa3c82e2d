//! Lineage resolution: root, head and ordered history of a draft family.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::drafts::errors::{DraftError, Invariant};
use crate::drafts::DraftService;
use crate::models::draft::DraftVersion;

/// Walks `parent_id` links inside `family` from `id` up to the root.
pub fn walk_to_root(family: &[DraftVersion], id: Uuid) -> Result<Uuid, DraftError> {
    let by_id: HashMap<Uuid, &DraftVersion> = family.iter().map(|v| (v.id, v)).collect();
    let mut seen = HashSet::new();
    let mut current = by_id
        .get(&id)
        .copied()
        .ok_or_else(|| DraftError::NotFound(id.to_string()))?;

    while let Some(parent_id) = current.parent_id {
        if !seen.insert(current.id) {
            return Err(DraftError::InvariantViolation(Invariant::BrokenLineage));
        }
        current = by_id
            .get(&parent_id)
            .copied()
            .ok_or(DraftError::InvariantViolation(Invariant::BrokenLineage))?;
    }
    Ok(current.id)
}

impl DraftService {
    /// Full family of any member, ascending by version number, tombstones included.
    pub async fn get_version_history(
        &self,
        any_member_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<DraftVersion>, DraftError> {
        let family = self.store.fetch_family(any_member_id, owner_id).await?;
        if family.is_empty() {
            return Err(DraftError::NotFound(any_member_id.to_string()));
        }
        Ok(family)
    }

    pub async fn resolve_root(&self, id: Uuid, owner_id: Uuid) -> Result<Uuid, DraftError> {
        let family = self.get_version_history(id, owner_id).await?;
        walk_to_root(&family, id)
    }

    /// Active version with the greatest version number, if any survives.
    pub async fn resolve_head(
        &self,
        root_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<DraftVersion>, DraftError> {
        Ok(self.store.fetch_active_head(root_id, owner_id).await?)
    }

    pub async fn get_head(
        &self,
        any_member_id: Uuid,
        owner_id: Uuid,
    ) -> Result<DraftVersion, DraftError> {
        let root_id = self.resolve_root(any_member_id, owner_id).await?;
        self.resolve_head(root_id, owner_id)
            .await?
            .ok_or(DraftError::InvariantViolation(Invariant::NoActiveHead))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafts::test_support::{append, sample, service};
    use chrono::Utc;
    use serde_json::json;

    fn version(id: Uuid, parent_id: Option<Uuid>, number: i32) -> DraftVersion {
        DraftVersion {
            id,
            owner_id: Uuid::nil(),
            name: "Resume".to_string(),
            version_number: number,
            is_active: true,
            parent_id,
            origin_source: Default::default(),
            template_id: None,
            content: json!({}),
            metadata: json!({}),
            content_hash: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_walk_follows_parents_to_root() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let family = vec![version(a, None, 1), version(b, Some(a), 2), version(c, Some(b), 3)];
        assert_eq!(walk_to_root(&family, c).unwrap(), a);
        assert_eq!(walk_to_root(&family, a).unwrap(), a);
    }

    #[test]
    fn test_walk_detects_cycle() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let family = vec![version(a, Some(b), 1), version(b, Some(a), 2)];
        assert!(matches!(
            walk_to_root(&family, a),
            Err(DraftError::InvariantViolation(Invariant::BrokenLineage))
        ));
    }

    #[test]
    fn test_walk_detects_dangling_parent() {
        let a = Uuid::new_v4();
        let family = vec![version(a, Some(Uuid::new_v4()), 2)];
        assert!(matches!(
            walk_to_root(&family, a),
            Err(DraftError::InvariantViolation(Invariant::BrokenLineage))
        ));
    }

    #[tokio::test]
    async fn test_history_strictly_ascending_with_root_first() {
        let (svc, owner) = service();
        let root = svc.create_draft(sample(owner, json!({"summary": "A"}))).await.unwrap();
        let v2 = append(&svc, root.id, json!({"summary": "B"}), owner).await;
        append(&svc, v2.id, json!({"summary": "C"}), owner).await;

        let history = svc.get_version_history(v2.id, owner).await.unwrap();
        let numbers: Vec<i32> = history.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(history.windows(2).all(|w| w[0].version_number < w[1].version_number));
        assert_eq!(history[0].version_number, 1);
        assert!(history[0].parent_id.is_none());
    }

    #[tokio::test]
    async fn test_history_includes_tombstoned_versions() {
        let (svc, owner) = service();
        let root = svc.create_draft(sample(owner, json!({"summary": "A"}))).await.unwrap();
        append(&svc, root.id, json!({"summary": "B"}), owner).await;
        svc.delete_version(root.id, owner).await.unwrap();

        let history = svc.get_version_history(root.id, owner).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].is_active);
    }

    #[tokio::test]
    async fn test_head_skips_tombstoned_latest() {
        let (svc, owner) = service();
        let root = svc.create_draft(sample(owner, json!({"summary": "A"}))).await.unwrap();
        let v2 = append(&svc, root.id, json!({"summary": "B"}), owner).await;
        assert_eq!(svc.get_head(root.id, owner).await.unwrap().id, v2.id);

        svc.delete_version(v2.id, owner).await.unwrap();
        assert_eq!(svc.get_head(v2.id, owner).await.unwrap().id, root.id);
    }

    #[tokio::test]
    async fn test_history_of_unknown_id_is_not_found() {
        let (svc, owner) = service();
        assert!(matches!(
            svc.get_version_history(Uuid::new_v4(), owner).await,
            Err(DraftError::NotFound(_))
        ));
    }
}

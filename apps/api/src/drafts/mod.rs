// Draft versioning: content-hashed, append-only versions of structured documents.
// All persistence goes through the DraftStore trait; nothing here holds state
// between calls.

pub mod compare;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod hashing;
pub mod lineage;
pub mod memory;
pub mod restore;
pub mod store;

use std::sync::Arc;

use crate::drafts::store::DraftStore;

/// Entry point for every versioning operation. Cheap to clone.
#[derive(Clone)]
pub struct DraftService {
    store: Arc<dyn DraftStore>,
}

impl DraftService {
    pub fn new(store: Arc<dyn DraftStore>) -> Self {
        Self { store }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::drafts::engine::{NewDraft, VersionOutcome};
    use crate::drafts::memory::MemoryDraftStore;
    use crate::drafts::DraftService;
    use crate::models::draft::{DraftVersion, OriginSource};

    impl VersionOutcome {
        pub fn created(self) -> Option<DraftVersion> {
            match self {
                VersionOutcome::Created { version } => Some(version),
                VersionOutcome::Unchanged { .. } => None,
            }
        }
    }

    pub fn service_with_store() -> (DraftService, Arc<MemoryDraftStore>, Uuid) {
        let store = Arc::new(MemoryDraftStore::new());
        (DraftService::new(store.clone()), store, Uuid::new_v4())
    }

    pub fn service() -> (DraftService, Uuid) {
        let (svc, _, owner) = service_with_store();
        (svc, owner)
    }

    pub fn sample(owner_id: Uuid, content: Value) -> NewDraft {
        NewDraft {
            owner_id,
            name: "Backend resume".to_string(),
            template_id: Some(Uuid::new_v4()),
            content,
            metadata: json!({}),
            origin_source: OriginSource::Manual,
        }
    }

    /// Appends `content` below `from`, panicking if nothing was written.
    pub async fn append(
        svc: &DraftService,
        from: Uuid,
        content: Value,
        owner_id: Uuid,
    ) -> DraftVersion {
        svc.create_version_if_changed(from, content, json!({}), owner_id, OriginSource::Manual)
            .await
            .unwrap()
            .created()
            .expect("content should differ")
    }
}

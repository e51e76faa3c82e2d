use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// How a version came into existence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OriginSource {
    #[default]
    Manual,
    Ai,
    Restore,
    Import,
}

impl OriginSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginSource::Manual => "manual",
            OriginSource::Ai => "ai",
            OriginSource::Restore => "restore",
            OriginSource::Import => "import",
        }
    }
}

impl fmt::Display for OriginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown origin source '{0}'")]
pub struct UnknownOriginSource(pub String);

impl TryFrom<String> for OriginSource {
    type Error = UnknownOriginSource;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "manual" => Ok(OriginSource::Manual),
            "ai" => Ok(OriginSource::Ai),
            "restore" => Ok(OriginSource::Restore),
            "import" => Ok(OriginSource::Import),
            _ => Err(UnknownOriginSource(value)),
        }
    }
}

/// One snapshot of a draft document. `content` is never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DraftVersion {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub version_number: i32,
    pub is_active: bool,
    pub parent_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub origin_source: OriginSource,
    pub template_id: Option<Uuid>,
    pub content: Value,
    pub metadata: Value,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the engine when appending a version.
/// `id`, `version_number` and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDraftVersion {
    pub owner_id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub origin_source: OriginSource,
    pub template_id: Option<Uuid>,
    pub content: Value,
    pub metadata: Value,
    pub content_hash: String,
}

/// Non-content fields that may change in place.
///
/// `template_id` uses `Option<Option<Uuid>>`: absent keeps the template,
/// `null` clears it, a value replaces it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub template_id: Option<Option<Uuid>>,
    pub metadata: Option<Value>,
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl DraftPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.template_id.is_none() && self.metadata.is_none()
    }
}

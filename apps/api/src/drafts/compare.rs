//! Structured diff between two draft versions.
//!
//! List sections are matched item by item: by the item's `id` field when it has
//! one, otherwise by the canonical hash of the whole item. Matched ids whose
//! content differs are reported as modified.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::drafts::errors::DraftError;
use crate::drafts::hashing::{canonicalize, content_hash};
use crate::drafts::DraftService;
use crate::models::draft::DraftVersion;

const LIST_SECTIONS: [&str; 3] = ["experience", "education", "projects"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryChange {
    pub old: Option<String>,
    pub new: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkillsDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionDiff {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

impl SectionDiff {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.modified == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionDiff {
    pub old_version_id: Uuid,
    pub new_version_id: Uuid,
    pub old_version_number: i32,
    pub new_version_number: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryChange>,
    pub skills: SkillsDiff,
    pub experience: SectionDiff,
    pub education: SectionDiff,
    pub projects: SectionDiff,
    /// Top-level content keys whose value differs, free-form fields included.
    pub changed_fields: Vec<String>,
}

impl VersionDiff {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.skills.added.is_empty()
            && self.skills.removed.is_empty()
            && self.experience.is_empty()
            && self.education.is_empty()
            && self.projects.is_empty()
            && self.changed_fields.is_empty()
    }
}

impl DraftService {
    /// Diffs two versions owned by `owner_id`. The versions may belong to
    /// different families.
    pub async fn compare_versions(
        &self,
        old_id: Uuid,
        new_id: Uuid,
        owner_id: Uuid,
    ) -> Result<VersionDiff, DraftError> {
        let (old, new) = tokio::try_join!(
            self.get_version(old_id, owner_id),
            self.get_version(new_id, owner_id)
        )?;
        let diff = diff_versions(&old, &new)?;
        debug!(
            "Compared {old_id} with {new_id}: {}",
            if diff.is_empty() { "identical" } else { "changed" }
        );
        Ok(diff)
    }
}

pub fn diff_versions(old: &DraftVersion, new: &DraftVersion) -> Result<VersionDiff, DraftError> {
    let old_doc = as_document(old)?;
    let new_doc = as_document(new)?;

    let summary = {
        let before = text_field(old_doc, "summary");
        let after = text_field(new_doc, "summary");
        (before != after).then(|| SummaryChange {
            old: before.map(str::to_string),
            new: after.map(str::to_string),
        })
    };

    let [experience, education, projects] = LIST_SECTIONS
        .map(|section| diff_section(list_field(old_doc, section), list_field(new_doc, section)));

    Ok(VersionDiff {
        old_version_id: old.id,
        new_version_id: new.id,
        old_version_number: old.version_number,
        new_version_number: new.version_number,
        summary,
        skills: diff_skills(&string_list(old_doc, "skills"), &string_list(new_doc, "skills")),
        experience,
        education,
        projects,
        changed_fields: changed_fields(old_doc, new_doc),
    })
}

fn as_document(version: &DraftVersion) -> Result<&Map<String, Value>, DraftError> {
    version.content.as_object().ok_or_else(|| {
        DraftError::ComparisonInput(format!(
            "content of version {} is not a structured document",
            version.id
        ))
    })
}

fn text_field<'a>(doc: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str)
}

fn list_field<'a>(doc: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    doc.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn string_list(doc: &Map<String, Value>, key: &str) -> Vec<String> {
    list_field(doc, key)
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// Set differences, in the order the skills appear in their own list.
fn diff_skills(old: &[String], new: &[String]) -> SkillsDiff {
    let old_set: BTreeSet<&String> = old.iter().collect();
    let new_set: BTreeSet<&String> = new.iter().collect();

    let mut seen = BTreeSet::new();
    let added = new
        .iter()
        .filter(|s| !old_set.contains(s) && seen.insert(*s))
        .cloned()
        .collect();
    seen.clear();
    let removed = old
        .iter()
        .filter(|s| !new_set.contains(s) && seen.insert(*s))
        .cloned()
        .collect();

    SkillsDiff { added, removed }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ItemKey {
    Id(String),
    Content(String),
}

fn item_key(item: &Value) -> ItemKey {
    match item.get("id") {
        Some(Value::String(id)) => ItemKey::Id(id.clone()),
        Some(Value::Number(id)) => ItemKey::Id(id.to_string()),
        _ => ItemKey::Content(content_hash(item)),
    }
}

/// Groups item hashes by key, keeping list order within a key.
fn index_items(items: &[Value]) -> BTreeMap<ItemKey, Vec<String>> {
    let mut index: BTreeMap<ItemKey, Vec<String>> = BTreeMap::new();
    for item in items {
        index.entry(item_key(item)).or_default().push(content_hash(item));
    }
    index
}

fn diff_section(old: &[Value], new: &[Value]) -> SectionDiff {
    let old_index = index_items(old);
    let new_index = index_items(new);
    let keys: BTreeSet<&ItemKey> = old_index.keys().chain(new_index.keys()).collect();

    let mut diff = SectionDiff::default();
    for key in keys {
        let before = old_index.get(key).map(Vec::as_slice).unwrap_or(&[]);
        let after = new_index.get(key).map(Vec::as_slice).unwrap_or(&[]);
        let matched = before.len().min(after.len());

        diff.added += after.len() - matched;
        diff.removed += before.len() - matched;
        diff.modified += before
            .iter()
            .zip(after)
            .filter(|(b, a)| b != a)
            .count();
    }
    diff
}

fn changed_fields(old: &Map<String, Value>, new: &Map<String, Value>) -> Vec<String> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|key| {
            let before = old.get(*key).map(canonicalize);
            let after = new.get(*key).map(canonicalize);
            before != after
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafts::test_support::{append, sample, service};
    use serde_json::json;

    fn resume() -> Value {
        json!({
            "summary": "Backend engineer",
            "skills": ["rust", "postgres", "kafka"],
            "experience": [
                {"id": "exp-1", "company": "Acme", "role": "SRE"},
                {"id": "exp-2", "company": "Globex", "role": "Engineer"}
            ],
            "education": [{"institution": "MIT", "degree": "BS"}],
            "projects": []
        })
    }

    #[tokio::test]
    async fn test_self_diff_is_empty() {
        let (svc, owner) = service();
        let v = svc.create_draft(sample(owner, resume())).await.unwrap();

        let diff = svc.compare_versions(v.id, v.id, owner).await.unwrap();
        assert!(diff.is_empty());
        assert!(diff.summary.is_none());
        assert!(diff.skills.added.is_empty() && diff.skills.removed.is_empty());
        assert_eq!(diff.experience, SectionDiff::default());
        assert_eq!(diff.education, SectionDiff::default());
        assert_eq!(diff.projects, SectionDiff::default());
    }

    #[tokio::test]
    async fn test_summary_and_skills_changes() {
        let (svc, owner) = service();
        let v1 = svc.create_draft(sample(owner, resume())).await.unwrap();
        let mut edited = resume();
        edited["summary"] = json!("Platform engineer");
        edited["skills"] = json!(["rust", "kubernetes", "postgres"]);
        let v2 = append(&svc, v1.id, edited, owner).await;

        let diff = svc.compare_versions(v1.id, v2.id, owner).await.unwrap();
        assert_eq!(
            diff.summary,
            Some(SummaryChange {
                old: Some("Backend engineer".to_string()),
                new: Some("Platform engineer".to_string()),
            })
        );
        assert_eq!(diff.skills.added, vec!["kubernetes".to_string()]);
        assert_eq!(diff.skills.removed, vec!["kafka".to_string()]);
        assert_eq!(diff.changed_fields, vec!["skills".to_string(), "summary".to_string()]);
        assert_eq!(diff.old_version_number, 1);
        assert_eq!(diff.new_version_number, 2);
    }

    #[test]
    fn test_section_items_matched_by_id() {
        let old = vec![
            json!({"id": "exp-1", "role": "SRE"}),
            json!({"id": "exp-2", "role": "Engineer"}),
        ];
        let new = vec![
            json!({"id": "exp-2", "role": "Senior Engineer"}),
            json!({"id": "exp-3", "role": "Lead"}),
        ];
        assert_eq!(
            diff_section(&old, &new),
            SectionDiff {
                added: 1,
                removed: 1,
                modified: 1
            }
        );
    }

    #[test]
    fn test_section_reordering_is_not_a_change() {
        let old = vec![json!({"id": 1, "a": 1}), json!({"b": 2})];
        let new = vec![json!({"b": 2}), json!({"a": 1, "id": 1})];
        assert!(diff_section(&old, &new).is_empty());
    }

    #[test]
    fn test_section_without_ids_compares_as_multiset() {
        let old = vec![json!({"school": "MIT"}), json!({"school": "MIT"})];
        let new = vec![json!({"school": "MIT"}), json!({"school": "CMU"})];
        assert_eq!(
            diff_section(&old, &new),
            SectionDiff {
                added: 1,
                removed: 1,
                modified: 0
            }
        );
    }

    #[test]
    fn test_missing_sections_treated_as_empty() {
        let old: Vec<Value> = vec![];
        let new = vec![json!({"name": "templar"}), json!({"name": "drafts"})];
        assert_eq!(diff_section(&old, &new).added, 2);
        assert_eq!(diff_section(&new, &old).removed, 2);
    }

    #[test]
    fn test_duplicate_skills_reported_once() {
        let diff = diff_skills(
            &["go".to_string()],
            &["rust".to_string(), "rust".to_string(), "go".to_string()],
        );
        assert_eq!(diff.added, vec!["rust".to_string()]);
        assert!(diff.removed.is_empty());
    }

    #[tokio::test]
    async fn test_cross_family_comparison_allowed() {
        let (svc, owner) = service();
        let a = svc.create_draft(sample(owner, json!({"summary": "A"}))).await.unwrap();
        let b = svc.create_draft(sample(owner, json!({"summary": "B"}))).await.unwrap();

        let diff = svc.compare_versions(a.id, b.id, owner).await.unwrap();
        assert!(diff.summary.is_some());
    }

    #[tokio::test]
    async fn test_unresolved_id_is_not_found() {
        let (svc, owner) = service();
        let a = svc.create_draft(sample(owner, json!({"summary": "A"}))).await.unwrap();

        let err = svc.compare_versions(a.id, Uuid::new_v4(), owner).await.unwrap_err();
        assert!(matches!(err, DraftError::NotFound(_)));
        let err = svc.compare_versions(a.id, a.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DraftError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_non_document_content_rejected() {
        let (svc, owner) = service();
        let a = svc.create_draft(sample(owner, json!({"summary": "A"}))).await.unwrap();
        let b = svc.create_draft(sample(owner, json!(["not", "a", "document"]))).await.unwrap();

        let err = svc.compare_versions(a.id, b.id, owner).await.unwrap_err();
        assert!(matches!(err, DraftError::ComparisonInput(_)));
    }
}

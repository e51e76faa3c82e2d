use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::drafts::compare::VersionDiff;
use crate::drafts::engine::{NewDraft, VersionOutcome};
use crate::errors::AppError;
use crate::models::draft::{DraftPatch, DraftVersion, OriginSource};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct CreateDraftRequest {
    pub name: String,
    pub template_id: Option<Uuid>,
    pub content: Value,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(default)]
    pub origin_source: OriginSource,
}

#[derive(Deserialize)]
pub struct CreateVersionRequest {
    pub content: Value,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(default)]
    pub origin_source: OriginSource,
}

#[derive(Deserialize)]
pub struct CompareQuery {
    pub user_id: Uuid,
    pub old: Uuid,
    pub new: Uuid,
}

fn empty_object() -> Value {
    json!({})
}

fn outcome_response(outcome: VersionOutcome) -> (StatusCode, Json<VersionOutcome>) {
    let status = if outcome.is_unchanged() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(outcome))
}

/// POST /api/v1/drafts
pub async fn handle_create_draft(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    Json(req): Json<CreateDraftRequest>,
) -> Result<(StatusCode, Json<DraftVersion>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("Draft name must not be empty".to_string()));
    }
    let root = state
        .drafts
        .create_draft(NewDraft {
            owner_id: params.user_id,
            name: req.name,
            template_id: req.template_id,
            content: req.content,
            metadata: req.metadata,
            origin_source: req.origin_source,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(root)))
}

/// GET /api/v1/drafts/:id
pub async fn handle_get_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DraftVersion>, AppError> {
    Ok(Json(state.drafts.get_version(id, params.user_id).await?))
}

/// PATCH /api/v1/drafts/:id
pub async fn handle_update_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    Json(patch): Json<DraftPatch>,
) -> Result<Json<DraftVersion>, AppError> {
    if patch.is_empty() {
        return Err(AppError::Validation("Nothing to update".to_string()));
    }
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::Validation("Draft name must not be empty".to_string()));
    }
    let updated = state
        .drafts
        .update_draft_in_place(id, patch, params.user_id)
        .await?;
    Ok(Json(updated))
}

/// DELETE /api/v1/drafts/:id
pub async fn handle_delete_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    state.drafts.delete_version(id, params.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/drafts/:id/versions
pub async fn handle_create_version(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    Json(req): Json<CreateVersionRequest>,
) -> Result<(StatusCode, Json<VersionOutcome>), AppError> {
    let outcome = state
        .drafts
        .create_version_if_changed(id, req.content, req.metadata, params.user_id, req.origin_source)
        .await?;
    Ok(outcome_response(outcome))
}

/// GET /api/v1/drafts/:id/history
pub async fn handle_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<DraftVersion>>, AppError> {
    Ok(Json(state.drafts.get_version_history(id, params.user_id).await?))
}

/// GET /api/v1/drafts/:id/head
pub async fn handle_head(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DraftVersion>, AppError> {
    Ok(Json(state.drafts.get_head(id, params.user_id).await?))
}

/// POST /api/v1/drafts/:id/restore
pub async fn handle_restore(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<(StatusCode, Json<VersionOutcome>), AppError> {
    let outcome = state.drafts.restore_version(id, params.user_id).await?;
    Ok(outcome_response(outcome))
}

/// GET /api/v1/drafts/compare
pub async fn handle_compare(
    State(state): State<AppState>,
    Query(params): Query<CompareQuery>,
) -> Result<Json<VersionDiff>, AppError> {
    let diff = state
        .drafts
        .compare_versions(params.old, params.new, params.user_id)
        .await?;
    Ok(Json(diff))
}

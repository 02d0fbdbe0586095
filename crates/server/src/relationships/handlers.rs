//! Relationship Handlers

use affinity_common::{ListParams, Page, RelationType, RelationView, RelationshipItem, ToggleState};
use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::ListAnchor;
use crate::config::AppState;
use crate::core::{Ctx, Result};

/// POST /relationships/{type}/{object_id}/toggle
pub async fn toggle_relationship(
    State(state): State<AppState>,
    ctx: Ctx,
    Path((relation_type, object_id)): Path<(String, String)>,
) -> Result<Json<ToggleState>> {
    let relation_type: RelationType = relation_type.parse()?;
    let result = state
        .engine
        .toggle(ctx.user_id(), &object_id, relation_type)
        .await?;
    Ok(Json(result))
}

/// GET /relationships/{type}/{object_id}
pub async fn get_relationship(
    State(state): State<AppState>,
    ctx: Option<Ctx>,
    Path((relation_type, object_id)): Path<(String, String)>,
) -> Result<Json<RelationView>> {
    let relation_type: RelationType = relation_type.parse()?;
    let view = state
        .engine
        .read(ctx.as_ref().map(Ctx::user_id), &object_id, relation_type)
        .await?;
    Ok(Json(view))
}

/// GET /relationships/{type}/{object_id}/subjects - who holds the relation
pub async fn list_subjects(
    State(state): State<AppState>,
    Path((relation_type, object_id)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<RelationshipItem>>> {
    let relation_type: RelationType = relation_type.parse()?;
    let page = state
        .engine
        .list(ListAnchor::Object(object_id), relation_type, &params)
        .await?;
    Ok(Json(page))
}

/// GET /subjects/{subject_id}/relationships/{type} - what the subject holds it towards
pub async fn list_objects(
    State(state): State<AppState>,
    Path((subject_id, relation_type)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<RelationshipItem>>> {
    let relation_type: RelationType = relation_type.parse()?;
    let page = state
        .engine
        .list(ListAnchor::Subject(subject_id), relation_type, &params)
        .await?;
    Ok(Json(page))
}

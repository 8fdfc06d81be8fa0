//! HTTP handlers for rented equipment

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{EquipmentEntry, EquipmentExit, EquipmentStatus};

use crate::error::AppResult;
use crate::services::equipment::{EquipmentView, ToolFlagInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EquipmentQuery {
    pub status: Option<EquipmentStatus>,
}

pub async fn list_equipment(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
    Query(query): Query<EquipmentQuery>,
) -> AppResult<Json<Vec<EquipmentView>>> {
    let batches = state.equipment_service().list(site_id, query.status).await?;
    Ok(Json(batches))
}

/// Register a rented batch arriving on site
pub async fn register_entry(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
    Json(entry): Json<EquipmentEntry>,
) -> AppResult<(StatusCode, Json<EquipmentView>)> {
    let batch = state
        .equipment_service()
        .register_entry(site_id, entry)
        .await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

pub async fn get_equipment(
    State(state): State<AppState>,
    Path((site_id, equipment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<EquipmentView>> {
    let batch = state.equipment_service().get(site_id, equipment_id).await?;
    Ok(Json(batch))
}

/// Register the batch leaving the site
pub async fn register_exit(
    State(state): State<AppState>,
    Path((site_id, equipment_id)): Path<(Uuid, Uuid)>,
    Json(exit): Json<EquipmentExit>,
) -> AppResult<Json<EquipmentView>> {
    let batch = state
        .equipment_service()
        .register_exit(site_id, equipment_id, exit)
        .await?;
    Ok(Json(batch))
}

pub async fn set_tool_flag(
    State(state): State<AppState>,
    Path((site_id, equipment_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<ToolFlagInput>,
) -> AppResult<Json<EquipmentView>> {
    let batch = state
        .equipment_service()
        .set_tool_flag(site_id, equipment_id, input.is_tool)
        .await?;
    Ok(Json(batch))
}

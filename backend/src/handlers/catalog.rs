//! HTTP handlers for the material catalog

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use shared::CatalogItem;

use crate::error::AppResult;
use crate::services::catalog::CreateCatalogItemInput;
use crate::AppState;

pub async fn list_catalog(State(state): State<AppState>) -> AppResult<Json<Vec<CatalogItem>>> {
    let items = state.catalog_service().list().await?;
    Ok(Json(items))
}

pub async fn create_catalog_item(
    State(state): State<AppState>,
    Json(input): Json<CreateCatalogItemInput>,
) -> AppResult<(StatusCode, Json<CatalogItem>)> {
    let item = state.catalog_service().create(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_catalog_item(
    State(state): State<AppState>,
    Path(catalog_id): Path<Uuid>,
) -> AppResult<Json<CatalogItem>> {
    let item = state.catalog_service().get(catalog_id).await?;
    Ok(Json(item))
}

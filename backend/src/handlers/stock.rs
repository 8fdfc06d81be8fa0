//! HTTP handlers for site stock, movements and EPI withdrawals

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{
    BalanceDetailsUpdate, LedgerAudit, MovementEvent, PaginatedResponse, Pagination,
    StockItemView,
};

use crate::error::AppResult;
use crate::middleware::auth::STOCK_ADJUST_PERMISSION;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::stock::{
    AttachItemInput, EpiWithdrawalInput, MovementInput, MovementReceipt, QuantityAdjustment,
    SetQuantityInput,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List the stock of a site with availability and alert state
pub async fn list_stock(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockItemView>>> {
    let items = state.stock_service().list_items(site_id).await?;
    Ok(Json(items))
}

/// Attach a catalog item to a site
pub async fn attach_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(site_id): Path<Uuid>,
    Json(input): Json<AttachItemInput>,
) -> AppResult<(StatusCode, Json<StockItemView>)> {
    let item = state
        .stock_service()
        .attach(site_id, current_user.0.actor(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_stock_item(
    State(state): State<AppState>,
    Path((site_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StockItemView>> {
    let item = state.stock_service().get_item(site_id, item_id).await?;
    Ok(Json(item))
}

/// Edit descriptive fields; quantity is not accepted here
pub async fn update_stock_item(
    State(state): State<AppState>,
    Path((site_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<BalanceDetailsUpdate>,
) -> AppResult<Json<StockItemView>> {
    let item = state
        .stock_service()
        .update_details(site_id, item_id, input)
        .await?;
    Ok(Json(item))
}

pub async fn detach_stock_item(
    State(state): State<AppState>,
    Path((site_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state.stock_service().detach(site_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Movement history, newest first
pub async fn list_movements(
    State(state): State<AppState>,
    Path((site_id, item_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<MovementEvent>>> {
    let pagination = Pagination::from_query(query.page, query.per_page);
    let page = state
        .stock_service()
        .list_movements(site_id, item_id, pagination)
        .await?;
    Ok(Json(page))
}

/// Post an IN or OUT movement
pub async fn post_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((site_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<MovementInput>,
) -> AppResult<(StatusCode, Json<MovementReceipt>)> {
    let receipt = state
        .stock_service()
        .apply_movement(site_id, item_id, current_user.0.actor(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Administrative count correction
pub async fn set_quantity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((site_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<SetQuantityInput>,
) -> AppResult<Json<QuantityAdjustment>> {
    check_permission(&current_user.0, STOCK_ADJUST_PERMISSION)?;

    let adjustment = state
        .stock_service()
        .set_quantity(site_id, item_id, current_user.0.actor(), input)
        .await?;
    Ok(Json(adjustment))
}

pub async fn resync_stock_item(
    State(state): State<AppState>,
    Path((site_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StockItemView>> {
    let item = state
        .stock_service()
        .resync_from_catalog(site_id, item_id)
        .await?;
    Ok(Json(item))
}

/// Compare the stored balance with its replayed ledger
pub async fn audit_stock_item(
    State(state): State<AppState>,
    Path((site_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<LedgerAudit>> {
    let audit = state.stock_service().verify_ledger(site_id, item_id).await?;
    Ok(Json(audit))
}

pub async fn list_low_stock(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockItemView>>> {
    let items = state.stock_service().list_low_stock(site_id).await?;
    Ok(Json(items))
}

pub async fn list_epi_withdrawals(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
) -> AppResult<Json<Vec<MovementEvent>>> {
    let withdrawals = state.stock_service().list_epi_withdrawals(site_id).await?;
    Ok(Json(withdrawals))
}

pub async fn withdraw_epi(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
    Json(input): Json<EpiWithdrawalInput>,
) -> AppResult<(StatusCode, Json<MovementReceipt>)> {
    let receipt = state.stock_service().withdraw_epi(site_id, input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

//! Route definitions for the Site Stock API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Protected routes - material catalog
        .nest("/catalog", catalog_routes())
        // Protected routes - everything scoped to one site
        .nest("/sites/:site_id", site_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
        // Health check (public)
        .route("/health", get(handlers::health_check))
}

/// Catalog routes (protected)
fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_catalog).post(handlers::create_catalog_item),
        )
        .route("/:catalog_id", get(handlers::get_catalog_item))
}

/// Site routes (protected)
fn site_routes() -> Router<AppState> {
    Router::new()
        .nest("/stock", stock_routes())
        .route("/alerts/low-stock", get(handlers::list_low_stock))
        .route(
            "/epi-withdrawals",
            get(handlers::list_epi_withdrawals).post(handlers::withdraw_epi),
        )
        .nest("/loans", loan_routes())
        .route("/loanable-items", get(handlers::list_loanable_items))
        .nest("/equipment", equipment_routes())
        .route("/summary", get(handlers::get_site_summary))
        .route("/export/stock", get(handlers::export_stock))
        .route("/export/movements", get(handlers::export_movements))
        .route("/export/loans", get(handlers::export_loans))
}

/// Stock ledger routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stock).post(handlers::attach_item))
        .route(
            "/:item_id",
            get(handlers::get_stock_item)
                .put(handlers::update_stock_item)
                .delete(handlers::detach_stock_item),
        )
        .route(
            "/:item_id/movements",
            get(handlers::list_movements).post(handlers::post_movement),
        )
        .route("/:item_id/quantity", put(handlers::set_quantity))
        .route("/:item_id/resync", post(handlers::resync_stock_item))
        .route("/:item_id/audit", get(handlers::audit_stock_item))
}

/// Tool loan routes
fn loan_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_loans).post(handlers::create_loan))
        .route("/:loan_id", get(handlers::get_loan))
        .route("/:loan_id/return", post(handlers::return_loan))
}

/// Rented equipment routes
fn equipment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_equipment).post(handlers::register_entry),
        )
        .route("/:equipment_id", get(handlers::get_equipment))
        .route("/:equipment_id/exit", post(handlers::register_exit))
        .route("/:equipment_id/tool-flag", put(handlers::set_tool_flag))
}

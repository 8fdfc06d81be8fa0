//! Reporting handlers for the site summary and CSV export

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::reporting::SiteSummary;
use crate::AppState;

/// Get the dashboard figures of a site
pub async fn get_site_summary(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
) -> AppResult<Json<SiteSummary>> {
    let summary = state.reporting_service().site_summary(site_id).await?;
    Ok(Json(summary))
}

fn csv_attachment(filename: &str, csv: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    )
}

pub async fn export_stock(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let csv = state.reporting_service().export_stock_csv(site_id).await?;
    Ok(csv_attachment("stock.csv", csv))
}

pub async fn export_movements(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let csv = state.reporting_service().export_movements_csv(site_id).await?;
    Ok(csv_attachment("movements.csv", csv))
}

pub async fn export_loans(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let csv = state.reporting_service().export_loans_csv(site_id).await?;
    Ok(csv_attachment("loans.csv", csv))
}

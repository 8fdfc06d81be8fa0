//! HTTP handlers for tool loans

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{LoanRecord, LoanStatus, LoanableItem};

use crate::error::AppResult;
use crate::services::loan::{CreateLoanInput, ReturnLoanInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
}

pub async fn list_loans(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanRecord>>> {
    let loans = state.loan_service().list_loans(site_id, query.status).await?;
    Ok(Json(loans))
}

pub async fn create_loan(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
    Json(input): Json<CreateLoanInput>,
) -> AppResult<(StatusCode, Json<LoanRecord>)> {
    let loan = state.loan_service().create_loan(site_id, input).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

pub async fn get_loan(
    State(state): State<AppState>,
    Path((site_id, loan_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<LoanRecord>> {
    let loan = state.loan_service().get_loan(site_id, loan_id).await?;
    Ok(Json(loan))
}

/// Close a loan; an empty body returns it today
pub async fn return_loan(
    State(state): State<AppState>,
    Path((site_id, loan_id)): Path<(Uuid, Uuid)>,
    input: Option<Json<ReturnLoanInput>>,
) -> AppResult<Json<LoanRecord>> {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    let loan = state
        .loan_service()
        .return_loan(site_id, loan_id, input)
        .await?;
    Ok(Json(loan))
}

/// Tools that can currently be lent, owned and rented
pub async fn list_loanable_items(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
) -> AppResult<Json<Vec<LoanableItem>>> {
    let items = state.loan_service().list_loanable_items(site_id).await?;
    Ok(Json(items))
}

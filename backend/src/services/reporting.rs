//! Site summary and CSV export

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use shared::{EquipmentStatus, LoanStatus, StockItemView};

use crate::error::{AppError, AppResult};
use crate::services::StockService;
use crate::store::Store;

/// Dashboard figures for one site
#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub site_id: Uuid,
    pub item_count: usize,
    pub low_stock_count: usize,
    /// Σ quantity × average price
    pub total_stock_value: Decimal,
    pub open_loan_count: usize,
    pub active_equipment_count: usize,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct StockCsvRow<'a> {
    name: &'a str,
    category: &'a str,
    unit: &'a str,
    quantity: Decimal,
    committed: Decimal,
    available: Decimal,
    min_threshold: Decimal,
    low_stock: bool,
    average_price: Decimal,
    stock_value: Decimal,
}

impl<'a> From<&'a StockItemView> for StockCsvRow<'a> {
    fn from(view: &'a StockItemView) -> Self {
        StockCsvRow {
            name: &view.balance.name,
            category: &view.balance.category,
            unit: &view.balance.unit,
            quantity: view.balance.quantity,
            committed: view.committed,
            available: view.available,
            min_threshold: view.balance.min_threshold,
            low_stock: view.is_low_stock,
            average_price: view.balance.average_price,
            stock_value: view.balance.stock_value(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MovementCsvRow<'a> {
    date: NaiveDate,
    item: &'a str,
    movement_type: &'static str,
    category: &'static str,
    quantity: Decimal,
    unit_price: Option<Decimal>,
    reason: Option<&'a str>,
    actor: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct LoanCsvRow<'a> {
    item: &'a str,
    origin: &'static str,
    borrower: &'a str,
    quantity: Decimal,
    loan_date: NaiveDate,
    return_date: Option<NaiveDate>,
    status: &'static str,
    notes: Option<&'a str>,
}

#[derive(Clone)]
pub struct ReportingService {
    store: Arc<dyn Store>,
    stock: StockService,
}

impl ReportingService {
    pub fn new(store: Arc<dyn Store>, stock: StockService) -> Self {
        Self { store, stock }
    }

    pub async fn site_summary(&self, site_id: Uuid) -> AppResult<SiteSummary> {
        let items = self.stock.list_items(site_id).await?;
        let open_loans = self
            .store
            .list_loans(site_id, Some(LoanStatus::Open))
            .await?;
        let active_equipment = self
            .store
            .list_equipment(site_id, Some(EquipmentStatus::Active))
            .await?;

        Ok(SiteSummary {
            site_id,
            item_count: items.len(),
            low_stock_count: items.iter().filter(|i| i.is_low_stock).count(),
            total_stock_value: items.iter().map(|i| i.balance.stock_value()).sum(),
            open_loan_count: open_loans.len(),
            active_equipment_count: active_equipment.len(),
            generated_at: Utc::now(),
        })
    }

    /// Stock with availability and alert columns
    pub async fn export_stock_csv(&self, site_id: Uuid) -> AppResult<String> {
        let items = self.stock.list_items(site_id).await?;
        let rows: Vec<StockCsvRow> = items.iter().map(StockCsvRow::from).collect();
        Self::export_to_csv(&rows)
    }

    /// Every movement of the site, newest first
    pub async fn export_movements_csv(&self, site_id: Uuid) -> AppResult<String> {
        let balances = self.store.list_balances(site_id).await?;
        let events = self.store.list_site_movements(site_id, None).await?;

        let rows: Vec<MovementCsvRow> = events
            .iter()
            .map(|event| MovementCsvRow {
                date: event.movement_date,
                item: balances
                    .iter()
                    .find(|b| b.id == event.balance_id)
                    .map(|b| b.name.as_str())
                    .unwrap_or_default(),
                movement_type: event.movement_type.as_str(),
                category: event.category.as_str(),
                quantity: event.quantity,
                unit_price: event.unit_price,
                reason: event.reason.as_deref(),
                actor: event.actor_name.as_deref(),
            })
            .collect();
        Self::export_to_csv(&rows)
    }

    pub async fn export_loans_csv(&self, site_id: Uuid) -> AppResult<String> {
        let loans = self.store.list_loans(site_id, None).await?;
        let rows: Vec<LoanCsvRow> = loans
            .iter()
            .map(|loan| LoanCsvRow {
                item: &loan.item_name,
                origin: loan.item_origin.as_str(),
                borrower: &loan.borrower_name,
                quantity: loan.quantity,
                loan_date: loan.loan_date,
                return_date: loan.return_date,
                status: loan.status.as_str(),
                notes: loan.notes.as_deref(),
            })
            .collect();
        Self::export_to_csv(&rows)
    }

    /// Serialize rows as CSV with a header line
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let csv_data = String::from_utf8(
            wtr.into_inner()
                .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?,
        )
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
        Ok(csv_data)
    }
}

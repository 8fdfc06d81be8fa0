//! In-process store with the same atomicity guarantees as PostgreSQL
//!
//! One `RwLock` guards all tables, so every conditional write below runs its
//! check and its mutation under a single write guard.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::{
    committed_quantity, ensure_available, BalanceRecord, CatalogItem, EquipmentStatus, ItemOrigin,
    LoanRecord, LoanStatus, LoanTarget, MovementCategory, MovementEvent, MovementTotals,
    MovementType, Pagination, PlannedMovement, RentedEquipmentRecord, ToolFlag,
};

use super::{
    BalanceStore, CatalogStore, CommitOutcome, DetachOutcome, EquipmentStore, LoanStore,
};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    catalog: HashMap<Uuid, CatalogItem>,
    balances: HashMap<Uuid, BalanceRecord>,
    movements: Vec<MovementEvent>,
    loans: HashMap<Uuid, LoanRecord>,
    equipment: HashMap<Uuid, RentedEquipmentRecord>,
}

impl Tables {
    fn balance(&self, site_id: Uuid, balance_id: Uuid) -> Option<&BalanceRecord> {
        self.balances
            .get(&balance_id)
            .filter(|b| b.site_id == site_id)
    }

    fn equipment(&self, site_id: Uuid, equipment_id: Uuid) -> Option<&RentedEquipmentRecord> {
        self.equipment
            .get(&equipment_id)
            .filter(|e| e.site_id == site_id)
    }

    fn site_loans(&self, site_id: Uuid) -> impl Iterator<Item = &LoanRecord> {
        self.loans.values().filter(move |l| l.site_id == site_id)
    }
}

/// Newest first, matching the SQL `ORDER BY movement_date DESC, created_at DESC`
fn sort_newest_first(events: &mut [MovementEvent]) {
    events.sort_by(|a, b| {
        b.movement_date
            .cmp(&a.movement_date)
            .then(b.created_at.cmp(&a.created_at))
    });
}

/// Store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_catalog_item(&self, item: &CatalogItem) -> AppResult<()> {
        self.tables
            .write()
            .await
            .catalog
            .insert(item.id, item.clone());
        Ok(())
    }

    async fn find_catalog_item(&self, id: Uuid) -> AppResult<Option<CatalogItem>> {
        Ok(self.tables.read().await.catalog.get(&id).cloned())
    }

    async fn list_catalog_items(&self) -> AppResult<Vec<CatalogItem>> {
        let tables = self.tables.read().await;
        let mut items: Vec<CatalogItem> = tables.catalog.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}

#[async_trait]
impl BalanceStore for MemoryStore {
    async fn insert_balance(&self, balance: &BalanceRecord) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.balances.values().any(|b| {
            b.site_id == balance.site_id && b.catalog_ref_id == balance.catalog_ref_id
        });
        if duplicate {
            return Err(AppError::DuplicateAttachment(balance.name.clone()));
        }
        tables.balances.insert(balance.id, balance.clone());
        Ok(())
    }

    async fn find_balance(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
    ) -> AppResult<Option<BalanceRecord>> {
        Ok(self.tables.read().await.balance(site_id, balance_id).cloned())
    }

    async fn list_balances(&self, site_id: Uuid) -> AppResult<Vec<BalanceRecord>> {
        let tables = self.tables.read().await;
        let mut balances: Vec<BalanceRecord> = tables
            .balances
            .values()
            .filter(|b| b.site_id == site_id)
            .cloned()
            .collect();
        balances.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(balances)
    }

    async fn commit_movement(&self, plan: &PlannedMovement) -> AppResult<CommitOutcome> {
        let mut tables = self.tables.write().await;
        let Some(current) = tables.balances.get_mut(&plan.balance.id) else {
            return Ok(CommitOutcome::Conflict);
        };
        if current.version != plan.expected_version {
            return Ok(CommitOutcome::Conflict);
        }
        if plan.balance.quantity < Decimal::ZERO {
            return Err(AppError::Internal(
                "refusing to store a negative balance".to_string(),
            ));
        }

        *current = plan.balance.clone();
        tables.movements.push(plan.event.clone());
        Ok(CommitOutcome::Committed)
    }

    async fn update_balance_details(
        &self,
        expected_version: i64,
        balance: &BalanceRecord,
    ) -> AppResult<CommitOutcome> {
        let mut tables = self.tables.write().await;
        let Some(current) = tables.balances.get_mut(&balance.id) else {
            return Ok(CommitOutcome::Conflict);
        };
        if current.version != expected_version {
            return Ok(CommitOutcome::Conflict);
        }

        current.name = balance.name.clone();
        current.unit = balance.unit.clone();
        current.category = balance.category.clone();
        current.min_threshold = balance.min_threshold;
        current.average_price = balance.average_price;
        current.version = balance.version;
        current.updated_at = balance.updated_at;
        Ok(CommitOutcome::Committed)
    }

    async fn detach_balance(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<DetachOutcome> {
        let mut tables = self.tables.write().await;
        if tables.balance(site_id, balance_id).is_none() {
            return Ok(DetachOutcome::NotFound);
        }
        let target = LoanTarget::owned(balance_id);
        if committed_quantity(tables.site_loans(site_id), target) > Decimal::ZERO {
            return Ok(DetachOutcome::HasOpenLoans);
        }

        tables.balances.remove(&balance_id);
        tables.movements.retain(|m| m.balance_id != balance_id);
        Ok(DetachOutcome::Detached)
    }

    async fn list_movements(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<(Vec<MovementEvent>, u64)> {
        let tables = self.tables.read().await;
        let mut events: Vec<MovementEvent> = tables
            .movements
            .iter()
            .filter(|m| m.site_id == site_id && m.balance_id == balance_id)
            .cloned()
            .collect();
        sort_newest_first(&mut events);

        let total = events.len() as u64;
        let page = events
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(pagination.limit()).unwrap_or(usize::MAX))
            .collect();
        Ok((page, total))
    }

    async fn list_site_movements(
        &self,
        site_id: Uuid,
        category: Option<MovementCategory>,
    ) -> AppResult<Vec<MovementEvent>> {
        let tables = self.tables.read().await;
        let mut events: Vec<MovementEvent> = tables
            .movements
            .iter()
            .filter(|m| m.site_id == site_id)
            .filter(|m| category.map_or(true, |c| m.category == c))
            .cloned()
            .collect();
        sort_newest_first(&mut events);
        Ok(events)
    }

    async fn movement_totals(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<MovementTotals> {
        let tables = self.tables.read().await;
        let totals = tables
            .movements
            .iter()
            .filter(|m| m.site_id == site_id && m.balance_id == balance_id)
            .fold(MovementTotals::default(), |mut acc, m| {
                match m.movement_type {
                    MovementType::In => acc.total_in += m.quantity,
                    MovementType::Out => acc.total_out += m.quantity,
                }
                acc.movement_count += 1;
                acc
            });
        Ok(totals)
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn insert_loan_checked(&self, loan: &LoanRecord) -> AppResult<()> {
        let mut tables = self.tables.write().await;

        let capacity = match loan.item_origin {
            ItemOrigin::Owned => {
                tables
                    .balance(loan.site_id, loan.item_id)
                    .ok_or_else(|| AppError::NotFound("Stock item".to_string()))?
                    .quantity
            }
            ItemOrigin::Rented => {
                let batch = tables
                    .equipment(loan.site_id, loan.item_id)
                    .ok_or_else(|| AppError::NotFound("Rented equipment".to_string()))?;
                batch.ensure_accepts_loans()?;
                batch.quantity
            }
        };
        let committed = committed_quantity(tables.site_loans(loan.site_id), loan.target());
        ensure_available(capacity, committed, loan.quantity)?;

        tables.loans.insert(loan.id, loan.clone());
        Ok(())
    }

    async fn find_loan(&self, site_id: Uuid, loan_id: Uuid) -> AppResult<Option<LoanRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .loans
            .get(&loan_id)
            .filter(|l| l.site_id == site_id)
            .cloned())
    }

    async fn list_loans(
        &self,
        site_id: Uuid,
        status: Option<LoanStatus>,
    ) -> AppResult<Vec<LoanRecord>> {
        let tables = self.tables.read().await;
        let mut loans: Vec<LoanRecord> = tables
            .site_loans(site_id)
            .filter(|l| status.map_or(true, |s| l.status == s))
            .cloned()
            .collect();
        loans.sort_by(|a, b| {
            b.loan_date
                .cmp(&a.loan_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(loans)
    }

    async fn committed_quantity(&self, site_id: Uuid, target: LoanTarget) -> AppResult<Decimal> {
        let tables = self.tables.read().await;
        Ok(committed_quantity(tables.site_loans(site_id), target))
    }

    async fn committed_by_target(
        &self,
        site_id: Uuid,
    ) -> AppResult<HashMap<LoanTarget, Decimal>> {
        let tables = self.tables.read().await;
        let mut totals: HashMap<LoanTarget, Decimal> = HashMap::new();
        for loan in tables.site_loans(site_id).filter(|l| l.is_open()) {
            *totals.entry(loan.target()).or_insert(Decimal::ZERO) += loan.quantity;
        }
        Ok(totals)
    }

    async fn record_return(&self, loan: &LoanRecord) -> AppResult<CommitOutcome> {
        let mut tables = self.tables.write().await;
        match tables.loans.get_mut(&loan.id) {
            Some(current) if current.site_id == loan.site_id && current.is_open() => {
                current.status = loan.status;
                current.return_date = loan.return_date;
                current.return_notes = loan.return_notes.clone();
                Ok(CommitOutcome::Committed)
            }
            _ => Ok(CommitOutcome::Conflict),
        }
    }
}

#[async_trait]
impl EquipmentStore for MemoryStore {
    async fn insert_equipment(&self, record: &RentedEquipmentRecord) -> AppResult<()> {
        self.tables
            .write()
            .await
            .equipment
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn find_equipment(
        &self,
        site_id: Uuid,
        equipment_id: Uuid,
    ) -> AppResult<Option<RentedEquipmentRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .equipment(site_id, equipment_id)
            .cloned())
    }

    async fn list_equipment(
        &self,
        site_id: Uuid,
        status: Option<EquipmentStatus>,
    ) -> AppResult<Vec<RentedEquipmentRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<RentedEquipmentRecord> = tables
            .equipment
            .values()
            .filter(|e| e.site_id == site_id)
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.entry_date
                .cmp(&a.entry_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(records)
    }

    async fn record_exit(&self, record: &RentedEquipmentRecord) -> AppResult<CommitOutcome> {
        let mut tables = self.tables.write().await;
        match tables.equipment.get_mut(&record.id) {
            Some(current) if current.site_id == record.site_id && current.is_active() => {
                current.status = record.status;
                current.exit_date = record.exit_date;
                current.exit_photos = record.exit_photos.clone();
                current.updated_at = record.updated_at;
                Ok(CommitOutcome::Committed)
            }
            _ => Ok(CommitOutcome::Conflict),
        }
    }

    async fn update_tool_flag(
        &self,
        site_id: Uuid,
        equipment_id: Uuid,
        flag: ToolFlag,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.equipment.get_mut(&equipment_id) {
            Some(current) if current.site_id == site_id => {
                current.is_tool = flag;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

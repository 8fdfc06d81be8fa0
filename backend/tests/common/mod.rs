//! Shared fixtures for the ledger integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    Actor, BalanceRecord, CatalogItem, EquipmentEntry, EquipmentStatus, ItemOrigin, LoanRecord,
    LoanStatus, LoanTarget, MovementCategory, MovementEvent, MovementTotals, Pagination,
    PlannedMovement, RentedEquipmentRecord, StockItemView, ToolFlag,
};
use site_stock_backend::error::AppResult;
use site_stock_backend::services::catalog::CreateCatalogItemInput;
use site_stock_backend::services::loan::CreateLoanInput;
use site_stock_backend::services::stock::{AttachItemInput, MovementInput};
use site_stock_backend::services::{
    CatalogService, EquipmentService, LoanService, ReportingService, StockService,
};
use site_stock_backend::store::{
    BalanceStore, CatalogStore, CommitOutcome, DetachOutcome, EquipmentStore, LoanStore,
    MemoryStore, Store,
};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn storekeeper() -> Actor {
    Actor::new("u-42", "Almoxarife Silva")
}

/// One site on a fresh in-memory store with every service wired to it
pub struct Site {
    pub site_id: Uuid,
    pub store: Arc<dyn Store>,
    pub stock: StockService,
    pub loans: LoanService,
    pub equipment: EquipmentService,
    pub catalog: CatalogService,
    pub reporting: ReportingService,
}

impl Site {
    pub fn new() -> Self {
        Self::with_attempts(5)
    }

    pub fn with_attempts(max_attempts: u32) -> Self {
        Self::on_store(Arc::new(MemoryStore::new()), max_attempts)
    }

    /// Wire every service to a caller-supplied store
    pub fn on_store(store: Arc<dyn Store>, max_attempts: u32) -> Self {
        let stock = StockService::new(store.clone(), max_attempts);
        Self {
            site_id: Uuid::new_v4(),
            loans: LoanService::new(store.clone()),
            equipment: EquipmentService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            reporting: ReportingService::new(store.clone(), stock.clone()),
            stock,
            store,
        }
    }

    /// Create a catalog entry and attach it with opening stock
    pub async fn stock_item(
        &self,
        name: &str,
        category: &str,
        quantity: &str,
        min_threshold: &str,
    ) -> StockItemView {
        let catalog = self
            .catalog
            .create(CreateCatalogItemInput {
                name: name.to_string(),
                unit: "un".to_string(),
                category: category.to_string(),
                unit_value: Some(dec("10")),
            })
            .await
            .unwrap();

        self.stock
            .attach(
                self.site_id,
                storekeeper(),
                AttachItemInput {
                    catalog_ref_id: catalog.id,
                    min_threshold: Some(dec(min_threshold)),
                    initial_quantity: Some(dec(quantity)),
                },
            )
            .await
            .unwrap()
    }

    pub async fn quantity(&self, balance_id: Uuid) -> Decimal {
        self.stock
            .get_item(self.site_id, balance_id)
            .await
            .unwrap()
            .balance
            .quantity
    }
}

pub fn movement(movement_type: shared::MovementType, quantity: &str) -> MovementInput {
    MovementInput {
        movement_type,
        quantity: dec(quantity),
        reason: None,
        movement_date: None,
        unit_price: None,
    }
}

pub fn loan_of(origin: ItemOrigin, item_id: Uuid, borrower: &str, quantity: &str) -> CreateLoanInput {
    CreateLoanInput {
        item_origin: origin,
        item_id,
        borrower_name: borrower.to_string(),
        quantity: dec(quantity),
        loan_date: Some(date(2024, 3, 4)),
        notes: None,
    }
}

pub fn rented_batch(name: &str, category: &str, quantity: &str, is_tool: ToolFlag) -> EquipmentEntry {
    EquipmentEntry {
        name: name.to_string(),
        supplier: "Locadora Central".to_string(),
        category: category.to_string(),
        unit: "un".to_string(),
        quantity: dec(quantity),
        entry_date: date(2024, 3, 1),
        entry_photos: vec!["https://fotos.exemplo/entrada-1.jpg".to_string()],
        is_tool,
        notes: None,
    }
}

/// Memory store whose balance commits always lose the version race
///
/// Everything else is delegated, so reads and non-ledger writes behave
/// normally while every `commit_movement` reports a conflict.
#[derive(Default)]
pub struct ConflictingStore {
    inner: MemoryStore,
    commit_calls: AtomicU32,
}

impl ConflictingStore {
    pub fn commit_calls(&self) -> u32 {
        self.commit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogStore for ConflictingStore {
    async fn insert_catalog_item(&self, item: &CatalogItem) -> AppResult<()> {
        self.inner.insert_catalog_item(item).await
    }

    async fn find_catalog_item(&self, id: Uuid) -> AppResult<Option<CatalogItem>> {
        self.inner.find_catalog_item(id).await
    }

    async fn list_catalog_items(&self) -> AppResult<Vec<CatalogItem>> {
        self.inner.list_catalog_items().await
    }
}

#[async_trait]
impl BalanceStore for ConflictingStore {
    async fn insert_balance(&self, balance: &BalanceRecord) -> AppResult<()> {
        self.inner.insert_balance(balance).await
    }

    async fn find_balance(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
    ) -> AppResult<Option<BalanceRecord>> {
        self.inner.find_balance(site_id, balance_id).await
    }

    async fn list_balances(&self, site_id: Uuid) -> AppResult<Vec<BalanceRecord>> {
        self.inner.list_balances(site_id).await
    }

    async fn commit_movement(&self, _plan: &PlannedMovement) -> AppResult<CommitOutcome> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CommitOutcome::Conflict)
    }

    async fn update_balance_details(
        &self,
        expected_version: i64,
        balance: &BalanceRecord,
    ) -> AppResult<CommitOutcome> {
        self.inner
            .update_balance_details(expected_version, balance)
            .await
    }

    async fn detach_balance(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<DetachOutcome> {
        self.inner.detach_balance(site_id, balance_id).await
    }

    async fn list_movements(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<(Vec<MovementEvent>, u64)> {
        self.inner
            .list_movements(site_id, balance_id, pagination)
            .await
    }

    async fn list_site_movements(
        &self,
        site_id: Uuid,
        category: Option<MovementCategory>,
    ) -> AppResult<Vec<MovementEvent>> {
        self.inner.list_site_movements(site_id, category).await
    }

    async fn movement_totals(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<MovementTotals> {
        self.inner.movement_totals(site_id, balance_id).await
    }
}

#[async_trait]
impl LoanStore for ConflictingStore {
    async fn insert_loan_checked(&self, loan: &LoanRecord) -> AppResult<()> {
        self.inner.insert_loan_checked(loan).await
    }

    async fn find_loan(&self, site_id: Uuid, loan_id: Uuid) -> AppResult<Option<LoanRecord>> {
        self.inner.find_loan(site_id, loan_id).await
    }

    async fn list_loans(
        &self,
        site_id: Uuid,
        status: Option<LoanStatus>,
    ) -> AppResult<Vec<LoanRecord>> {
        self.inner.list_loans(site_id, status).await
    }

    async fn committed_quantity(&self, site_id: Uuid, target: LoanTarget) -> AppResult<Decimal> {
        self.inner.committed_quantity(site_id, target).await
    }

    async fn committed_by_target(
        &self,
        site_id: Uuid,
    ) -> AppResult<HashMap<LoanTarget, Decimal>> {
        self.inner.committed_by_target(site_id).await
    }

    async fn record_return(&self, loan: &LoanRecord) -> AppResult<CommitOutcome> {
        self.inner.record_return(loan).await
    }
}

#[async_trait]
impl EquipmentStore for ConflictingStore {
    async fn insert_equipment(&self, record: &RentedEquipmentRecord) -> AppResult<()> {
        self.inner.insert_equipment(record).await
    }

    async fn find_equipment(
        &self,
        site_id: Uuid,
        equipment_id: Uuid,
    ) -> AppResult<Option<RentedEquipmentRecord>> {
        self.inner.find_equipment(site_id, equipment_id).await
    }

    async fn list_equipment(
        &self,
        site_id: Uuid,
        status: Option<EquipmentStatus>,
    ) -> AppResult<Vec<RentedEquipmentRecord>> {
        self.inner.list_equipment(site_id, status).await
    }

    async fn record_exit(&self, record: &RentedEquipmentRecord) -> AppResult<CommitOutcome> {
        self.inner.record_exit(record).await
    }

    async fn update_tool_flag(
        &self,
        site_id: Uuid,
        equipment_id: Uuid,
        flag: ToolFlag,
    ) -> AppResult<bool> {
        self.inner
            .update_tool_flag(site_id, equipment_id, flag)
            .await
    }
}

//! Storage ports for the stock ledger
//!
//! Services talk to these traits only. `PgStore` backs them with PostgreSQL;
//! `MemoryStore` gives the same guarantees in-process for tests and demos.
//!
//! Every write that depends on a prior read is committed conditionally:
//! balance writes compare-and-swap on `version`, loan creation locks the
//! loaned item while it sums open loans, and lifecycle transitions only
//! match rows still in their source state.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    BalanceRecord, CatalogItem, EquipmentStatus, LoanRecord, LoanStatus, LoanTarget,
    MovementCategory, MovementEvent, MovementTotals, Pagination, PlannedMovement,
    RentedEquipmentRecord, ToolFlag,
};

use crate::error::AppResult;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The row changed (or vanished) since it was read
    Conflict,
}

/// Result of removing a balance from a site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachOutcome {
    Detached,
    NotFound,
    HasOpenLoans,
}

/// Global material catalog
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_catalog_item(&self, item: &CatalogItem) -> AppResult<()>;

    async fn find_catalog_item(&self, id: Uuid) -> AppResult<Option<CatalogItem>>;

    /// All items ordered by name
    async fn list_catalog_items(&self) -> AppResult<Vec<CatalogItem>>;
}

/// Balance records and their movement ledgers
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Fails with `DuplicateAttachment` when the site already holds the
    /// catalog item
    async fn insert_balance(&self, balance: &BalanceRecord) -> AppResult<()>;

    async fn find_balance(&self, site_id: Uuid, balance_id: Uuid)
        -> AppResult<Option<BalanceRecord>>;

    /// All balances of a site ordered by name
    async fn list_balances(&self, site_id: Uuid) -> AppResult<Vec<BalanceRecord>>;

    /// Write the balance and append the event in one atomic unit, provided
    /// the stored version still equals `plan.expected_version`
    async fn commit_movement(&self, plan: &PlannedMovement) -> AppResult<CommitOutcome>;

    /// Write descriptive fields (never quantity) if the stored version still
    /// equals `expected_version`
    async fn update_balance_details(
        &self,
        expected_version: i64,
        balance: &BalanceRecord,
    ) -> AppResult<CommitOutcome>;

    /// Delete a balance and its ledger unless open loans reference it
    async fn detach_balance(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<DetachOutcome>;

    /// One page of a balance's ledger, newest first, plus the total count
    async fn list_movements(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<(Vec<MovementEvent>, u64)>;

    /// Site-wide ledger, newest first, optionally narrowed to one category
    async fn list_site_movements(
        &self,
        site_id: Uuid,
        category: Option<MovementCategory>,
    ) -> AppResult<Vec<MovementEvent>>;

    async fn movement_totals(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<MovementTotals>;
}

/// Loan overlay records
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Insert an OPEN loan after re-checking availability while the loaned
    /// item is locked
    ///
    /// Fails with `NotFound` for an unknown item, `InvalidStateTransition`
    /// for returned equipment and `InsufficientStock` when the request
    /// exceeds what is available.
    async fn insert_loan_checked(&self, loan: &LoanRecord) -> AppResult<()>;

    async fn find_loan(&self, site_id: Uuid, loan_id: Uuid) -> AppResult<Option<LoanRecord>>;

    /// Loans of a site, newest first
    async fn list_loans(&self, site_id: Uuid, status: Option<LoanStatus>)
        -> AppResult<Vec<LoanRecord>>;

    /// Sum of open loans against one item
    async fn committed_quantity(&self, site_id: Uuid, target: LoanTarget) -> AppResult<Decimal>;

    /// Sum of open loans per item across a site
    async fn committed_by_target(&self, site_id: Uuid) -> AppResult<HashMap<LoanTarget, Decimal>>;

    /// Persist a return; only matches loans that are still open
    async fn record_return(&self, loan: &LoanRecord) -> AppResult<CommitOutcome>;
}

/// Rented equipment batches
#[async_trait]
pub trait EquipmentStore: Send + Sync {
    async fn insert_equipment(&self, record: &RentedEquipmentRecord) -> AppResult<()>;

    async fn find_equipment(
        &self,
        site_id: Uuid,
        equipment_id: Uuid,
    ) -> AppResult<Option<RentedEquipmentRecord>>;

    /// Batches of a site, most recent entry first
    async fn list_equipment(
        &self,
        site_id: Uuid,
        status: Option<EquipmentStatus>,
    ) -> AppResult<Vec<RentedEquipmentRecord>>;

    /// Persist an exit; only matches batches that are still active
    async fn record_exit(&self, record: &RentedEquipmentRecord) -> AppResult<CommitOutcome>;

    async fn update_tool_flag(
        &self,
        site_id: Uuid,
        equipment_id: Uuid,
        flag: ToolFlag,
    ) -> AppResult<bool>;
}

/// Everything the ledger services need from storage
pub trait Store: CatalogStore + BalanceStore + LoanStore + EquipmentStore {}

impl<T> Store for T where T: CatalogStore + BalanceStore + LoanStore + EquipmentStore {}

//! PostgreSQL store
//!
//! Enum columns are stored as TEXT and parsed on the way out; an unknown
//! value is reported as an internal error rather than silently defaulted.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::{
    ensure_available, BalanceRecord, CatalogItem, EquipmentStatus, ItemOrigin, LoanRecord,
    LoanStatus, LoanTarget, MovementCategory, MovementEvent, MovementTotals, MovementType,
    Pagination, PlannedMovement, RentedEquipmentRecord, ToolFlag,
};

use super::{
    BalanceStore, CatalogStore, CommitOutcome, DetachOutcome, EquipmentStore, LoanStore,
};
use crate::error::{AppError, AppResult};

const UNIQUE_VIOLATION: &str = "23505";

const BALANCE_COLUMNS: &str = "id, site_id, catalog_ref_id, name, unit, category, quantity, \
     average_price, min_threshold, version, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, balance_id, site_id, movement_type, category, quantity, \
     movement_date, reason, actor_id, actor_name, unit_price, created_at";

const LOAN_COLUMNS: &str = "id, site_id, item_id, item_origin, item_name, borrower_name, \
     quantity, loan_date, return_date, notes, return_notes, status, created_at";

const EQUIPMENT_COLUMNS: &str = "id, site_id, name, supplier, category, unit, quantity, \
     entry_date, entry_photos, exit_date, exit_photos, status, is_tool, notes, created_at, \
     updated_at";

fn unknown_value(column: &str, value: &str) -> AppError {
    AppError::Internal(format!("unexpected {} value '{}' in database", column, value))
}

#[derive(Debug, FromRow)]
struct CatalogRow {
    id: Uuid,
    name: String,
    unit: String,
    category: String,
    unit_value: Decimal,
    created_at: DateTime<Utc>,
}

impl From<CatalogRow> for CatalogItem {
    fn from(row: CatalogRow) -> Self {
        CatalogItem {
            id: row.id,
            name: row.name,
            unit: row.unit,
            category: row.category,
            unit_value: row.unit_value,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BalanceRow {
    id: Uuid,
    site_id: Uuid,
    catalog_ref_id: Uuid,
    name: String,
    unit: String,
    category: String,
    quantity: Decimal,
    average_price: Decimal,
    min_threshold: Decimal,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BalanceRow> for BalanceRecord {
    fn from(row: BalanceRow) -> Self {
        BalanceRecord {
            id: row.id,
            site_id: row.site_id,
            catalog_ref_id: row.catalog_ref_id,
            name: row.name,
            unit: row.unit,
            category: row.category,
            quantity: row.quantity,
            average_price: row.average_price,
            min_threshold: row.min_threshold,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    balance_id: Uuid,
    site_id: Uuid,
    movement_type: String,
    category: String,
    quantity: Decimal,
    movement_date: NaiveDate,
    reason: Option<String>,
    actor_id: Option<String>,
    actor_name: Option<String>,
    unit_price: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for MovementEvent {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(MovementEvent {
            id: row.id,
            balance_id: row.balance_id,
            site_id: row.site_id,
            movement_type: MovementType::parse(&row.movement_type)
                .ok_or_else(|| unknown_value("movement_type", &row.movement_type))?,
            category: MovementCategory::parse(&row.category)
                .ok_or_else(|| unknown_value("category", &row.category))?,
            quantity: row.quantity,
            movement_date: row.movement_date,
            reason: row.reason,
            actor_id: row.actor_id,
            actor_name: row.actor_name,
            unit_price: row.unit_price,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LoanRow {
    id: Uuid,
    site_id: Uuid,
    item_id: Uuid,
    item_origin: String,
    item_name: String,
    borrower_name: String,
    quantity: Decimal,
    loan_date: NaiveDate,
    return_date: Option<NaiveDate>,
    notes: Option<String>,
    return_notes: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<LoanRow> for LoanRecord {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        Ok(LoanRecord {
            id: row.id,
            site_id: row.site_id,
            item_id: row.item_id,
            item_origin: ItemOrigin::parse(&row.item_origin)
                .ok_or_else(|| unknown_value("item_origin", &row.item_origin))?,
            item_name: row.item_name,
            borrower_name: row.borrower_name,
            quantity: row.quantity,
            loan_date: row.loan_date,
            return_date: row.return_date,
            notes: row.notes,
            return_notes: row.return_notes,
            status: LoanStatus::parse(&row.status)
                .ok_or_else(|| unknown_value("loan status", &row.status))?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EquipmentRow {
    id: Uuid,
    site_id: Uuid,
    name: String,
    supplier: String,
    category: String,
    unit: String,
    quantity: Decimal,
    entry_date: NaiveDate,
    entry_photos: Vec<String>,
    exit_date: Option<NaiveDate>,
    exit_photos: Vec<String>,
    status: String,
    is_tool: Option<bool>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EquipmentRow> for RentedEquipmentRecord {
    type Error = AppError;

    fn try_from(row: EquipmentRow) -> Result<Self, Self::Error> {
        Ok(RentedEquipmentRecord {
            id: row.id,
            site_id: row.site_id,
            name: row.name,
            supplier: row.supplier,
            category: row.category,
            unit: row.unit,
            quantity: row.quantity,
            entry_date: row.entry_date,
            entry_photos: row.entry_photos,
            exit_date: row.exit_date,
            exit_photos: row.exit_photos,
            status: EquipmentStatus::parse(&row.status)
                .ok_or_else(|| unknown_value("equipment status", &row.status))?,
            is_tool: ToolFlag::from(row.is_tool),
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TotalsRow {
    total_in: Decimal,
    total_out: Decimal,
    movement_count: i64,
}

#[derive(Debug, FromRow)]
struct CommittedRow {
    item_origin: String,
    item_id: Uuid,
    committed: Decimal,
}

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Sum of open loans against one item, inside the caller's transaction
    async fn committed_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        site_id: Uuid,
        target: LoanTarget,
    ) -> AppResult<Decimal> {
        let committed = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM tool_loans
            WHERE site_id = $1 AND item_origin = $2 AND item_id = $3 AND status = 'open'
            "#,
        )
        .bind(site_id)
        .bind(target.origin.as_str())
        .bind(target.item_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(committed)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_catalog_item(&self, item: &CatalogItem) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_items (id, name, unit, category, unit_value, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.unit)
        .bind(&item.category)
        .bind(item.unit_value)
        .bind(item.created_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn find_catalog_item(&self, id: Uuid) -> AppResult<Option<CatalogItem>> {
        let row = sqlx::query_as::<_, CatalogRow>(
            "SELECT id, name, unit, category, unit_value, created_at FROM catalog_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(CatalogItem::from))
    }

    async fn list_catalog_items(&self) -> AppResult<Vec<CatalogItem>> {
        let rows = sqlx::query_as::<_, CatalogRow>(
            "SELECT id, name, unit, category, unit_value, created_at FROM catalog_items ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(CatalogItem::from).collect())
    }
}

#[async_trait]
impl BalanceStore for PgStore {
    async fn insert_balance(&self, balance: &BalanceRecord) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO stock_balances (
                id, site_id, catalog_ref_id, name, unit, category, quantity,
                average_price, min_threshold, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(balance.id)
        .bind(balance.site_id)
        .bind(balance.catalog_ref_id)
        .bind(&balance.name)
        .bind(&balance.unit)
        .bind(&balance.category)
        .bind(balance.quantity)
        .bind(balance.average_price)
        .bind(balance.min_threshold)
        .bind(balance.version)
        .bind(balance.created_at)
        .bind(balance.updated_at)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                Err(AppError::DuplicateAttachment(balance.name.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_balance(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
    ) -> AppResult<Option<BalanceRecord>> {
        let row = sqlx::query_as::<_, BalanceRow>(&format!(
            "SELECT {} FROM stock_balances WHERE id = $1 AND site_id = $2",
            BALANCE_COLUMNS
        ))
        .bind(balance_id)
        .bind(site_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(BalanceRecord::from))
    }

    async fn list_balances(&self, site_id: Uuid) -> AppResult<Vec<BalanceRecord>> {
        let rows = sqlx::query_as::<_, BalanceRow>(&format!(
            "SELECT {} FROM stock_balances WHERE site_id = $1 ORDER BY name",
            BALANCE_COLUMNS
        ))
        .bind(site_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(BalanceRecord::from).collect())
    }

    async fn commit_movement(&self, plan: &PlannedMovement) -> AppResult<CommitOutcome> {
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE stock_balances
            SET quantity = $1, average_price = $2, version = $3, updated_at = $4
            WHERE id = $5 AND site_id = $6 AND version = $7
            "#,
        )
        .bind(plan.balance.quantity)
        .bind(plan.balance.average_price)
        .bind(plan.balance.version)
        .bind(plan.balance.updated_at)
        .bind(plan.balance.id)
        .bind(plan.balance.site_id)
        .bind(plan.expected_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CommitOutcome::Conflict);
        }

        let event = &plan.event;
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, balance_id, site_id, movement_type, category, quantity,
                movement_date, reason, actor_id, actor_name, unit_price, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(event.id)
        .bind(event.balance_id)
        .bind(event.site_id)
        .bind(event.movement_type.as_str())
        .bind(event.category.as_str())
        .bind(event.quantity)
        .bind(event.movement_date)
        .bind(&event.reason)
        .bind(&event.actor_id)
        .bind(&event.actor_name)
        .bind(event.unit_price)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CommitOutcome::Committed)
    }

    async fn update_balance_details(
        &self,
        expected_version: i64,
        balance: &BalanceRecord,
    ) -> AppResult<CommitOutcome> {
        let updated = sqlx::query(
            r#"
            UPDATE stock_balances
            SET name = $1, unit = $2, category = $3, min_threshold = $4,
                average_price = $5, version = $6, updated_at = $7
            WHERE id = $8 AND site_id = $9 AND version = $10
            "#,
        )
        .bind(&balance.name)
        .bind(&balance.unit)
        .bind(&balance.category)
        .bind(balance.min_threshold)
        .bind(balance.average_price)
        .bind(balance.version)
        .bind(balance.updated_at)
        .bind(balance.id)
        .bind(balance.site_id)
        .bind(expected_version)
        .execute(&self.db)
        .await?;

        Ok(if updated.rows_affected() == 0 {
            CommitOutcome::Conflict
        } else {
            CommitOutcome::Committed
        })
    }

    async fn detach_balance(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<DetachOutcome> {
        let mut tx = self.db.begin().await?;

        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM stock_balances WHERE id = $1 AND site_id = $2 FOR UPDATE",
        )
        .bind(balance_id)
        .bind(site_id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            tx.rollback().await?;
            return Ok(DetachOutcome::NotFound);
        }

        let committed =
            Self::committed_in_tx(&mut tx, site_id, LoanTarget::owned(balance_id)).await?;
        if committed > Decimal::ZERO {
            tx.rollback().await?;
            return Ok(DetachOutcome::HasOpenLoans);
        }

        // Movements go with the balance through ON DELETE CASCADE
        sqlx::query("DELETE FROM stock_balances WHERE id = $1")
            .bind(balance_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(DetachOutcome::Detached)
    }

    async fn list_movements(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<(Vec<MovementEvent>, u64)> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM stock_movements WHERE site_id = $1 AND balance_id = $2",
        )
        .bind(site_id)
        .bind(balance_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            SELECT {}
            FROM stock_movements
            WHERE site_id = $1 AND balance_id = $2
            ORDER BY movement_date DESC, created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(site_id)
        .bind(balance_id)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&self.db)
        .await?;

        let events = rows
            .into_iter()
            .map(MovementEvent::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((events, total.max(0) as u64))
    }

    async fn list_site_movements(
        &self,
        site_id: Uuid,
        category: Option<MovementCategory>,
    ) -> AppResult<Vec<MovementEvent>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            SELECT {}
            FROM stock_movements
            WHERE site_id = $1 AND ($2::TEXT IS NULL OR category = $2)
            ORDER BY movement_date DESC, created_at DESC
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(site_id)
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(MovementEvent::try_from).collect()
    }

    async fn movement_totals(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<MovementTotals> {
        let row = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT COALESCE(SUM(CASE WHEN movement_type = 'in' THEN quantity ELSE 0 END), 0) AS total_in,
                   COALESCE(SUM(CASE WHEN movement_type = 'out' THEN quantity ELSE 0 END), 0) AS total_out,
                   COUNT(*) AS movement_count
            FROM stock_movements
            WHERE site_id = $1 AND balance_id = $2
            "#,
        )
        .bind(site_id)
        .bind(balance_id)
        .fetch_one(&self.db)
        .await?;

        Ok(MovementTotals {
            total_in: row.total_in,
            total_out: row.total_out,
            movement_count: row.movement_count.max(0) as u64,
        })
    }
}

#[async_trait]
impl LoanStore for PgStore {
    async fn insert_loan_checked(&self, loan: &LoanRecord) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        // The row lock serializes concurrent loans against the same item
        let capacity = match loan.item_origin {
            ItemOrigin::Owned => sqlx::query_scalar::<_, Decimal>(
                "SELECT quantity FROM stock_balances WHERE id = $1 AND site_id = $2 FOR UPDATE",
            )
            .bind(loan.item_id)
            .bind(loan.site_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock item".to_string()))?,
            ItemOrigin::Rented => {
                let row = sqlx::query_as::<_, EquipmentRow>(&format!(
                    "SELECT {} FROM rented_equipment WHERE id = $1 AND site_id = $2 FOR UPDATE",
                    EQUIPMENT_COLUMNS
                ))
                .bind(loan.item_id)
                .bind(loan.site_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Rented equipment".to_string()))?;

                let batch = RentedEquipmentRecord::try_from(row)?;
                batch.ensure_accepts_loans()?;
                batch.quantity
            }
        };

        let committed = Self::committed_in_tx(&mut tx, loan.site_id, loan.target()).await?;
        ensure_available(capacity, committed, loan.quantity)?;

        sqlx::query(
            r#"
            INSERT INTO tool_loans (
                id, site_id, item_id, item_origin, item_name, borrower_name, quantity,
                loan_date, return_date, notes, return_notes, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(loan.id)
        .bind(loan.site_id)
        .bind(loan.item_id)
        .bind(loan.item_origin.as_str())
        .bind(&loan.item_name)
        .bind(&loan.borrower_name)
        .bind(loan.quantity)
        .bind(loan.loan_date)
        .bind(loan.return_date)
        .bind(&loan.notes)
        .bind(&loan.return_notes)
        .bind(loan.status.as_str())
        .bind(loan.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn find_loan(&self, site_id: Uuid, loan_id: Uuid) -> AppResult<Option<LoanRecord>> {
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            "SELECT {} FROM tool_loans WHERE id = $1 AND site_id = $2",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .bind(site_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(LoanRecord::try_from).transpose()
    }

    async fn list_loans(
        &self,
        site_id: Uuid,
        status: Option<LoanStatus>,
    ) -> AppResult<Vec<LoanRecord>> {
        let rows = sqlx::query_as::<_, LoanRow>(&format!(
            r#"
            SELECT {}
            FROM tool_loans
            WHERE site_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY loan_date DESC, created_at DESC
            "#,
            LOAN_COLUMNS
        ))
        .bind(site_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(LoanRecord::try_from).collect()
    }

    async fn committed_quantity(&self, site_id: Uuid, target: LoanTarget) -> AppResult<Decimal> {
        let committed = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM tool_loans
            WHERE site_id = $1 AND item_origin = $2 AND item_id = $3 AND status = 'open'
            "#,
        )
        .bind(site_id)
        .bind(target.origin.as_str())
        .bind(target.item_id)
        .fetch_one(&self.db)
        .await?;

        Ok(committed)
    }

    async fn committed_by_target(
        &self,
        site_id: Uuid,
    ) -> AppResult<HashMap<LoanTarget, Decimal>> {
        let rows = sqlx::query_as::<_, CommittedRow>(
            r#"
            SELECT item_origin, item_id, SUM(quantity) AS committed
            FROM tool_loans
            WHERE site_id = $1 AND status = 'open'
            GROUP BY item_origin, item_id
            "#,
        )
        .bind(site_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let origin = ItemOrigin::parse(&row.item_origin)
                    .ok_or_else(|| unknown_value("item_origin", &row.item_origin))?;
                Ok((
                    LoanTarget {
                        origin,
                        item_id: row.item_id,
                    },
                    row.committed,
                ))
            })
            .collect()
    }

    async fn record_return(&self, loan: &LoanRecord) -> AppResult<CommitOutcome> {
        let updated = sqlx::query(
            r#"
            UPDATE tool_loans
            SET status = $1, return_date = $2, return_notes = $3
            WHERE id = $4 AND site_id = $5 AND status = 'open'
            "#,
        )
        .bind(loan.status.as_str())
        .bind(loan.return_date)
        .bind(&loan.return_notes)
        .bind(loan.id)
        .bind(loan.site_id)
        .execute(&self.db)
        .await?;

        Ok(if updated.rows_affected() == 0 {
            CommitOutcome::Conflict
        } else {
            CommitOutcome::Committed
        })
    }
}

#[async_trait]
impl EquipmentStore for PgStore {
    async fn insert_equipment(&self, record: &RentedEquipmentRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rented_equipment (
                id, site_id, name, supplier, category, unit, quantity, entry_date,
                entry_photos, exit_date, exit_photos, status, is_tool, notes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id)
        .bind(record.site_id)
        .bind(&record.name)
        .bind(&record.supplier)
        .bind(&record.category)
        .bind(&record.unit)
        .bind(record.quantity)
        .bind(record.entry_date)
        .bind(&record.entry_photos)
        .bind(record.exit_date)
        .bind(&record.exit_photos)
        .bind(record.status.as_str())
        .bind(record.is_tool.as_option())
        .bind(&record.notes)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn find_equipment(
        &self,
        site_id: Uuid,
        equipment_id: Uuid,
    ) -> AppResult<Option<RentedEquipmentRecord>> {
        let row = sqlx::query_as::<_, EquipmentRow>(&format!(
            "SELECT {} FROM rented_equipment WHERE id = $1 AND site_id = $2",
            EQUIPMENT_COLUMNS
        ))
        .bind(equipment_id)
        .bind(site_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(RentedEquipmentRecord::try_from).transpose()
    }

    async fn list_equipment(
        &self,
        site_id: Uuid,
        status: Option<EquipmentStatus>,
    ) -> AppResult<Vec<RentedEquipmentRecord>> {
        let rows = sqlx::query_as::<_, EquipmentRow>(&format!(
            r#"
            SELECT {}
            FROM rented_equipment
            WHERE site_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY entry_date DESC, created_at DESC
            "#,
            EQUIPMENT_COLUMNS
        ))
        .bind(site_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(RentedEquipmentRecord::try_from)
            .collect()
    }

    async fn record_exit(&self, record: &RentedEquipmentRecord) -> AppResult<CommitOutcome> {
        let updated = sqlx::query(
            r#"
            UPDATE rented_equipment
            SET status = $1, exit_date = $2, exit_photos = $3, updated_at = $4
            WHERE id = $5 AND site_id = $6 AND status = 'active'
            "#,
        )
        .bind(record.status.as_str())
        .bind(record.exit_date)
        .bind(&record.exit_photos)
        .bind(record.updated_at)
        .bind(record.id)
        .bind(record.site_id)
        .execute(&self.db)
        .await?;

        Ok(if updated.rows_affected() == 0 {
            CommitOutcome::Conflict
        } else {
            CommitOutcome::Committed
        })
    }

    async fn update_tool_flag(
        &self,
        site_id: Uuid,
        equipment_id: Uuid,
        flag: ToolFlag,
    ) -> AppResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE rented_equipment
            SET is_tool = $1, updated_at = NOW()
            WHERE id = $2 AND site_id = $3
            "#,
        )
        .bind(flag.as_option())
        .bind(equipment_id)
        .bind(site_id)
        .execute(&self.db)
        .await?;

        Ok(updated.rows_affected() > 0)
    }
}

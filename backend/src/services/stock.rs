//! Stock ledger service: attachment, movements, adjustments and alerts
//!
//! Every quantity change goes through [`StockService::with_balance_transaction`],
//! which plans the movement against a fresh read of the balance and commits it
//! with a compare-and-swap on the balance version.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use shared::{
    adjustment_draft, validate_non_negative, Actor, BalanceDetailsUpdate, BalanceRecord,
    LedgerAudit, LedgerError, LoanTarget, MovementCategory, MovementDraft, MovementEvent,
    MovementType, PaginatedResponse, Pagination, PlannedMovement, StockItemView,
};

use crate::error::{AppError, AppResult};
use crate::store::{CommitOutcome, DetachOutcome, Store};

/// Attempts per balance write before reporting a concurrent modification
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;

const OPENING_BALANCE_REASON: &str = "Estoque inicial";

/// Input for attaching a catalog item to a site
#[derive(Debug, Deserialize, Validate)]
pub struct AttachItemInput {
    pub catalog_ref_id: Uuid,
    pub min_threshold: Option<Decimal>,
    /// Opening stock, posted as an IN movement
    pub initial_quantity: Option<Decimal>,
}

/// Input for posting a movement
#[derive(Debug, Deserialize, Validate)]
pub struct MovementInput {
    pub movement_type: MovementType,
    pub quantity: Decimal,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub movement_date: Option<NaiveDate>,
    /// Purchase price per unit, IN movements only
    pub unit_price: Option<Decimal>,
}

/// Input for an administrative count correction
#[derive(Debug, Deserialize, Validate)]
pub struct SetQuantityInput {
    pub quantity: Decimal,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Input for handing protective equipment to a collaborator
#[derive(Debug, Deserialize, Validate)]
pub struct EpiWithdrawalInput {
    pub balance_id: Uuid,
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 100))]
    pub collaborator_id: String,
    #[validate(length(min = 1, max = 200))]
    pub collaborator_name: String,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub withdrawal_date: Option<NaiveDate>,
}

/// A committed movement with the balance it produced
#[derive(Debug, Clone, Serialize)]
pub struct MovementReceipt {
    pub movement: MovementEvent,
    pub item: StockItemView,
}

/// Result of a count correction; `movement` is absent when nothing changed
#[derive(Debug, Clone, Serialize)]
pub struct QuantityAdjustment {
    pub movement: Option<MovementEvent>,
    pub item: StockItemView,
}

/// Stock service over any store
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn Store>,
    max_attempts: u32,
}

impl StockService {
    pub fn new(store: Arc<dyn Store>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    async fn load_balance(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<BalanceRecord> {
        self.store
            .find_balance(site_id, balance_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock item".to_string()))
    }

    async fn view(&self, balance: BalanceRecord) -> AppResult<StockItemView> {
        let committed = self
            .store
            .committed_quantity(balance.site_id, LoanTarget::owned(balance.id))
            .await?;
        Ok(StockItemView::new(balance, committed))
    }

    /// Read-plan-commit loop for one balance
    ///
    /// `plan` sees the current balance and returns the movement to post, or
    /// `None` to leave the balance untouched. A lost compare-and-swap re-reads
    /// the balance and calls `plan` again.
    pub async fn with_balance_transaction<F>(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
        mut plan: F,
    ) -> AppResult<Option<PlannedMovement>>
    where
        F: FnMut(&BalanceRecord) -> Result<Option<MovementDraft>, LedgerError> + Send,
    {
        for attempt in 1..=self.max_attempts {
            let current = self.load_balance(site_id, balance_id).await?;
            let Some(draft) = plan(&current)? else {
                return Ok(None);
            };

            let planned = match current.plan_movement(draft, Utc::now()) {
                Ok(planned) => planned,
                Err(err) => {
                    if let LedgerError::InsufficientStock {
                        requested,
                        available,
                    } = &err
                    {
                        tracing::warn!(
                            %balance_id,
                            %requested,
                            %available,
                            "Rejected OUT movement below zero"
                        );
                    }
                    return Err(err.into());
                }
            };

            match self.store.commit_movement(&planned).await? {
                CommitOutcome::Committed => {
                    tracing::info!(
                        %balance_id,
                        movement_id = %planned.event.id,
                        movement_type = planned.event.movement_type.as_str(),
                        category = planned.event.category.as_str(),
                        quantity = %planned.event.quantity,
                        balance = %planned.balance.quantity,
                        "Stock movement committed"
                    );
                    return Ok(Some(planned));
                }
                CommitOutcome::Conflict => {
                    tracing::debug!(%balance_id, attempt, "Balance changed concurrently, re-planning");
                }
            }
        }

        Err(AppError::ConcurrentModification("Stock item".to_string()))
    }

    /// Post an IN or OUT movement
    pub async fn apply_movement(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
        actor: Actor,
        input: MovementInput,
    ) -> AppResult<MovementReceipt> {
        input.validate()?;

        let draft = MovementDraft::new(input.movement_type, input.quantity)
            .with_reason(input.reason)
            .with_actor(Some(actor))
            .on_date(input.movement_date)
            .with_unit_price(input.unit_price);

        self.commit_draft(site_id, balance_id, draft).await
    }

    /// Hand protective equipment to a collaborator as an OUT movement
    pub async fn withdraw_epi(
        &self,
        site_id: Uuid,
        input: EpiWithdrawalInput,
    ) -> AppResult<MovementReceipt> {
        input.validate()?;

        let collaborator = Actor::new(input.collaborator_id, input.collaborator_name);
        let draft = MovementDraft::epi_withdrawal(input.quantity, collaborator)
            .with_reason(input.reason)
            .on_date(input.withdrawal_date);

        self.commit_draft(site_id, input.balance_id, draft).await
    }

    async fn commit_draft(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
        draft: MovementDraft,
    ) -> AppResult<MovementReceipt> {
        let planned = self
            .with_balance_transaction(site_id, balance_id, |_| Ok(Some(draft.clone())))
            .await?
            .ok_or_else(|| AppError::Internal("movement plan produced no event".to_string()))?;

        Ok(MovementReceipt {
            movement: planned.event,
            item: self.view(planned.balance).await?,
        })
    }

    /// EPI withdrawals of a site, newest first
    pub async fn list_epi_withdrawals(&self, site_id: Uuid) -> AppResult<Vec<MovementEvent>> {
        self.store
            .list_site_movements(site_id, Some(MovementCategory::EpiWithdrawal))
            .await
    }

    /// One page of a balance's ledger, newest first
    pub async fn list_movements(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<MovementEvent>> {
        self.load_balance(site_id, balance_id).await?;

        let (events, total) = self
            .store
            .list_movements(site_id, balance_id, pagination)
            .await?;
        Ok(PaginatedResponse::new(events, pagination, total))
    }

    /// Replay the ledger and compare it with the stored quantity
    pub async fn verify_ledger(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<LedgerAudit> {
        let balance = self.load_balance(site_id, balance_id).await?;
        let totals = self.store.movement_totals(site_id, balance_id).await?;
        let audit = LedgerAudit::new(&balance, totals);

        if !audit.consistent {
            tracing::warn!(
                %balance_id,
                recorded = %audit.recorded_quantity,
                replayed = %audit.replayed_quantity,
                "Balance does not match its ledger"
            );
        }
        Ok(audit)
    }

    /// Bring the balance to a counted quantity through an ADJUSTMENT movement
    pub async fn set_quantity(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
        actor: Actor,
        input: SetQuantityInput,
    ) -> AppResult<QuantityAdjustment> {
        input.validate()?;
        validate_non_negative("quantity", input.quantity)?;

        let target = input.quantity;
        let reason = input.reason;
        let planned = self
            .with_balance_transaction(site_id, balance_id, |current| {
                Ok(adjustment_draft(current.quantity, target)?
                    .map(|draft| draft.with_reason(reason.clone()).with_actor(Some(actor.clone()))))
            })
            .await?;

        match planned {
            Some(planned) => Ok(QuantityAdjustment {
                movement: Some(planned.event),
                item: self.view(planned.balance).await?,
            }),
            None => {
                tracing::debug!(%balance_id, "Counted quantity matches balance, nothing to adjust");
                let balance = self.load_balance(site_id, balance_id).await?;
                Ok(QuantityAdjustment {
                    movement: None,
                    item: self.view(balance).await?,
                })
            }
        }
    }

    /// Attach a catalog item to a site, optionally with opening stock
    pub async fn attach(
        &self,
        site_id: Uuid,
        actor: Actor,
        input: AttachItemInput,
    ) -> AppResult<StockItemView> {
        input.validate()?;
        let initial_quantity = input.initial_quantity.unwrap_or(Decimal::ZERO);
        validate_non_negative("initial_quantity", initial_quantity)?;

        let catalog = self
            .store
            .find_catalog_item(input.catalog_ref_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Catalog item".to_string()))?;

        let already_attached = self
            .store
            .list_balances(site_id)
            .await?
            .iter()
            .any(|b| b.catalog_ref_id == catalog.id);
        if already_attached {
            return Err(AppError::DuplicateAttachment(catalog.name));
        }

        let balance = BalanceRecord::attach(
            site_id,
            &catalog,
            input.min_threshold.unwrap_or(Decimal::ZERO),
            Utc::now(),
        )?;
        self.store.insert_balance(&balance).await?;
        tracing::info!(%site_id, balance_id = %balance.id, name = %balance.name, "Catalog item attached");

        if initial_quantity > Decimal::ZERO {
            let draft = MovementDraft::inbound(initial_quantity)
                .with_reason(Some(OPENING_BALANCE_REASON.to_string()))
                .with_actor(Some(actor));
            return match self.commit_draft(site_id, balance.id, draft).await {
                Ok(receipt) => Ok(receipt.item),
                Err(err) => {
                    // Nothing can reference the new balance yet, so undo the attach
                    tracing::warn!(
                        balance_id = %balance.id,
                        error = %err,
                        "Opening stock failed, detaching"
                    );
                    self.store.detach_balance(site_id, balance.id).await?;
                    Err(err)
                }
            };
        }

        self.view(balance).await
    }

    pub async fn get_item(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<StockItemView> {
        let balance = self.load_balance(site_id, balance_id).await?;
        self.view(balance).await
    }

    /// Every balance of a site with its loan overlay applied
    pub async fn list_items(&self, site_id: Uuid) -> AppResult<Vec<StockItemView>> {
        let balances = self.store.list_balances(site_id).await?;
        let committed = self.store.committed_by_target(site_id).await?;

        Ok(balances
            .into_iter()
            .map(|balance| {
                let open = committed
                    .get(&LoanTarget::owned(balance.id))
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                StockItemView::new(balance, open)
            })
            .collect())
    }

    pub async fn list_low_stock(&self, site_id: Uuid) -> AppResult<Vec<StockItemView>> {
        Ok(self
            .list_items(site_id)
            .await?
            .into_iter()
            .filter(|item| item.is_low_stock)
            .collect())
    }

    /// Administrative edit; the quantity only moves through movements
    pub async fn update_details(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
        update: BalanceDetailsUpdate,
    ) -> AppResult<StockItemView> {
        for attempt in 1..=self.max_attempts {
            let current = self.load_balance(site_id, balance_id).await?;
            let mut edited = current.clone();
            edited.apply_details(update.clone(), Utc::now())?;

            match self
                .store
                .update_balance_details(current.version, &edited)
                .await?
            {
                CommitOutcome::Committed => return self.view(edited).await,
                CommitOutcome::Conflict => {
                    tracing::debug!(%balance_id, attempt, "Balance changed concurrently, retrying edit");
                }
            }
        }

        Err(AppError::ConcurrentModification("Stock item".to_string()))
    }

    /// Re-copy name, unit and category from the catalog
    pub async fn resync_from_catalog(
        &self,
        site_id: Uuid,
        balance_id: Uuid,
    ) -> AppResult<StockItemView> {
        for attempt in 1..=self.max_attempts {
            let current = self.load_balance(site_id, balance_id).await?;
            let catalog = self
                .store
                .find_catalog_item(current.catalog_ref_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Catalog item".to_string()))?;

            let mut synced = current.clone();
            synced.resync_from(&catalog, Utc::now());

            match self
                .store
                .update_balance_details(current.version, &synced)
                .await?
            {
                CommitOutcome::Committed => {
                    tracing::info!(%balance_id, name = %synced.name, "Balance resynced from catalog");
                    return self.view(synced).await;
                }
                CommitOutcome::Conflict => {
                    tracing::debug!(%balance_id, attempt, "Balance changed concurrently, retrying resync");
                }
            }
        }

        Err(AppError::ConcurrentModification("Stock item".to_string()))
    }

    /// Remove a balance and its ledger from the site
    pub async fn detach(&self, site_id: Uuid, balance_id: Uuid) -> AppResult<()> {
        match self.store.detach_balance(site_id, balance_id).await? {
            DetachOutcome::Detached => {
                tracing::info!(%site_id, %balance_id, "Stock item detached");
                Ok(())
            }
            DetachOutcome::NotFound => Err(AppError::NotFound("Stock item".to_string())),
            DetachOutcome::HasOpenLoans => Err(AppError::InvalidStateTransition(
                "stock item still has open loans".to_string(),
            )),
        }
    }
}

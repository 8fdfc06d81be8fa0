//! Loan overlay service
//!
//! Loans shadow availability; they never touch a balance quantity.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shared::{
    classify_tool_category, EquipmentStatus, ItemOrigin, LoanRecord, LoanStatus, LoanTarget,
    LoanableItem, NewLoan, ToolClassifier,
};

use crate::error::{AppError, AppResult};
use crate::store::{CommitOutcome, Store};

/// Input for opening a loan
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLoanInput {
    pub item_origin: ItemOrigin,
    pub item_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub borrower_name: String,
    pub quantity: Decimal,
    pub loan_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<CreateLoanInput> for NewLoan {
    fn from(input: CreateLoanInput) -> Self {
        NewLoan {
            item_origin: input.item_origin,
            item_id: input.item_id,
            borrower_name: input.borrower_name,
            quantity: input.quantity,
            loan_date: input.loan_date,
            notes: input.notes,
        }
    }
}

/// Input for closing a loan; the date defaults to today
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReturnLoanInput {
    pub return_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub return_notes: Option<String>,
}

/// Loan service over any store
#[derive(Clone)]
pub struct LoanService {
    store: Arc<dyn Store>,
    classifier: ToolClassifier,
}

impl LoanService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            classifier: classify_tool_category,
        }
    }

    /// Swap the category rule deciding which items count as tools
    pub fn with_classifier(mut self, classifier: ToolClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Resolve the display name of the item a loan points at
    async fn item_name(&self, site_id: Uuid, target: LoanTarget) -> AppResult<String> {
        match target.origin {
            ItemOrigin::Owned => self
                .store
                .find_balance(site_id, target.item_id)
                .await?
                .map(|balance| balance.name)
                .ok_or_else(|| AppError::NotFound("Stock item".to_string())),
            ItemOrigin::Rented => {
                let batch = self
                    .store
                    .find_equipment(site_id, target.item_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Rented equipment".to_string()))?;
                batch.ensure_accepts_loans()?;
                Ok(batch.name)
            }
        }
    }

    /// Open a loan if the item has enough availability
    ///
    /// The store re-checks availability while holding the item, so two
    /// concurrent requests cannot both take the last units.
    pub async fn create_loan(&self, site_id: Uuid, input: CreateLoanInput) -> AppResult<LoanRecord> {
        input.validate()?;
        let request = NewLoan::from(input);
        let target = request.target();

        let item_name = self.item_name(site_id, target).await?;
        let loan = LoanRecord::open(site_id, request, item_name, Utc::now())?;

        if let Err(err) = self.store.insert_loan_checked(&loan).await {
            if let AppError::InsufficientStock {
                requested,
                available,
            } = &err
            {
                tracing::warn!(
                    item_id = %loan.item_id,
                    %requested,
                    %available,
                    "Loan rejected, not enough available"
                );
            }
            return Err(err);
        }

        tracing::info!(
            loan_id = %loan.id,
            item_id = %loan.item_id,
            origin = loan.item_origin.as_str(),
            quantity = %loan.quantity,
            "Loan opened"
        );
        Ok(loan)
    }

    /// OPEN → RETURNED
    pub async fn return_loan(
        &self,
        site_id: Uuid,
        loan_id: Uuid,
        input: ReturnLoanInput,
    ) -> AppResult<LoanRecord> {
        input.validate()?;
        let mut loan = self.get_loan(site_id, loan_id).await?;

        let return_date = input
            .return_date
            .unwrap_or_else(|| Utc::now().date_naive());
        loan.mark_returned(return_date, input.return_notes)?;

        match self.store.record_return(&loan).await? {
            CommitOutcome::Committed => {
                tracing::info!(%loan_id, %return_date, "Loan returned");
                Ok(loan)
            }
            CommitOutcome::Conflict => Err(AppError::InvalidStateTransition(
                "loan has already been returned".to_string(),
            )),
        }
    }

    pub async fn get_loan(&self, site_id: Uuid, loan_id: Uuid) -> AppResult<LoanRecord> {
        self.store
            .find_loan(site_id, loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Loan".to_string()))
    }

    pub async fn list_loans(
        &self,
        site_id: Uuid,
        status: Option<LoanStatus>,
    ) -> AppResult<Vec<LoanRecord>> {
        self.store.list_loans(site_id, status).await
    }

    /// Owned tool balances and active tool batches with their availability
    pub async fn list_loanable_items(&self, site_id: Uuid) -> AppResult<Vec<LoanableItem>> {
        let committed = self.store.committed_by_target(site_id).await?;
        let committed_for =
            |target: &LoanTarget| committed.get(target).copied().unwrap_or(Decimal::ZERO);

        let mut items: Vec<LoanableItem> = self
            .store
            .list_balances(site_id)
            .await?
            .into_iter()
            .filter(|balance| balance.is_tool_with(self.classifier))
            .map(|balance| {
                let target = LoanTarget::owned(balance.id);
                LoanableItem::new(
                    target,
                    balance.name,
                    balance.unit,
                    balance.category,
                    balance.quantity,
                    committed_for(&target),
                )
            })
            .collect();

        let batches = self
            .store
            .list_equipment(site_id, Some(EquipmentStatus::Active))
            .await?;
        items.extend(
            batches
                .into_iter()
                .filter(|batch| batch.is_tool_with(self.classifier))
                .map(|batch| {
                    let target = LoanTarget::rented(batch.id);
                    LoanableItem::new(
                        target,
                        batch.name,
                        batch.unit,
                        batch.category,
                        batch.quantity,
                        committed_for(&target),
                    )
                }),
        );

        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}

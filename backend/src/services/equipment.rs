//! Rented equipment lifecycle service

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared::{
    available, classify_tool_category, EquipmentEntry, EquipmentExit, EquipmentStatus,
    LoanTarget, RentedEquipmentRecord, ToolClassifier, ToolFlag,
};

use crate::error::{AppError, AppResult};
use crate::store::{CommitOutcome, Store};

/// Input for overriding or clearing the tool flag
#[derive(Debug, Deserialize)]
pub struct ToolFlagInput {
    /// `null` hands the decision back to the category
    #[serde(default)]
    pub is_tool: ToolFlag,
}

/// A batch with its resolved tool flag and loan overlay
#[derive(Debug, Clone, Serialize)]
pub struct EquipmentView {
    #[serde(flatten)]
    pub record: RentedEquipmentRecord,
    pub loanable_as_tool: bool,
    pub committed: Decimal,
    pub available: Decimal,
}

#[derive(Clone)]
pub struct EquipmentService {
    store: Arc<dyn Store>,
    classifier: ToolClassifier,
}

impl EquipmentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            classifier: classify_tool_category,
        }
    }

    /// Category rule for batches whose tool flag is unset; keep it in step
    /// with the loan service
    pub fn with_classifier(mut self, classifier: ToolClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    async fn view(&self, record: RentedEquipmentRecord) -> AppResult<EquipmentView> {
        let committed = self
            .store
            .committed_quantity(record.site_id, LoanTarget::rented(record.id))
            .await?;
        Ok(EquipmentView {
            loanable_as_tool: record.is_active() && record.is_tool_with(self.classifier),
            available: if record.is_active() {
                available(record.quantity, committed)
            } else {
                Decimal::ZERO
            },
            committed,
            record,
        })
    }

    async fn load(&self, site_id: Uuid, equipment_id: Uuid) -> AppResult<RentedEquipmentRecord> {
        self.store
            .find_equipment(site_id, equipment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Rented equipment".to_string()))
    }

    /// Register the arrival of a rented batch
    pub async fn register_entry(
        &self,
        site_id: Uuid,
        entry: EquipmentEntry,
    ) -> AppResult<EquipmentView> {
        let record = RentedEquipmentRecord::register_entry(site_id, entry, Utc::now())?;
        self.store.insert_equipment(&record).await?;

        tracing::info!(
            %site_id,
            equipment_id = %record.id,
            name = %record.name,
            quantity = %record.quantity,
            "Rented equipment entered"
        );
        self.view(record).await
    }

    /// ACTIVE → RETURNED; open loans against the batch stay valid
    pub async fn register_exit(
        &self,
        site_id: Uuid,
        equipment_id: Uuid,
        exit: EquipmentExit,
    ) -> AppResult<EquipmentView> {
        let mut record = self.load(site_id, equipment_id).await?;
        record.register_exit(exit, Utc::now())?;

        match self.store.record_exit(&record).await? {
            CommitOutcome::Committed => {
                tracing::info!(%equipment_id, "Rented equipment returned to supplier");
                self.view(record).await
            }
            CommitOutcome::Conflict => Err(AppError::InvalidStateTransition(
                "equipment has already been returned".to_string(),
            )),
        }
    }

    pub async fn get(&self, site_id: Uuid, equipment_id: Uuid) -> AppResult<EquipmentView> {
        let record = self.load(site_id, equipment_id).await?;
        self.view(record).await
    }

    pub async fn list(
        &self,
        site_id: Uuid,
        status: Option<EquipmentStatus>,
    ) -> AppResult<Vec<EquipmentView>> {
        let records = self.store.list_equipment(site_id, status).await?;
        let mut views = Vec::with_capacity(records.len());
        for record in records {
            views.push(self.view(record).await?);
        }
        Ok(views)
    }

    pub async fn set_tool_flag(
        &self,
        site_id: Uuid,
        equipment_id: Uuid,
        flag: ToolFlag,
    ) -> AppResult<EquipmentView> {
        if !self
            .store
            .update_tool_flag(site_id, equipment_id, flag)
            .await?
        {
            return Err(AppError::NotFound("Rented equipment".to_string()));
        }
        tracing::debug!(%equipment_id, is_tool = ?flag.as_option(), "Tool flag updated");
        self.get(site_id, equipment_id).await
    }
}

//! Rented equipment batches tracked by entry and exit

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::validation::{
    normalize_optional_text, validate_date_order, validate_positive_quantity,
    validate_required_text,
};

/// Batch lifecycle; `Returned` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentStatus {
    Active,
    Returned,
}

impl EquipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Active => "active",
            EquipmentStatus::Returned => "returned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(EquipmentStatus::Active),
            "returned" => Some(EquipmentStatus::Returned),
            _ => None,
        }
    }
}

/// Classifies a category string as "tool" or not
pub type ToolClassifier = fn(&str) -> bool;

/// Category fragments that mark a batch or material as a tool
pub const TOOL_CATEGORY_KEYWORDS: &[&str] = &["ferrament", "tool", "maquin", "máquin"];

/// Default keyword classifier over a category name
pub fn classify_tool_category(category: &str) -> bool {
    let category = category.to_lowercase();
    TOOL_CATEGORY_KEYWORDS
        .iter()
        .any(|keyword| category.contains(keyword))
}

/// Whether a batch is loanable as a tool
///
/// Stored and serialized as a nullable boolean; `null` means the category
/// decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum ToolFlag {
    Explicit(bool),
    #[default]
    Inferred,
}

impl ToolFlag {
    pub fn resolve(self, category: &str, classifier: ToolClassifier) -> bool {
        match self {
            ToolFlag::Explicit(value) => value,
            ToolFlag::Inferred => classifier(category),
        }
    }

    pub fn as_option(self) -> Option<bool> {
        self.into()
    }
}

impl From<Option<bool>> for ToolFlag {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(v) => ToolFlag::Explicit(v),
            None => ToolFlag::Inferred,
        }
    }
}

impl From<ToolFlag> for Option<bool> {
    fn from(flag: ToolFlag) -> Self {
        match flag {
            ToolFlag::Explicit(v) => Some(v),
            ToolFlag::Inferred => None,
        }
    }
}

/// A batch of identical rented units present on a site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RentedEquipmentRecord {
    pub id: Uuid,
    pub site_id: Uuid,
    pub name: String,
    pub supplier: String,
    pub category: String,
    pub unit: String,
    /// Units in the batch; stands in for a balance in availability checks
    pub quantity: Decimal,
    pub entry_date: NaiveDate,
    pub entry_photos: Vec<String>,
    pub exit_date: Option<NaiveDate>,
    pub exit_photos: Vec<String>,
    pub status: EquipmentStatus,
    pub is_tool: ToolFlag,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entry registration for a rented batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentEntry {
    pub name: String,
    pub supplier: String,
    pub category: String,
    pub unit: String,
    pub quantity: Decimal,
    pub entry_date: NaiveDate,
    /// Photo URLs; the upload itself happens elsewhere
    #[serde(default)]
    pub entry_photos: Vec<String>,
    #[serde(default)]
    pub is_tool: ToolFlag,
    pub notes: Option<String>,
}

/// Exit registration for a rented batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentExit {
    pub exit_date: NaiveDate,
    #[serde(default)]
    pub exit_photos: Vec<String>,
}

impl RentedEquipmentRecord {
    pub fn register_entry(
        site_id: Uuid,
        entry: EquipmentEntry,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        validate_required_text("name", &entry.name)?;
        validate_required_text("supplier", &entry.supplier)?;
        validate_required_text("category", &entry.category)?;
        validate_required_text("unit", &entry.unit)?;
        validate_positive_quantity(entry.quantity)?;

        Ok(Self {
            id: Uuid::new_v4(),
            site_id,
            name: entry.name.trim().to_string(),
            supplier: entry.supplier.trim().to_string(),
            category: entry.category.trim().to_string(),
            unit: entry.unit.trim().to_string(),
            quantity: entry.quantity,
            entry_date: entry.entry_date,
            entry_photos: clean_photos(entry.entry_photos),
            exit_date: None,
            exit_photos: Vec::new(),
            status: EquipmentStatus::Active,
            is_tool: entry.is_tool,
            notes: normalize_optional_text(entry.notes),
            created_at: now,
            updated_at: now,
        })
    }

    /// ACTIVE → RETURNED; additional photos are appended
    pub fn register_exit(
        &mut self,
        exit: EquipmentExit,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if self.status == EquipmentStatus::Returned {
            return Err(LedgerError::InvalidStateTransition(
                "equipment has already been returned",
            ));
        }
        validate_date_order("exit_date", self.entry_date, exit.exit_date)?;

        self.status = EquipmentStatus::Returned;
        self.exit_date = Some(exit.exit_date);
        self.exit_photos.extend(clean_photos(exit.exit_photos));
        self.updated_at = now;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == EquipmentStatus::Active
    }

    pub fn is_tool(&self) -> bool {
        self.is_tool_with(classify_tool_category)
    }

    pub fn is_tool_with(&self, classifier: ToolClassifier) -> bool {
        self.is_tool.resolve(&self.category, classifier)
    }

    /// Returned batches are never offered for new loans
    pub fn ensure_accepts_loans(&self) -> Result<(), LedgerError> {
        if !self.is_active() {
            return Err(LedgerError::InvalidStateTransition(
                "returned equipment cannot be loaned",
            ));
        }
        Ok(())
    }
}

fn clean_photos(photos: Vec<String>) -> Vec<String> {
    photos
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

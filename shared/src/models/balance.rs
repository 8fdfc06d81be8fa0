//! Per-site balance records and low-stock derivation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{available, CatalogItem, ToolClassifier};
use crate::error::LedgerError;
use crate::validation::{validate_non_negative, validate_required_text};

/// Current on-hand quantity of one material at one site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceRecord {
    pub id: Uuid,
    pub site_id: Uuid,
    pub catalog_ref_id: Uuid,
    pub name: String,
    pub unit: String,
    pub category: String,
    /// Always equals the signed sum of this record's movements
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub min_threshold: Decimal,
    /// Bumped on every committed write; the compare-and-swap key for updates
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BalanceRecord {
    /// Attach a catalog item to a site with an empty balance
    ///
    /// Name, unit and category are copied from the catalog here and never
    /// refreshed implicitly. Any opening stock is posted afterwards as an IN
    /// movement so the ledger accounts for it.
    pub fn attach(
        site_id: Uuid,
        catalog: &CatalogItem,
        min_threshold: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        validate_non_negative("min_threshold", min_threshold)?;
        let fields = catalog.denormalized_fields();

        Ok(Self {
            id: Uuid::new_v4(),
            site_id,
            catalog_ref_id: catalog.id,
            name: fields.name,
            unit: fields.unit,
            category: fields.category,
            quantity: Decimal::ZERO,
            average_price: catalog.unit_value.max(Decimal::ZERO),
            min_threshold,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Re-copy the denormalized catalog fields on explicit request
    pub fn resync_from(&mut self, catalog: &CatalogItem, now: DateTime<Utc>) {
        let fields = catalog.denormalized_fields();
        self.name = fields.name;
        self.unit = fields.unit;
        self.category = fields.category;
        self.version += 1;
        self.updated_at = now;
    }

    /// Administrative edit of everything except the quantity
    pub fn apply_details(
        &mut self,
        update: BalanceDetailsUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if let Some(name) = &update.name {
            validate_required_text("name", name)?;
        }
        if let Some(unit) = &update.unit {
            validate_required_text("unit", unit)?;
        }
        if let Some(min_threshold) = update.min_threshold {
            validate_non_negative("min_threshold", min_threshold)?;
        }
        if let Some(average_price) = update.average_price {
            validate_non_negative("average_price", average_price)?;
        }

        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(unit) = update.unit {
            self.unit = unit.trim().to_string();
        }
        if let Some(category) = update.category {
            self.category = category.trim().to_string();
        }
        if let Some(min_threshold) = update.min_threshold {
            self.min_threshold = min_threshold;
        }
        if let Some(average_price) = update.average_price {
            self.average_price = average_price;
        }
        self.version += 1;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_low_stock(&self) -> bool {
        is_low_stock(self.quantity, self.min_threshold)
    }

    /// Value of the stock on hand at the average price
    pub fn stock_value(&self) -> Decimal {
        self.quantity * self.average_price
    }

    /// Whether this material is offered for tool loans
    pub fn is_tool_with(&self, classifier: ToolClassifier) -> bool {
        classifier(&self.category)
    }
}

/// Low-stock alert rule
///
/// A zero threshold means "no alert configured".
pub fn is_low_stock(quantity: Decimal, min_threshold: Decimal) -> bool {
    min_threshold > Decimal::ZERO && quantity <= min_threshold
}

/// Administrative changes to a balance record; quantity is deliberately absent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceDetailsUpdate {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub min_threshold: Option<Decimal>,
    pub average_price: Option<Decimal>,
}

/// A balance decorated with its loan overlay and alert state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockItemView {
    #[serde(flatten)]
    pub balance: BalanceRecord,
    /// Sum of open loans against this balance
    pub committed: Decimal,
    pub available: Decimal,
    pub is_low_stock: bool,
}

impl StockItemView {
    pub fn new(balance: BalanceRecord, committed: Decimal) -> Self {
        let is_low_stock = balance.is_low_stock();
        Self {
            available: available(balance.quantity, committed),
            committed,
            is_low_stock,
            balance,
        }
    }
}

//! Global material catalog

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A material definition shared by every site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: Uuid,
    pub name: String,
    /// Unit of measure (e.g. "saco", "m³", "un")
    pub unit: String,
    pub category: String,
    /// Reference unit price, copied into a balance's average price on attach
    pub unit_value: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Fields a site balance copies from the catalog
///
/// The copy happens once, at attach time (or on an explicit resync); the
/// catalog is never joined at read time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogFields {
    pub name: String,
    pub unit: String,
    pub category: String,
}

impl CatalogItem {
    pub fn denormalized_fields(&self) -> CatalogFields {
        CatalogFields {
            name: self.name.clone(),
            unit: self.unit.clone(),
            category: self.category.clone(),
        }
    }
}

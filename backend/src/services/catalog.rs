//! Global material catalog

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shared::{validate_non_negative, CatalogItem};

use crate::error::{AppError, AppResult};
use crate::store::Store;

/// Input for creating a catalog item
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCatalogItemInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub unit: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub category: String,
    pub unit_value: Option<Decimal>,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, input: CreateCatalogItemInput) -> AppResult<CatalogItem> {
        input.validate()?;
        let unit_value = input.unit_value.unwrap_or(Decimal::ZERO);
        validate_non_negative("unit_value", unit_value)?;

        let name = input.name.trim().to_string();
        let unit = input.unit.trim().to_string();
        if name.is_empty() || unit.is_empty() {
            return Err(AppError::Validation {
                field: if name.is_empty() { "name" } else { "unit" }.to_string(),
                message: "Name and unit cannot be blank".to_string(),
                message_pt: "Nome e unidade são obrigatórios".to_string(),
            });
        }

        let item = CatalogItem {
            id: Uuid::new_v4(),
            name,
            unit,
            category: input.category.trim().to_string(),
            unit_value,
            created_at: Utc::now(),
        };
        self.store.insert_catalog_item(&item).await?;

        tracing::info!(catalog_id = %item.id, name = %item.name, "Catalog item created");
        Ok(item)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<CatalogItem> {
        self.store
            .find_catalog_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Catalog item".to_string()))
    }

    pub async fn list(&self) -> AppResult<Vec<CatalogItem>> {
        self.store.list_catalog_items().await
    }
}

//! WebAssembly module for the Site Stock platform
//!
//! Lets browser forms run the same ledger rules as the server:
//! - availability and low-stock derivation
//! - tool classification of categories
//! - previews of movements and count corrections before submitting
//!
//! Quantities cross the boundary as decimal strings so no precision is lost.

use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

fn to_js(err: String) -> JsValue {
    JsValue::from_str(&err)
}

/// Balance figures after a previewed movement
#[derive(Debug, Serialize, PartialEq)]
struct MovementPreview {
    quantity: Decimal,
    average_price: Decimal,
    is_low_stock: bool,
}

/// Synthetic movement a count correction would post
#[derive(Debug, Serialize, PartialEq)]
struct AdjustmentPreview {
    movement_type: MovementType,
    quantity: Decimal,
}

fn available_for(capacity: &str, committed: &str) -> Result<Decimal, String> {
    Ok(available(
        parse_decimal("capacity", capacity)?,
        parse_decimal("committed", committed)?,
    ))
}

fn low_stock_for(quantity: &str, min_threshold: &str) -> Result<bool, String> {
    Ok(is_low_stock(
        parse_decimal("quantity", quantity)?,
        parse_decimal("min_threshold", min_threshold)?,
    ))
}

fn preview_for(
    balance_json: &str,
    movement_type: &str,
    quantity: &str,
    unit_price: Option<String>,
) -> Result<MovementPreview, String> {
    let balance: BalanceRecord =
        serde_json::from_str(balance_json).map_err(|e| format!("Invalid balance JSON: {}", e))?;
    let movement_type = MovementType::parse(movement_type)
        .ok_or_else(|| format!("Unknown movement type: {}", movement_type))?;
    let unit_price = unit_price
        .as_deref()
        .map(|p| parse_decimal("unit_price", p))
        .transpose()?;

    let draft = MovementDraft::new(movement_type, parse_decimal("quantity", quantity)?)
        .with_unit_price(unit_price);
    let planned = balance
        .plan_movement(draft, Utc::now())
        .map_err(|e| e.to_string())?;

    Ok(MovementPreview {
        quantity: planned.balance.quantity,
        average_price: planned.balance.average_price,
        is_low_stock: planned.balance.is_low_stock(),
    })
}

fn adjustment_for(current: &str, target: &str) -> Result<Option<AdjustmentPreview>, String> {
    let draft = adjustment_draft(
        parse_decimal("current", current)?,
        parse_decimal("target", target)?,
    )
    .map_err(|e| e.to_string())?;

    Ok(draft.map(|d| AdjustmentPreview {
        movement_type: d.movement_type,
        quantity: d.quantity,
    }))
}

/// Quantity still available for loans: capacity minus open loans, never negative
#[wasm_bindgen]
pub fn available_quantity(capacity: &str, committed: &str) -> Result<String, JsValue> {
    available_for(capacity, committed)
        .map(|q| q.to_string())
        .map_err(to_js)
}

/// Low-stock alert rule; a zero threshold never alerts
#[wasm_bindgen]
pub fn is_low_stock_quantity(quantity: &str, min_threshold: &str) -> Result<bool, JsValue> {
    low_stock_for(quantity, min_threshold).map_err(to_js)
}

/// Whether a category reads as a tool category
#[wasm_bindgen]
pub fn is_tool_category(category: &str) -> bool {
    classify_tool_category(category)
}

/// Resolve a nullable tool flag the way the server does
#[wasm_bindgen]
pub fn resolve_tool_flag(is_tool: Option<bool>, category: &str) -> bool {
    ToolFlag::from(is_tool).resolve(category, classify_tool_category)
}

/// Preview a movement against a balance as returned by the API
///
/// Returns the resulting balance figures as JSON, or the ledger's rejection
/// (e.g. insufficient stock) as an error.
#[wasm_bindgen]
pub fn preview_movement(
    balance_json: &str,
    movement_type: &str,
    quantity: &str,
    unit_price: Option<String>,
) -> Result<String, JsValue> {
    let preview = preview_for(balance_json, movement_type, quantity, unit_price).map_err(|err| {
        web_sys::console::debug_1(&JsValue::from_str(&err));
        to_js(err)
    })?;
    serde_json::to_string(&preview).map_err(|e| to_js(e.to_string()))
}

/// Preview the movement a count correction would post; `null` when the count
/// already matches
#[wasm_bindgen]
pub fn preview_adjustment(current: &str, target: &str) -> Result<String, JsValue> {
    let preview = adjustment_for(current, target).map_err(to_js)?;
    serde_json::to_string(&preview).map_err(|e| to_js(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn balance_json(quantity: i64, min_threshold: i64) -> String {
        let catalog = CatalogItem {
            id: Uuid::new_v4(),
            name: "Luva de raspa".into(),
            unit: "par".into(),
            category: "EPI".into(),
            unit_value: Decimal::from(12),
            created_at: Utc::now(),
        };
        let mut balance =
            BalanceRecord::attach(Uuid::new_v4(), &catalog, Decimal::from(min_threshold), Utc::now())
                .unwrap();
        balance.quantity = Decimal::from(quantity);
        serde_json::to_string(&balance).unwrap()
    }

    #[test]
    fn test_available_quantity() {
        assert_eq!(available_for("20", "6").unwrap(), Decimal::from(14));
        assert_eq!(available_for("4", "6").unwrap(), Decimal::ZERO);
        assert!(available_for("abc", "1").is_err());
    }

    #[test]
    fn test_low_stock() {
        assert!(low_stock_for("10", "20").unwrap());
        assert!(!low_stock_for("25", "20").unwrap());
        assert!(!low_stock_for("0", "0").unwrap());
    }

    #[test]
    fn test_tool_classification() {
        assert!(is_tool_category("Ferramentas elétricas"));
        assert!(!is_tool_category("Cimento"));
        assert!(resolve_tool_flag(Some(true), "Andaimes"));
        assert!(!resolve_tool_flag(Some(false), "Ferramentas"));
        assert!(resolve_tool_flag(None, "Máquinas"));
    }

    #[test]
    fn test_preview_movement() {
        let json = balance_json(10, 20);

        let preview = preview_for(&json, "in", "15", None).unwrap();
        assert_eq!(preview.quantity, Decimal::from(25));
        assert!(!preview.is_low_stock);

        let rejected = preview_for(&json, "out", "12", None);
        assert!(rejected.unwrap_err().contains("Insufficient stock"));
    }

    #[test]
    fn test_preview_adjustment() {
        let preview = adjustment_for("12", "9").unwrap().unwrap();
        assert_eq!(preview.movement_type, MovementType::Out);
        assert_eq!(preview.quantity, Decimal::from(3));

        assert_eq!(adjustment_for("9", "9").unwrap(), None);
    }
}

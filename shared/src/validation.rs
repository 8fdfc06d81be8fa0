//! Validation utilities for the stock ledger
//!
//! Field-level checks shared by the backend services and the browser forms.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::LedgerError;

// ============================================================================
// Quantity Validations
// ============================================================================

/// Decimal places stored for quantities and prices (`NUMERIC(18, 4)`)
pub const MAX_DECIMAL_PLACES: u32 = 4;

/// Validate that a value fits the stored precision without rounding
///
/// Trailing zeros do not count, so `1.50000` is accepted.
pub fn validate_decimal_places(field: &'static str, value: Decimal) -> Result<(), LedgerError> {
    if value.normalize().scale() > MAX_DECIMAL_PLACES {
        return Err(LedgerError::invalid(
            field,
            "cannot have more than 4 decimal places",
        ));
    }
    Ok(())
}

/// Validate that a movement or loan quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), LedgerError> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid("quantity", "must be greater than zero"));
    }
    validate_decimal_places("quantity", quantity)
}

/// Validate that a threshold, price or balance is not negative
pub fn validate_non_negative(field: &'static str, value: Decimal) -> Result<(), LedgerError> {
    if value < Decimal::ZERO {
        return Err(LedgerError::invalid(field, "cannot be negative"));
    }
    validate_decimal_places(field, value)
}

// ============================================================================
// Text and Date Validations
// ============================================================================

/// Validate that a required text field is not blank
pub fn validate_required_text(field: &'static str, value: &str) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(LedgerError::invalid(field, "is required"));
    }
    Ok(())
}

/// Validate that a closing date does not precede its opening date
pub fn validate_date_order(
    field: &'static str,
    opened: NaiveDate,
    closed: NaiveDate,
) -> Result<(), LedgerError> {
    if closed < opened {
        return Err(LedgerError::invalid(field, "cannot be earlier than the start date"));
    }
    Ok(())
}

/// Trim free text and drop it entirely when nothing is left
pub fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

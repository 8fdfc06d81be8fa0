//! Errors raised by the pure ledger rules
//!
//! The backend maps these onto HTTP responses; the browser bindings map them
//! onto `JsValue` messages.

use rust_decimal::Decimal;
use thiserror::Error;

/// Domain rule violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// An OUT movement or a loan asks for more than the item can give
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid {field}: {message}")]
    InvalidInput {
        field: &'static str,
        message: &'static str,
    },

    /// A one-directional lifecycle was asked to move backwards or twice
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(&'static str),
}

impl LedgerError {
    pub fn invalid(field: &'static str, message: &'static str) -> Self {
        LedgerError::InvalidInput { field, message }
    }
}

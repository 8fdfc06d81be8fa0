//! Shared types and ledger rules for the Site Stock platform
//!
//! This crate contains the pure domain of the per-site stock ledger: balance
//! records, the append-only movement ledger, the loan overlay, rented
//! equipment batches and the availability/alert derivations. It performs no
//! I/O and is shared between the backend and the browser (via WASM).

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;

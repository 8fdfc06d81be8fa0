//! Domain models for the per-site stock ledger

mod balance;
mod catalog;
mod equipment;
mod loan;
mod movement;

pub use balance::*;
pub use catalog::*;
pub use equipment::*;
pub use loan::*;
pub use movement::*;

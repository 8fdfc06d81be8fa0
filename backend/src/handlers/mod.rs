//! HTTP handlers for the Site Stock API

pub mod catalog;
pub mod equipment;
pub mod health;
pub mod loan;
pub mod reporting;
pub mod stock;

pub use catalog::*;
pub use equipment::*;
pub use health::*;
pub use loan::*;
pub use reporting::*;
pub use stock::*;

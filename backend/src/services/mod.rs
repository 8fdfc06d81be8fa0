//! Ledger services for the Site Stock platform

pub mod catalog;
pub mod equipment;
pub mod loan;
pub mod reporting;
pub mod stock;

pub use catalog::CatalogService;
pub use equipment::EquipmentService;
pub use loan::LoanService;
pub use reporting::ReportingService;
pub use stock::StockService;

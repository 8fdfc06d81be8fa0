//! Site Stock - Backend
//!
//! Per-site stock ledger for construction sites: balances, an append-only
//! movement ledger, tool loans, EPI withdrawals and rented equipment.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;

use services::{CatalogService, EquipmentService, LoanService, ReportingService, StockService};
use store::{MemoryStore, Store};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Present when the store is PostgreSQL; used by the health check
    pub db: Option<sqlx::PgPool>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, db: Option<sqlx::PgPool>, config: Config) -> Self {
        Self {
            store,
            db,
            config: Arc::new(config),
        }
    }

    /// State over a fresh in-memory store
    pub fn in_memory(config: Config) -> Self {
        Self::new(Arc::new(MemoryStore::new()), None, config)
    }

    pub fn stock_service(&self) -> StockService {
        StockService::new(self.store.clone(), self.config.ledger.max_commit_attempts)
    }

    pub fn loan_service(&self) -> LoanService {
        LoanService::new(self.store.clone())
    }

    pub fn equipment_service(&self) -> EquipmentService {
        EquipmentService::new(self.store.clone())
    }

    pub fn catalog_service(&self) -> CatalogService {
        CatalogService::new(self.store.clone())
    }

    pub fn reporting_service(&self) -> ReportingService {
        ReportingService::new(self.store.clone(), self.stock_service())
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Site Stock API v1.0"
}

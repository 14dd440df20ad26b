//! HTTP API Layer
//!
//! A thin Axum surface over the adjudication library.
//!
//! # Architecture
//!
//! - **Handlers**: adjudication preview, invoice lifecycle, ceiling inquiry,
//!   interaction screening and condition eligibility diagnostics
//! - **Middleware**: JWT authentication and audit logging
//! - **DTOs**: request validation and response shapes
//! - **Error Handling**: domain errors mapped to HTTP status codes
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState, Ports};
//!
//! let state = AppState::new(config, Ports::postgres(pool));
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use chrono::NaiveDate;
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use core_kernel::{HealthCheckResult, Timezone};
use domain_adjudication::{EmployeePort, InvoiceAdjudicator, InvoicePort, InvoiceService, UsageHistoryPort};
use domain_insurance::{CeilingLedger, CeilingStore};
use domain_pricing::PricingCatalogPort;
use infra_db::{PostgresCatalogAdapter, PostgresCeilingStore, PostgresEmployeeAdapter, PostgresInvoiceAdapter};

use crate::config::ApiConfig;
use crate::middleware::{auth_middleware, audit_middleware};
use crate::handlers::{adjudication, health, insurance, invoices};

/// The port implementations the API runs against
#[derive(Clone)]
pub struct Ports {
    pub catalog: Arc<dyn PricingCatalogPort>,
    pub ceiling: Arc<dyn CeilingStore>,
    pub invoices: Arc<dyn InvoicePort>,
    pub usage: Arc<dyn UsageHistoryPort>,
    pub employees: Arc<dyn EmployeePort>,
}

impl Ports {
    /// PostgreSQL adapters sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        let invoices = Arc::new(PostgresInvoiceAdapter::new(pool.clone()));
        Self {
            catalog: Arc::new(PostgresCatalogAdapter::new(pool.clone())),
            ceiling: Arc::new(PostgresCeilingStore::new(pool.clone())),
            invoices: invoices.clone(),
            usage: invoices,
            employees: Arc::new(PostgresEmployeeAdapter::new(pool)),
        }
    }

    pub async fn health(&self) -> Vec<HealthCheckResult> {
        vec![
            self.catalog.health_check().await,
            self.ceiling.health_check().await,
            self.invoices.health_check().await,
            self.usage.health_check().await,
            self.employees.health_check().await,
        ]
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub ports: Ports,
    pub service: InvoiceService,
    timezone: Timezone,
}

impl AppState {
    pub fn new(config: ApiConfig, ports: Ports) -> Self {
        let ledger = CeilingLedger::new(ports.ceiling.clone());
        let adjudicator = InvoiceAdjudicator::new(
            ports.catalog.clone(),
            ports.usage.clone(),
            ledger,
            config.adjudication_settings(),
        );
        let service = InvoiceService::new(ports.invoices.clone(), ports.employees.clone(), adjudicator);
        let timezone = config.timezone();
        Self { config, ports, service, timezone }
    }

    /// Service date used when a request omits one
    pub fn today(&self) -> NaiveDate {
        self.timezone.today()
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let invoice_routes = Router::new()
        .route("/", post(invoices::create_invoice))
        .route("/:id", get(invoices::get_invoice))
        .route("/:id/calculate", post(invoices::calculate_invoice))
        .route("/:id/submit", post(invoices::submit_invoice))
        .route("/:id/approve", post(invoices::approve_invoice))
        .route("/:id/reject", post(invoices::reject_invoice))
        .route("/:id/cancel", post(invoices::cancel_invoice));

    let api_routes = Router::new()
        .route("/adjudications/preview", post(adjudication::preview))
        .route("/interactions/screen", post(adjudication::screen_interactions))
        .route("/conditions/:id/eligibility", post(adjudication::condition_eligibility))
        .route("/insurances/:id/ceiling", get(insurance::get_ceiling))
        .nest("/invoices", invoice_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

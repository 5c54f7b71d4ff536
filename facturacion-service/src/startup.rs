//! Application startup and lifecycle management.

use crate::config::FacturacionConfig;
use crate::handlers::{self, bulk, invoices};
use crate::services::{
    init_metrics, Database, InvoiceStore, MemoryInvoiceStore, MockNotifier, Notifier,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use service_core::permissions::PermissionChecker;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: FacturacionConfig,
    pub store: Arc<dyn InvoiceStore>,
    pub notifier: Arc<dyn Notifier>,
    pub permissions: PermissionChecker,
}

/// Builds the HTTP router for the given state.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.bulk.max_file_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route(
            "/facturas",
            get(invoices::list_invoices).post(invoices::create_invoice),
        )
        .route(
            "/facturas/:id",
            get(invoices::get_invoice)
                .put(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        )
        .route("/facturas/carga-masiva", post(bulk::commit_bulk))
        .route("/facturas/carga-masiva/validar", post(bulk::validate_bulk))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    ///
    /// Registers metrics, connects the store (running migrations) and binds the
    /// listener. Safe to call more than once per process.
    pub async fn build(config: FacturacionConfig) -> Result<Self, AppError> {
        init_metrics();

        let (store, notifier): (Arc<dyn InvoiceStore>, Arc<dyn Notifier>) =
            match config.database.url.as_deref() {
                Some(url) => {
                    let db = Database::new(
                        url,
                        config.database.max_connections,
                        config.database.min_connections,
                    )
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                        e
                    })?;

                    db.run_migrations().await.map_err(|e| {
                        tracing::error!(error = %e, "Failed to run migrations");
                        e
                    })?;

                    let db = Arc::new(db);
                    let store: Arc<dyn InvoiceStore> = db.clone();
                    let notifier: Arc<dyn Notifier> = db;
                    (store, notifier)
                }
                None => {
                    tracing::warn!("DATABASE_URL not set, using in-memory invoice store");
                    (
                        Arc::new(MemoryInvoiceStore::new()),
                        Arc::new(MockNotifier::default()),
                    )
                }
            };

        Self::build_with(config, store, notifier).await
    }

    /// Build the application around already constructed collaborators.
    pub async fn build_with(
        config: FacturacionConfig,
        store: Arc<dyn InvoiceStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let permissions = PermissionChecker::new(config.auth.enforce_permissions);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Facturacion service listener bound");

        Ok(Self {
            http_port,
            http_listener,
            state: AppState {
                config,
                store,
                notifier,
                permissions,
            },
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        tracing::info!(
            service = "facturacion-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.http_listener, app).await
    }
}

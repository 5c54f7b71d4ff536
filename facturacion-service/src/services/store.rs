//! Persistence seam for invoices.

use crate::models::{Invoice, ListInvoicesFilter};
use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

/// Invoice storage. Implementations must reject a second invoice with the same
/// `numero_comprobante` with [`AppError::Conflict`], atomically with the write.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    /// Inserts a fully materialized invoice (id, timestamps and balance already set).
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<Invoice, AppError>;

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError>;

    async fn find_by_numero(&self, numero_comprobante: &str) -> Result<Option<Invoice>, AppError>;

    /// Overwrites the stored row with the same id. Returns `None` if it no longer exists.
    async fn update_invoice(&self, invoice: &Invoice) -> Result<Option<Invoice>, AppError>;

    /// Returns whether a row was removed.
    async fn delete_invoice(&self, id: Uuid) -> Result<bool, AppError>;

    /// Newest first, honoring `limit`/`offset`.
    async fn list_invoices(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError>;
}

/// Error reported when a business key is already taken.
pub fn duplicate_numero(numero_comprobante: &str) -> AppError {
    AppError::Conflict(anyhow::anyhow!(
        "Número de comprobante {} ya existe",
        numero_comprobante
    ))
}

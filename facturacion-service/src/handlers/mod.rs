//! HTTP handlers for facturacion-service.

pub mod bulk;
pub mod health;
pub mod invoices;

pub use health::{health_check, metrics_handler, readiness_check};

use crate::services::metrics::record_error;
use service_core::error::AppError;

/// Counts a failed request by error kind and hands the error back.
pub(crate) fn track(err: AppError) -> AppError {
    record_error(err.kind());
    err
}

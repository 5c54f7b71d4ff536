//! Prometheus metrics for facturacion-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Invoices written, by resulting estatus and origin (single, bulk).
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "facturacion_invoices_total",
        "Total number of invoices created by status and origin",
        &["estatus", "origin"]
    )
    .expect("Failed to register invoices_total")
});

/// Bulk commit rows by outcome.
pub static BULK_ROWS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "facturacion_bulk_rows_total",
        "Bulk commit rows by outcome",
        &["outcome"] // created, duplicate, invalid, failed
    )
    .expect("Failed to register bulk_rows_total")
});

/// Uploaded files by validation result.
pub static BULK_VALIDATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "facturacion_bulk_validations_total",
        "Bulk upload validations by result",
        &["result"] // clean, with_errors, malformed
    )
    .expect("Failed to register bulk_validations_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "facturacion_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "facturacion_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Invoiced amount (sum of `total`) by origin.
pub static INVOICE_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "facturacion_invoice_amount_total",
        "Total invoiced amount by origin",
        &["origin"]
    )
    .expect("Failed to register invoice_amount_total")
});

/// Initialize all metrics (forces lazy initialization). Idempotent.
pub fn init_metrics() {
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&BULK_ROWS_TOTAL);
    Lazy::force(&BULK_VALIDATIONS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
}

/// Records a freshly written invoice.
pub fn record_invoice_created(estatus: &str, origin: &str, total: rust_decimal::Decimal) {
    use rust_decimal::prelude::ToPrimitive;

    INVOICES_TOTAL.with_label_values(&[estatus, origin]).inc();
    if let Some(amount) = total.to_f64() {
        INVOICE_AMOUNT_TOTAL
            .with_label_values(&[origin])
            .inc_by(amount);
    }
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

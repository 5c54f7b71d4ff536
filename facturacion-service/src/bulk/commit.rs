//! Persisting user-approved bulk candidates.

use crate::bulk::validator::CandidateInvoice;
use crate::models::{Invoice, NotificationEvent};
use crate::services::metrics::{record_invoice_created, BULK_ROWS_TOTAL};
use crate::services::notifier::{notify, Notifier};
use crate::services::store::{duplicate_numero, InvoiceStore};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Per-item results of a batch where items succeed or fail independently.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<S, F> {
    pub succeeded: Vec<S>,
    pub failed: Vec<(F, String)>,
}

impl<S, F> Default for BatchOutcome<S, F> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<S, F> BatchOutcome<S, F> {
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Summary returned to the client after a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub created: usize,
    pub errors: usize,
    pub error_details: Vec<String>,
}

impl From<&BatchOutcome<Invoice, CommitFailure>> for CommitReport {
    fn from(outcome: &BatchOutcome<Invoice, CommitFailure>) -> Self {
        Self {
            created: outcome.succeeded.len(),
            errors: outcome.failed.len(),
            error_details: outcome
                .failed
                .iter()
                .map(|(failure, reason)| format!("Fila {}: {}", failure.fila, reason))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Invalid,
    Duplicate,
    Store,
}

impl FailureKind {
    fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Invalid => "invalid",
            FailureKind::Duplicate => "duplicate",
            FailureKind::Store => "failed",
        }
    }
}

/// A rejected candidate and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitFailure {
    /// Sheet row when known, otherwise the 1-based position in the request.
    pub fila: u32,
    pub kind: FailureKind,
    pub candidate: CandidateInvoice,
}

fn rejection(err: AppError, kind: FailureKind) -> (FailureKind, String) {
    let reason = match err {
        AppError::Conflict(e) => return (FailureKind::Duplicate, e.to_string()),
        AppError::ValidationError(e) => format!("Datos inválidos: {}", e),
        e @ (AppError::DatabaseError(_) | AppError::InternalError(_)) => {
            warn!(error = %e, "Bulk row failed in store");
            "Error interno al guardar la factura".to_string()
        }
        other => other.to_string(),
    };
    (kind, reason)
}

async fn commit_one(
    store: &dyn InvoiceStore,
    candidate: &CandidateInvoice,
) -> Result<Invoice, (FailureKind, String)> {
    candidate
        .validate()
        .map_err(|e| rejection(AppError::ValidationError(e), FailureKind::Invalid))?;

    let numero = candidate.numero_comprobante.trim();
    match store.find_by_numero(numero).await {
        Ok(Some(_)) => return Err(rejection(duplicate_numero(numero), FailureKind::Duplicate)),
        Ok(None) => {}
        Err(e) => return Err(rejection(e, FailureKind::Store)),
    }

    let invoice = candidate.to_new_invoice().into_invoice();
    store
        .insert_invoice(&invoice)
        .await
        .map_err(|e| rejection(e, FailureKind::Store))
}

/// Inserts candidates one at a time in input order. A failing row never aborts
/// the batch; exactly one summary notification is published at the end.
#[instrument(skip(store, notifier, candidates), fields(rows = candidates.len()))]
pub async fn commit_invoices(
    store: &dyn InvoiceStore,
    notifier: &dyn Notifier,
    candidates: Vec<CandidateInvoice>,
    usuario: Option<String>,
) -> BatchOutcome<Invoice, CommitFailure> {
    let mut outcome = BatchOutcome::default();

    for (position, candidate) in candidates.into_iter().enumerate() {
        let fila = candidate.fila.unwrap_or(position as u32 + 1);

        match commit_one(store, &candidate).await {
            Ok(invoice) => {
                BULK_ROWS_TOTAL.with_label_values(&["created"]).inc();
                record_invoice_created(&invoice.estatus, "bulk", invoice.total);
                outcome.succeeded.push(invoice);
            }
            Err((kind, reason)) => {
                BULK_ROWS_TOTAL.with_label_values(&[kind.as_str()]).inc();
                outcome.failed.push((
                    CommitFailure {
                        fila,
                        kind,
                        candidate,
                    },
                    reason,
                ));
            }
        }
    }

    info!(
        created = outcome.succeeded.len(),
        errors = outcome.failed.len(),
        "Bulk commit finished"
    );

    notify(
        notifier,
        NotificationEvent::bulk_summary(outcome.succeeded.len(), outcome.failed.len(), usuario),
    )
    .await;

    outcome
}

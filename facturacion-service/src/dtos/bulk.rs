use serde::{Deserialize, Serialize};

use crate::bulk::CandidateInvoice;

/// Rows the user approved from a validation result. Each row is re-validated
/// on commit, so the list itself carries no constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub facturas: Vec<CandidateInvoice>,
}

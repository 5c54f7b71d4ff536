//! Bulk invoice import: validate an uploaded sheet, then commit approved rows.

pub mod commit;
pub mod sheet;
pub mod validator;

pub use self::commit::{commit_invoices, BatchOutcome, CommitFailure, CommitReport};
pub use self::sheet::{Cell, RawRow, SheetError, Upload};
pub use self::validator::{
    validate_bulk_file, validate_row, validate_rows, CandidateInvoice, FieldError, Severity,
    ValidationResult,
};

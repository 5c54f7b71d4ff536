pub mod bulk;
pub mod invoices;

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::ledger::MONEY_SCALE;

pub use bulk::CommitRequest;
pub use invoices::{CreateInvoiceRequest, ListInvoicesParams, UpdateInvoiceRequest};

pub const RFC_MIN_LENGTH: usize = 12;

fn failure(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// Money fields never go below zero.
pub fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(failure("non_negative", "El monto no puede ser negativo"));
    }
    Ok(())
}

/// Amounts are non-negative and carry at most centavos.
pub fn money_amount(value: &Decimal) -> Result<(), ValidationError> {
    non_negative(value)?;
    if value.normalize().scale() > MONEY_SCALE {
        return Err(failure("money_scale", "El monto admite como máximo 2 decimales"));
    }
    Ok(())
}

/// RFC length is measured on the trimmed value, which is what gets stored.
pub fn rfc_length(value: &str) -> Result<(), ValidationError> {
    if value.trim().chars().count() < RFC_MIN_LENGTH {
        return Err(failure("length", "El RFC debe tener al menos 12 caracteres"));
    }
    Ok(())
}

/// Required text must contain something besides whitespace.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(failure("required", "El campo es requerido"));
    }
    Ok(())
}

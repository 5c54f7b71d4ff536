//! Domain models for facturacion-service.

mod invoice;
mod notification;

pub use invoice::{Invoice, InvoiceChanges, InvoiceStatus, ListInvoicesFilter, NewInvoice};
pub use notification::{NotificationEvent, NotificationSeverity};

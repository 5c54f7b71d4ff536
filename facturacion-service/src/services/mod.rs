//! Services module for facturacion-service.

pub mod database;
pub mod memory;
pub mod metrics;
pub mod notifier;
pub mod store;

pub use database::Database;
pub use memory::MemoryInvoiceStore;
pub use metrics::{get_metrics, init_metrics};
pub use notifier::{notify, MockNotifier, Notifier};
pub use store::InvoiceStore;

//! Invoice (factura) model for facturacion-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::ledger::{self, Payments, Settlement};

/// Derived payment status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    #[default]
    Pendiente,
    Pagada,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pendiente => "Pendiente",
            InvoiceStatus::Pagada => "Pagada",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pendiente" => Some(InvoiceStatus::Pendiente),
            "pagada" => Some(InvoiceStatus::Pagada),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoice row as stored in `facturas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub numero_comprobante: String,
    pub paqueteria: String,
    pub cliente: String,
    pub rfc: String,
    pub credito: Option<String>,
    pub fecha_creacion: NaiveDate,
    pub fecha_vencimiento: Option<NaiveDate>,
    pub total: Decimal,
    pub pago1: Decimal,
    pub fecha_pago1: Option<NaiveDate>,
    pub pago2: Decimal,
    pub fecha_pago2: Option<NaiveDate>,
    pub pago3: Decimal,
    pub fecha_pago3: Option<NaiveDate>,
    pub nc: Decimal,
    pub por_cobrar: Decimal,
    pub estatus: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn payments(&self) -> Payments {
        Payments::new(self.pago1, self.pago2, self.pago3, self.nc)
    }

    pub fn status(&self) -> Option<InvoiceStatus> {
        InvoiceStatus::from_string(&self.estatus)
    }

    /// Re-derives `por_cobrar` and `estatus` from the money fields.
    pub fn reconcile(&mut self) -> Settlement {
        let settlement = ledger::reconcile(self.total, &self.payments());
        self.por_cobrar = settlement.por_cobrar;
        self.estatus = settlement.estatus.as_str().to_string();
        settlement
    }
}

/// Input for inserting an invoice. Derived fields are computed at insert time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub numero_comprobante: String,
    pub paqueteria: String,
    pub cliente: String,
    pub rfc: String,
    pub credito: Option<String>,
    pub fecha_creacion: NaiveDate,
    pub fecha_vencimiento: Option<NaiveDate>,
    pub total: Decimal,
    pub pago1: Decimal,
    pub fecha_pago1: Option<NaiveDate>,
    pub pago2: Decimal,
    pub fecha_pago2: Option<NaiveDate>,
    pub pago3: Decimal,
    pub fecha_pago3: Option<NaiveDate>,
    pub nc: Decimal,
}

impl NewInvoice {
    pub fn payments(&self) -> Payments {
        Payments::new(self.pago1, self.pago2, self.pago3, self.nc)
    }

    /// Materializes the row: fresh id, timestamps and reconciled balance.
    pub fn into_invoice(self) -> Invoice {
        let now = Utc::now();
        let mut invoice = Invoice {
            id: Uuid::new_v4(),
            numero_comprobante: self.numero_comprobante,
            paqueteria: self.paqueteria,
            cliente: self.cliente,
            rfc: self.rfc,
            credito: self.credito,
            fecha_creacion: self.fecha_creacion,
            fecha_vencimiento: self.fecha_vencimiento,
            total: self.total,
            pago1: self.pago1,
            fecha_pago1: self.fecha_pago1,
            pago2: self.pago2,
            fecha_pago2: self.fecha_pago2,
            pago3: self.pago3,
            fecha_pago3: self.fecha_pago3,
            nc: self.nc,
            por_cobrar: Decimal::ZERO,
            estatus: String::new(),
            created_at: now,
            updated_at: now,
        };
        invoice.reconcile();
        invoice
    }
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceChanges {
    pub numero_comprobante: Option<String>,
    pub paqueteria: Option<String>,
    pub cliente: Option<String>,
    pub rfc: Option<String>,
    pub credito: Option<String>,
    pub fecha_creacion: Option<NaiveDate>,
    pub fecha_vencimiento: Option<NaiveDate>,
    pub total: Option<Decimal>,
    pub pago1: Option<Decimal>,
    pub fecha_pago1: Option<NaiveDate>,
    pub pago2: Option<Decimal>,
    pub fecha_pago2: Option<NaiveDate>,
    pub pago3: Option<Decimal>,
    pub fecha_pago3: Option<NaiveDate>,
    pub nc: Option<Decimal>,
}

impl InvoiceChanges {
    /// Applies the changes, re-reconciles and bumps `updated_at`.
    pub fn apply_to(self, invoice: &mut Invoice) -> Settlement {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        fn set_opt<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        set(&mut invoice.numero_comprobante, self.numero_comprobante);
        set(&mut invoice.paqueteria, self.paqueteria);
        set(&mut invoice.cliente, self.cliente);
        set(&mut invoice.rfc, self.rfc);
        set_opt(&mut invoice.credito, self.credito);
        set(&mut invoice.fecha_creacion, self.fecha_creacion);
        set_opt(&mut invoice.fecha_vencimiento, self.fecha_vencimiento);
        set(&mut invoice.total, self.total);
        set(&mut invoice.pago1, self.pago1);
        set_opt(&mut invoice.fecha_pago1, self.fecha_pago1);
        set(&mut invoice.pago2, self.pago2);
        set_opt(&mut invoice.fecha_pago2, self.fecha_pago2);
        set(&mut invoice.pago3, self.pago3);
        set_opt(&mut invoice.fecha_pago3, self.fecha_pago3);
        set(&mut invoice.nc, self.nc);

        invoice.updated_at = Utc::now();
        invoice.reconcile()
    }
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub estatus: Option<InvoiceStatus>,
    /// Case-insensitive substring of `cliente`.
    pub cliente: Option<String>,
    /// Case-insensitive substring of `numero_comprobante`.
    pub numero: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl ListInvoicesFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 500;

    pub fn matches(&self, invoice: &Invoice) -> bool {
        let contains = |haystack: &str, needle: &Option<String>| {
            needle
                .as_deref()
                .map(|n| haystack.to_lowercase().contains(&n.to_lowercase()))
                .unwrap_or(true)
        };

        self.estatus
            .map(|s| invoice.estatus == s.as_str())
            .unwrap_or(true)
            && contains(&invoice.cliente, &self.cliente)
            && contains(&invoice.numero_comprobante, &self.numero)
    }
}

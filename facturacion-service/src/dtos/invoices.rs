use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use super::{money_amount, not_blank, rfc_length};
use crate::models::{InvoiceChanges, InvoiceStatus, ListInvoicesFilter, NewInvoice};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[validate(custom(function = "not_blank"))]
    pub numero_comprobante: String,

    #[validate(custom(function = "not_blank"))]
    pub paqueteria: String,

    #[validate(custom(function = "not_blank"))]
    pub cliente: String,

    #[validate(custom(function = "rfc_length"))]
    pub rfc: String,

    pub credito: Option<String>,
    pub fecha_creacion: NaiveDate,
    pub fecha_vencimiento: Option<NaiveDate>,

    #[validate(custom(function = "money_amount"))]
    pub total: Decimal,

    #[serde(default)]
    #[validate(custom(function = "money_amount"))]
    pub pago1: Decimal,
    pub fecha_pago1: Option<NaiveDate>,

    #[serde(default)]
    #[validate(custom(function = "money_amount"))]
    pub pago2: Decimal,
    pub fecha_pago2: Option<NaiveDate>,

    #[serde(default)]
    #[validate(custom(function = "money_amount"))]
    pub pago3: Decimal,
    pub fecha_pago3: Option<NaiveDate>,

    #[serde(default)]
    #[validate(custom(function = "money_amount"))]
    pub nc: Decimal,
}

impl From<CreateInvoiceRequest> for NewInvoice {
    fn from(req: CreateInvoiceRequest) -> Self {
        NewInvoice {
            numero_comprobante: req.numero_comprobante.trim().to_string(),
            paqueteria: req.paqueteria.trim().to_string(),
            cliente: req.cliente.trim().to_string(),
            rfc: req.rfc.trim().to_string(),
            credito: req.credito,
            fecha_creacion: req.fecha_creacion,
            fecha_vencimiento: req.fecha_vencimiento,
            total: req.total,
            pago1: req.pago1,
            fecha_pago1: req.fecha_pago1,
            pago2: req.pago2,
            fecha_pago2: req.fecha_pago2,
            pago3: req.pago3,
            fecha_pago3: req.fecha_pago3,
            nc: req.nc,
        }
    }
}

/// Partial update; omitted fields keep their stored value. A `null` is read as
/// omitted, so optional fields (`credito`, `fecha_vencimiento`, `fecha_pagoN`)
/// cannot be cleared through this request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    #[validate(custom(function = "not_blank"))]
    pub numero_comprobante: Option<String>,

    #[validate(custom(function = "not_blank"))]
    pub paqueteria: Option<String>,

    #[validate(custom(function = "not_blank"))]
    pub cliente: Option<String>,

    #[validate(custom(function = "rfc_length"))]
    pub rfc: Option<String>,

    pub credito: Option<String>,
    pub fecha_creacion: Option<NaiveDate>,
    pub fecha_vencimiento: Option<NaiveDate>,

    #[validate(custom(function = "money_amount"))]
    pub total: Option<Decimal>,

    #[validate(custom(function = "money_amount"))]
    pub pago1: Option<Decimal>,
    pub fecha_pago1: Option<NaiveDate>,

    #[validate(custom(function = "money_amount"))]
    pub pago2: Option<Decimal>,
    pub fecha_pago2: Option<NaiveDate>,

    #[validate(custom(function = "money_amount"))]
    pub pago3: Option<Decimal>,
    pub fecha_pago3: Option<NaiveDate>,

    #[validate(custom(function = "money_amount"))]
    pub nc: Option<Decimal>,
}

impl From<UpdateInvoiceRequest> for InvoiceChanges {
    fn from(req: UpdateInvoiceRequest) -> Self {
        let trimmed = |s: Option<String>| s.map(|s| s.trim().to_string());
        InvoiceChanges {
            numero_comprobante: trimmed(req.numero_comprobante),
            paqueteria: trimmed(req.paqueteria),
            cliente: trimmed(req.cliente),
            rfc: trimmed(req.rfc),
            credito: req.credito,
            fecha_creacion: req.fecha_creacion,
            fecha_vencimiento: req.fecha_vencimiento,
            total: req.total,
            pago1: req.pago1,
            fecha_pago1: req.fecha_pago1,
            pago2: req.pago2,
            fecha_pago2: req.fecha_pago2,
            pago3: req.pago3,
            fecha_pago3: req.fecha_pago3,
            nc: req.nc,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListInvoicesParams {
    pub estatus: Option<String>,
    pub cliente: Option<String>,
    pub numero: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListInvoicesParams {
    pub fn into_filter(self) -> Result<ListInvoicesFilter, AppError> {
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());

        let estatus = match non_empty(self.estatus) {
            Some(raw) => Some(InvoiceStatus::from_string(&raw).ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Estatus inválido '{}', se esperaba Pendiente o Pagada",
                    raw
                ))
            })?),
            None => None,
        };

        Ok(ListInvoicesFilter {
            estatus,
            cliente: non_empty(self.cliente),
            numero: non_empty(self.numero),
            limit: self
                .limit
                .unwrap_or(ListInvoicesFilter::DEFAULT_LIMIT)
                .clamp(1, ListInvoicesFilter::MAX_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
        })
    }
}

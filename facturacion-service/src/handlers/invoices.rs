use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use service_core::middleware::Principal;
use service_core::permissions::Action;
use uuid::Uuid;
use validator::Validate;

use super::track;
use crate::dtos::{CreateInvoiceRequest, ListInvoicesParams, UpdateInvoiceRequest};
use crate::models::{
    Invoice, InvoiceChanges, NewInvoice, NotificationEvent, NotificationSeverity,
};
use crate::services::metrics::record_invoice_created;
use crate::services::notify;
use crate::services::store::duplicate_numero;
use crate::startup::AppState;

const MODULE: &str = NotificationEvent::MODULE;

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Factura {} no encontrada", id))
}

#[tracing::instrument(skip(state, principal, request), fields(user_id = %principal.user_id))]
pub async fn create_invoice(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    state
        .permissions
        .require(&principal, MODULE, Action::Create)
        .map_err(track)?;
    request.validate().map_err(|e| track(e.into()))?;

    let invoice = NewInvoice::from(request).into_invoice();

    if state
        .store
        .find_by_numero(&invoice.numero_comprobante)
        .await
        .map_err(track)?
        .is_some()
    {
        return Err(track(duplicate_numero(&invoice.numero_comprobante)));
    }

    let created = state.store.insert_invoice(&invoice).await.map_err(track)?;
    record_invoice_created(&created.estatus, "single", created.total);

    tracing::info!(
        invoice_id = %created.id,
        numero_comprobante = %created.numero_comprobante,
        estatus = %created.estatus,
        "Invoice created"
    );

    notify(
        state.notifier.as_ref(),
        NotificationEvent::new(
            "Factura creada",
            format!(
                "Factura {} creada para {}",
                created.numero_comprobante, created.cliente
            ),
            NotificationSeverity::Info,
            Some(principal.user_id),
        ),
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(skip(state, principal), fields(user_id = %principal.user_id))]
pub async fn get_invoice(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    state
        .permissions
        .require(&principal, MODULE, Action::Read)
        .map_err(track)?;

    let invoice = state
        .store
        .get_invoice(id)
        .await
        .map_err(track)?
        .ok_or_else(|| track(not_found(id)))?;

    Ok(Json(invoice))
}

#[tracing::instrument(skip(state, principal, request), fields(user_id = %principal.user_id))]
pub async fn update_invoice(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<Json<Invoice>, AppError> {
    state
        .permissions
        .require(&principal, MODULE, Action::Update)
        .map_err(track)?;
    request.validate().map_err(|e| track(e.into()))?;

    let mut invoice = state
        .store
        .get_invoice(id)
        .await
        .map_err(track)?
        .ok_or_else(|| track(not_found(id)))?;

    let changes = InvoiceChanges::from(request);
    if let Some(numero) = changes.numero_comprobante.as_deref() {
        if numero != invoice.numero_comprobante {
            let taken = state.store.find_by_numero(numero).await.map_err(track)?;
            if taken.is_some_and(|other| other.id != id) {
                return Err(track(duplicate_numero(numero)));
            }
        }
    }

    let settlement = changes.apply_to(&mut invoice);
    if settlement.is_overpaid() {
        // Balance stays clamped at zero; the excess is only reported.
        tracing::warn!(
            invoice_id = %id,
            total = %invoice.total,
            excedente = %settlement.excedente,
            "Payments exceed invoice total"
        );
    }

    let updated = state
        .store
        .update_invoice(&invoice)
        .await
        .map_err(track)?
        .ok_or_else(|| track(not_found(id)))?;

    tracing::info!(
        invoice_id = %updated.id,
        estatus = %updated.estatus,
        por_cobrar = %updated.por_cobrar,
        "Invoice updated"
    );

    notify(
        state.notifier.as_ref(),
        NotificationEvent::new(
            "Factura actualizada",
            format!(
                "Factura {} actualizada, estatus {}",
                updated.numero_comprobante, updated.estatus
            ),
            NotificationSeverity::Info,
            Some(principal.user_id),
        ),
    )
    .await;

    Ok(Json(updated))
}

#[tracing::instrument(skip(state, principal), fields(user_id = %principal.user_id))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .permissions
        .require(&principal, MODULE, Action::Delete)
        .map_err(track)?;

    if !state.store.delete_invoice(id).await.map_err(track)? {
        return Err(track(not_found(id)));
    }

    tracing::info!(invoice_id = %id, "Invoice deleted");

    notify(
        state.notifier.as_ref(),
        NotificationEvent::new(
            "Factura eliminada",
            format!("Factura {} eliminada", id),
            NotificationSeverity::Info,
            Some(principal.user_id),
        ),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, principal), fields(user_id = %principal.user_id))]
pub async fn list_invoices(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListInvoicesParams>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    state
        .permissions
        .require(&principal, MODULE, Action::Read)
        .map_err(track)?;

    let filter = params.into_filter().map_err(track)?;
    let invoices = state.store.list_invoices(&filter).await.map_err(track)?;

    tracing::debug!(count = invoices.len(), "Invoices listed");

    Ok(Json(invoices))
}

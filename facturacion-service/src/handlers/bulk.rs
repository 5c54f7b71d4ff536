use axum::{
    extract::{Multipart, State},
    Json,
};
use service_core::error::AppError;
use service_core::middleware::Principal;
use service_core::permissions::Action;

use super::track;
use crate::bulk::{commit_invoices, validate_bulk_file, CommitReport, Upload, ValidationResult};
use crate::dtos::CommitRequest;
use crate::models::NotificationEvent;
use crate::services::metrics::BULK_VALIDATIONS_TOTAL;
use crate::startup::AppState;

const MODULE: &str = NotificationEvent::MODULE;
const FILE_FIELD: &str = "archivo";

struct UploadedFile {
    bytes: Vec<u8>,
    file_name: Option<String>,
    content_type: Option<String>,
}

/// Takes the `archivo` field, or the first file field when none is named so.
async fn read_upload(multipart: &mut Multipart) -> Result<UploadedFile, AppError> {
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        let is_named = field.name() == Some(FILE_FIELD);
        if !is_named && (fallback.is_some() || field.file_name().is_none()) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e)))?
            .to_vec();

        let file = UploadedFile {
            bytes,
            file_name,
            content_type,
        };
        if is_named {
            return Ok(file);
        }
        fallback = Some(file);
    }

    fallback.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No se recibió ningún archivo")))
}

#[tracing::instrument(skip(state, principal, multipart), fields(user_id = %principal.user_id))]
pub async fn validate_bulk(
    State(state): State<AppState>,
    principal: Principal,
    mut multipart: Multipart,
) -> Result<Json<ValidationResult>, AppError> {
    state
        .permissions
        .require(&principal, MODULE, Action::Create)
        .map_err(track)?;

    let file = read_upload(&mut multipart).await.map_err(track)?;
    let max_bytes = state.config.bulk.max_file_bytes;
    if file.bytes.len() > max_bytes {
        return Err(track(AppError::PayloadTooLarge(anyhow::anyhow!(
            "El archivo excede el tamaño máximo de {} bytes",
            max_bytes
        ))));
    }

    tracing::info!(
        file_name = ?file.file_name,
        size = file.bytes.len(),
        "Validating bulk upload"
    );

    let max_rows = state.config.bulk.max_rows;
    let result = tokio::task::spawn_blocking(move || {
        let upload = Upload::new(&file.bytes)
            .with_file_name(file.file_name.as_deref())
            .with_content_type(file.content_type.as_deref());
        validate_bulk_file(&upload, max_rows)
    })
    .await
    .map_err(|e| track(AppError::InternalError(anyhow::anyhow!("Validation task failed: {}", e))))?;

    let label = if result.is_malformed() {
        "malformed"
    } else if result.lineas_con_errores > 0 {
        "with_errors"
    } else {
        "clean"
    };
    BULK_VALIDATIONS_TOTAL.with_label_values(&[label]).inc();

    tracing::info!(
        total_lineas = result.total_lineas,
        lineas_correctas = result.lineas_correctas,
        lineas_con_errores = result.lineas_con_errores,
        "Bulk upload validated"
    );

    Ok(Json(result))
}

#[tracing::instrument(skip(state, principal, request), fields(user_id = %principal.user_id, rows = request.facturas.len()))]
pub async fn commit_bulk(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CommitRequest>,
) -> Result<Json<CommitReport>, AppError> {
    state
        .permissions
        .require(&principal, MODULE, Action::Create)
        .map_err(track)?;

    let outcome = commit_invoices(
        state.store.as_ref(),
        state.notifier.as_ref(),
        request.facturas,
        Some(principal.user_id),
    )
    .await;

    Ok(Json(CommitReport::from(&outcome)))
}

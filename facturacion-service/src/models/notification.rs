use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    Success,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for NotificationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationSeverity::Success => write!(f, "success"),
            NotificationSeverity::Info => write!(f, "info"),
            NotificationSeverity::Warning => write!(f, "warning"),
            NotificationSeverity::Error => write!(f, "error"),
        }
    }
}

/// In-app notification raised by an invoice operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    pub modulo: String,
    pub titulo: String,
    pub mensaje: String,
    pub severidad: NotificationSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usuario: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub const MODULE: &'static str = "facturacion";

    pub fn new(
        titulo: impl Into<String>,
        mensaje: impl Into<String>,
        severidad: NotificationSeverity,
        usuario: Option<String>,
    ) -> Self {
        Self {
            modulo: Self::MODULE.to_string(),
            titulo: titulo.into(),
            mensaje: mensaje.into(),
            severidad,
            usuario,
            created_at: Utc::now(),
        }
    }

    /// Summary of a bulk commit: success when nothing failed, warning otherwise.
    pub fn bulk_summary(created: usize, errors: usize, usuario: Option<String>) -> Self {
        let severidad = if errors == 0 {
            NotificationSeverity::Success
        } else {
            NotificationSeverity::Warning
        };
        Self::new(
            "Carga masiva de facturas",
            format!(
                "{} facturas creadas, {} con errores",
                created, errors
            ),
            severidad,
            usuario,
        )
    }
}

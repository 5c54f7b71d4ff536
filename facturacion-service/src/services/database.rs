//! PostgreSQL store for facturacion-service.

use crate::models::{Invoice, ListInvoicesFilter, NotificationEvent};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::notifier::Notifier;
use crate::services::store::{duplicate_numero, InvoiceStore};
use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = r#"
    id, numero_comprobante, paqueteria, cliente, rfc, credito, fecha_creacion, fecha_vencimiento,
    total, pago1, fecha_pago1, pago2, fecha_pago2, pago3, fecha_pago3, nc, por_cobrar, estatus,
    created_at, updated_at
"#;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

fn map_write_error(e: sqlx::Error, invoice: &Invoice, action: &str) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            duplicate_numero(&invoice.numero_comprobante)
        }
        _ => AppError::DatabaseError(anyhow::anyhow!("Failed to {} invoice: {}", action, e)),
    }
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "facturacion-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations. Already-applied migrations are skipped.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self, invoice), fields(numero_comprobante = %invoice.numero_comprobante))]
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let sql = format!(
            r#"
            INSERT INTO facturas (
                id, numero_comprobante, paqueteria, cliente, rfc, credito, fecha_creacion,
                fecha_vencimiento, total, pago1, fecha_pago1, pago2, fecha_pago2, pago3,
                fecha_pago3, nc, por_cobrar, estatus, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING {INVOICE_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice.id)
            .bind(&invoice.numero_comprobante)
            .bind(&invoice.paqueteria)
            .bind(&invoice.cliente)
            .bind(&invoice.rfc)
            .bind(&invoice.credito)
            .bind(invoice.fecha_creacion)
            .bind(invoice.fecha_vencimiento)
            .bind(invoice.total)
            .bind(invoice.pago1)
            .bind(invoice.fecha_pago1)
            .bind(invoice.pago2)
            .bind(invoice.fecha_pago2)
            .bind(invoice.pago3)
            .bind(invoice.fecha_pago3)
            .bind(invoice.nc)
            .bind(invoice.por_cobrar)
            .bind(&invoice.estatus)
            .bind(invoice.created_at)
            .bind(invoice.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, invoice, "create"))?;

        timer.observe_duration();

        info!(invoice_id = %created.id, estatus = %created.estatus, "Invoice created");

        Ok(created)
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let sql = format!("SELECT {INVOICE_COLUMNS} FROM facturas WHERE id = $1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn find_by_numero(&self, numero_comprobante: &str) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_by_numero"])
            .start_timer();

        let sql = format!("SELECT {INVOICE_COLUMNS} FROM facturas WHERE numero_comprobante = $1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(numero_comprobante)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to look up invoice number: {}", e))
            })?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    async fn update_invoice(&self, invoice: &Invoice) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let sql = format!(
            r#"
            UPDATE facturas
            SET numero_comprobante = $2,
                paqueteria = $3,
                cliente = $4,
                rfc = $5,
                credito = $6,
                fecha_creacion = $7,
                fecha_vencimiento = $8,
                total = $9,
                pago1 = $10,
                fecha_pago1 = $11,
                pago2 = $12,
                fecha_pago2 = $13,
                pago3 = $14,
                fecha_pago3 = $15,
                nc = $16,
                por_cobrar = $17,
                estatus = $18,
                updated_at = $19
            WHERE id = $1
            RETURNING {INVOICE_COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice.id)
            .bind(&invoice.numero_comprobante)
            .bind(&invoice.paqueteria)
            .bind(&invoice.cliente)
            .bind(&invoice.rfc)
            .bind(&invoice.credito)
            .bind(invoice.fecha_creacion)
            .bind(invoice.fecha_vencimiento)
            .bind(invoice.total)
            .bind(invoice.pago1)
            .bind(invoice.fecha_pago1)
            .bind(invoice.pago2)
            .bind(invoice.fecha_pago2)
            .bind(invoice.pago3)
            .bind(invoice.fecha_pago3)
            .bind(invoice.nc)
            .bind(invoice.por_cobrar)
            .bind(&invoice.estatus)
            .bind(invoice.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_error(e, invoice, "update"))?;

        timer.observe_duration();

        if let Some(ref inv) = updated {
            info!(estatus = %inv.estatus, por_cobrar = %inv.por_cobrar, "Invoice updated");
        }

        Ok(updated)
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn delete_invoice(&self, id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let result = sqlx::query("DELETE FROM facturas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!("Invoice deleted");
        }

        Ok(deleted)
    }

    #[instrument(skip(self, filter))]
    async fn list_invoices(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM facturas
            WHERE ($1::text IS NULL OR estatus = $1)
              AND ($2::text IS NULL OR cliente ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL OR numero_comprobante ILIKE '%' || $3 || '%')
            ORDER BY created_at DESC, numero_comprobante
            LIMIT $4 OFFSET $5
            "#
        );

        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(filter.estatus.map(|s| s.as_str()))
            .bind(filter.cliente.as_deref())
            .bind(filter.numero.as_deref())
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e))
            })?;

        timer.observe_duration();

        Ok(invoices)
    }
}

#[async_trait]
impl Notifier for Database {
    #[instrument(skip(self, event), fields(titulo = %event.titulo))]
    async fn publish(&self, event: &NotificationEvent) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_notification"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO notificaciones (id, modulo, titulo, mensaje, severidad, usuario, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.modulo)
        .bind(&event.titulo)
        .bind(&event.mensaje)
        .bind(event.severidad.to_string())
        .bind(&event.usuario)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to store notification: {}", e))
        })?;

        timer.observe_duration();

        Ok(())
    }
}

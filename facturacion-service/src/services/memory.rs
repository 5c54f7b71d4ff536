//! In-memory invoice store, used when no database is configured.

use crate::models::{Invoice, ListInvoicesFilter};
use crate::services::store::{duplicate_numero, InvoiceStore};
use async_trait::async_trait;
use service_core::error::AppError;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryInvoiceStore {
    invoices: RwLock<Vec<Invoice>>,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.invoices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.invoices.read().await.is_empty()
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<Invoice, AppError> {
        let mut invoices = self.invoices.write().await;
        if invoices
            .iter()
            .any(|i| i.numero_comprobante == invoice.numero_comprobante)
        {
            return Err(duplicate_numero(&invoice.numero_comprobante));
        }
        invoices.push(invoice.clone());
        Ok(invoice.clone())
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .invoices
            .read()
            .await
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn find_by_numero(&self, numero_comprobante: &str) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .invoices
            .read()
            .await
            .iter()
            .find(|i| i.numero_comprobante == numero_comprobante)
            .cloned())
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<Option<Invoice>, AppError> {
        let mut invoices = self.invoices.write().await;
        if invoices
            .iter()
            .any(|i| i.id != invoice.id && i.numero_comprobante == invoice.numero_comprobante)
        {
            return Err(duplicate_numero(&invoice.numero_comprobante));
        }
        match invoices.iter_mut().find(|i| i.id == invoice.id) {
            Some(slot) => {
                *slot = invoice.clone();
                Ok(Some(invoice.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_invoice(&self, id: Uuid) -> Result<bool, AppError> {
        let mut invoices = self.invoices.write().await;
        let before = invoices.len();
        invoices.retain(|i| i.id != id);
        Ok(invoices.len() < before)
    }

    async fn list_invoices(&self, filter: &ListInvoicesFilter) -> Result<Vec<Invoice>, AppError> {
        let invoices = self.invoices.read().await;
        // Later inserts first among equal timestamps.
        let mut matched: Vec<Invoice> = invoices
            .iter()
            .rev()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matched
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewInvoice;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn invoice(numero: &str) -> Invoice {
        NewInvoice {
            numero_comprobante: numero.to_string(),
            paqueteria: "DHL".to_string(),
            cliente: "Envíos Rápidos".to_string(),
            rfc: "ERA990101XY2".to_string(),
            credito: None,
            fecha_creacion: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            fecha_vencimiento: None,
            total: Decimal::from(1000),
            pago1: Decimal::ZERO,
            fecha_pago1: None,
            pago2: Decimal::ZERO,
            fecha_pago2: None,
            pago3: Decimal::ZERO,
            fecha_pago3: None,
            nc: Decimal::ZERO,
        }
        .into_invoice()
    }

    fn all() -> ListInvoicesFilter {
        ListInvoicesFilter {
            limit: ListInvoicesFilter::DEFAULT_LIMIT,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_numero() {
        let store = MemoryInvoiceStore::new();
        store.insert_invoice(&invoice("A-1")).await.unwrap();

        let err = store.insert_invoice(&invoice("A-1")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_cannot_steal_another_numero() {
        let store = MemoryInvoiceStore::new();
        store.insert_invoice(&invoice("A-1")).await.unwrap();
        let mut second = store.insert_invoice(&invoice("A-2")).await.unwrap();

        second.numero_comprobante = "A-1".to_string();
        let err = store.update_invoice(&second).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_and_delete_missing_rows() {
        let store = MemoryInvoiceStore::new();
        let ghost = invoice("A-9");
        assert_eq!(store.update_invoice(&ghost).await.unwrap(), None);
        assert!(!store.delete_invoice(ghost.id).await.unwrap());
    }

    #[tokio::test]
    async fn lists_newest_first_with_paging() {
        let store = MemoryInvoiceStore::new();
        for n in ["A-1", "A-2", "A-3"] {
            store.insert_invoice(&invoice(n)).await.unwrap();
        }

        let listed = store.list_invoices(&all()).await.unwrap();
        let numeros: Vec<_> = listed.iter().map(|i| i.numero_comprobante.as_str()).collect();
        assert_eq!(numeros, vec!["A-3", "A-2", "A-1"]);

        let page = store
            .list_invoices(&ListInvoicesFilter {
                limit: 1,
                offset: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].numero_comprobante, "A-2");
    }
}

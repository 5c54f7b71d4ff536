//! Common test utilities for facturacion-service integration tests.

#![allow(dead_code)]

use facturacion_service::config::FacturacionConfig;
use facturacion_service::services::{MemoryInvoiceStore, MockNotifier};
use facturacion_service::startup::Application;
use reqwest::RequestBuilder;
use serde_json::{json, Value};
use service_core::middleware::principal::{USER_ID_HEADER, USER_ROLE_HEADER};
use std::sync::{Arc, Once};

pub const TEST_USER_ID: &str = "test_user_123";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,facturacion_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    pub store: Arc<MemoryInvoiceStore>,
    pub notifier: Arc<MockNotifier>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(FacturacionConfig::for_tests()).await
    }

    pub async fn spawn_with(config: FacturacionConfig) -> Self {
        init_tracing();

        let store = Arc::new(MemoryInvoiceStore::new());
        let notifier = Arc::new(MockNotifier::default());

        let app = Application::build_with(config, store.clone(), notifier.clone())
            .await
            .expect("Failed to build test application");

        let port = app.http_port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
            store,
            notifier,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Attaches the principal headers the upstream backend would forward.
    pub fn as_role(&self, builder: RequestBuilder, role: &str) -> RequestBuilder {
        builder
            .header(USER_ID_HEADER, TEST_USER_ID)
            .header(USER_ROLE_HEADER, role)
    }

    pub fn get(&self, path: &str, role: &str) -> RequestBuilder {
        self.as_role(self.client.get(self.url(path)), role)
    }

    pub fn post(&self, path: &str, role: &str) -> RequestBuilder {
        self.as_role(self.client.post(self.url(path)), role)
    }

    pub fn put(&self, path: &str, role: &str) -> RequestBuilder {
        self.as_role(self.client.put(self.url(path)), role)
    }

    pub fn delete(&self, path: &str, role: &str) -> RequestBuilder {
        self.as_role(self.client.delete(self.url(path)), role)
    }

    /// Creates an invoice as admin and returns the response body.
    pub async fn create_invoice(&self, body: &Value) -> Value {
        let response = self
            .post("/facturas", "admin")
            .json(body)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), 201, "create failed");
        response.json().await.expect("Invalid JSON body")
    }
}

/// Minimal valid create payload.
pub fn invoice_body(numero: &str, total: &str) -> Value {
    json!({
        "numero_comprobante": numero,
        "paqueteria": "Estafeta",
        "cliente": "Comercializadora del Norte",
        "rfc": "CNO010203AB1",
        "credito": "30 días",
        "fecha_creacion": "2024-03-01",
        "total": total
    })
}

/// Parses a money field (serialized as a string) for comparisons.
pub fn money(value: &Value) -> String {
    value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

//! In-app notification publishing.

use crate::models::NotificationEvent;
use async_trait::async_trait;
use service_core::error::AppError;
use tokio::sync::Mutex;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), AppError>;
}

/// Publishes `event`, logging instead of failing. A lost notification never
/// rolls back the invoice operation that raised it.
pub async fn notify(notifier: &dyn Notifier, event: NotificationEvent) {
    if let Err(e) = notifier.publish(&event).await {
        tracing::warn!(
            error = %e,
            titulo = %event.titulo,
            "Failed to publish notification"
        );
    }
}

/// Mock notifier for local runs and tests. Keeps every event in memory.
pub struct MockNotifier {
    enabled: bool,
    events: Mutex<Vec<NotificationEvent>>,
}

impl MockNotifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            events: Mutex::new(Vec::new()),
        }
    }

    pub async fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().await.clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn publish(&self, event: &NotificationEvent) -> Result<(), AppError> {
        if !self.enabled {
            return Err(AppError::ServiceUnavailable);
        }

        tracing::info!(
            titulo = %event.titulo,
            severidad = %event.severidad,
            "[MOCK] Notification would be published"
        );

        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

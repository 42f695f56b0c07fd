//! Outbound notification dispatch.
//!
//! Notifications are best-effort: a failure to enqueue never aborts or
//! rolls back a committed order. The production sink persists queue
//! documents that a separate mailer drains; tests use the in-memory
//! sink.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use docstore::{DocRef, DocStoreError, DocumentStore, DocumentStoreExt};
use domain::{OrderId, PaymentId, collections};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to enqueue notification: {0}")]
    Enqueue(String),

    #[error("document store error: {0}")]
    Store(#[from] DocStoreError),
}

/// What a notification is about. Determines the template the mailer
/// renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    OrderConfirmation,
    OrderFailureCustomer,
    OrderFailureAdmin,
    SaleConfirmationAdmin,
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Customer-facing confirmation for a completed order.
    pub fn order_confirmation(recipient: &str, order_id: &OrderId) -> Self {
        Self {
            kind: NotificationKind::OrderConfirmation,
            recipient: recipient.to_string(),
            subject: "Your order is confirmed".to_string(),
            body: format!("Thank you for your purchase. Your order {order_id} is being processed."),
        }
    }

    /// Customer-facing notice that a paid-for order could not be placed.
    pub fn order_failure_customer(recipient: &str, payment_id: &PaymentId) -> Self {
        Self {
            kind: NotificationKind::OrderFailureCustomer,
            recipient: recipient.to_string(),
            subject: "There was a problem with your order".to_string(),
            body: format!(
                "We could not complete your order for payment {payment_id}. \
                 Our team has been notified and will contact you shortly."
            ),
        }
    }

    /// Operator alert for a fulfillment failure after payment.
    pub fn order_failure_admin(recipient: &str, payment_id: &PaymentId, reason: &str) -> Self {
        Self {
            kind: NotificationKind::OrderFailureAdmin,
            recipient: recipient.to_string(),
            subject: format!("Fulfillment failed for payment {payment_id}"),
            body: format!("Fulfillment for payment {payment_id} failed: {reason}"),
        }
    }

    /// Operator notice of a completed sale.
    pub fn sale_confirmation_admin(recipient: &str, order_id: &OrderId, total: &str) -> Self {
        Self {
            kind: NotificationKind::SaleConfirmationAdmin,
            recipient: recipient.to_string(),
            subject: format!("New sale: order {order_id}"),
            body: format!("Order {order_id} completed for {total}."),
        }
    }
}

/// Destination for outbound notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn enqueue(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// In-memory sink for tests with failure injection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationSink {
    state: Arc<RwLock<SinkState>>,
}

#[derive(Debug, Default)]
struct SinkState {
    sent: Vec<Notification>,
    fail_on_enqueue: bool,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent enqueue fail.
    pub fn set_fail_on_enqueue(&self, fail: bool) {
        self.state.write().unwrap().fail_on_enqueue = fail;
    }

    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// Snapshot of everything enqueued so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.state.read().unwrap().sent.clone()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn enqueue(&self, notification: Notification) -> Result<(), NotifyError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_enqueue {
            return Err(NotifyError::Enqueue("simulated enqueue failure".to_string()));
        }
        state.sent.push(notification);
        Ok(())
    }
}

/// Sink that persists notifications as documents in the
/// `notifications` collection for an out-of-band mailer to drain.
#[derive(Debug, Clone)]
pub struct StoreNotificationSink<S> {
    store: S,
}

impl<S: DocumentStore> StoreNotificationSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[derive(Serialize)]
struct QueuedNotification<'a> {
    #[serde(flatten)]
    notification: &'a Notification,
    created_at: chrono::DateTime<Utc>,
}

#[async_trait]
impl<S: DocumentStore> NotificationSink for StoreNotificationSink<S> {
    async fn enqueue(&self, notification: Notification) -> Result<(), NotifyError> {
        let doc = DocRef::new(collections::NOTIFICATIONS, Uuid::new_v4().to_string());
        self.store
            .set_as(
                &doc,
                &QueuedNotification {
                    notification: &notification,
                    created_at: Utc::now(),
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore::InMemoryDocumentStore;

    #[tokio::test]
    async fn in_memory_sink_records_notifications() {
        let sink = InMemoryNotificationSink::new();
        let order_id = OrderId::new();

        sink.enqueue(Notification::order_confirmation("a@example.com", &order_id))
            .await
            .unwrap();

        assert_eq!(sink.sent_count(), 1);
        let sent = sink.sent();
        assert_eq!(sent[0].kind, NotificationKind::OrderConfirmation);
        assert_eq!(sent[0].recipient, "a@example.com");
    }

    #[tokio::test]
    async fn in_memory_sink_failure_injection() {
        let sink = InMemoryNotificationSink::new();
        sink.set_fail_on_enqueue(true);

        let result = sink
            .enqueue(Notification::order_failure_admin(
                "ops@example.com",
                &PaymentId::new("pi_1"),
                "out of stock",
            ))
            .await;

        assert!(matches!(result, Err(NotifyError::Enqueue(_))));
        assert_eq!(sink.sent_count(), 0);
    }

    #[tokio::test]
    async fn store_sink_persists_queue_documents() {
        let store = InMemoryDocumentStore::new();
        let sink = StoreNotificationSink::new(store.clone());

        sink.enqueue(Notification::sale_confirmation_admin(
            "ops@example.com",
            &OrderId::new(),
            "€12.34",
        ))
        .await
        .unwrap();

        let ids = store.ids_in_collection(collections::NOTIFICATIONS).await;
        assert_eq!(ids.len(), 1);

        let doc = store
            .get(&DocRef::new(collections::NOTIFICATIONS, ids[0].clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.data["kind"], "sale-confirmation-admin");
        assert_eq!(doc.data["recipient"], "ops@example.com");
        assert!(doc.data["created_at"].is_string());
    }
}

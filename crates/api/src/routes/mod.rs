pub mod checkout;
pub mod health;
pub mod metrics;
pub mod webhooks;

use docstore::DocumentStore;
use fulfillment::{
    CheckoutService, FulfillmentService, InMemoryPaymentGateway, StoreNotificationSink,
};

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub fulfillment: FulfillmentService<S, StoreNotificationSink<S>>,
    pub checkout: CheckoutService<S, InMemoryPaymentGateway>,
    pub store: S,
}

//! HTTP API server for the storefront back end.
//!
//! Exposes the payment webhook that drives order fulfillment and the
//! checkout endpoint that stages payment intents, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use docstore::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::checkout::create::<S>))
        .route("/webhooks/payment", post(routes::webhooks::payment::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state over the given store.
///
/// Notifications are queued as documents for an out-of-band mailer;
/// the payment gateway is the in-memory stand-in until a processor
/// client is wired up.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(
    store: S,
    admin_email: impl Into<String>,
) -> Arc<AppState<S>> {
    use fulfillment::{
        CheckoutService, FulfillmentService, InMemoryPaymentGateway, StoreNotificationSink,
    };

    let notifier = StoreNotificationSink::new(store.clone());
    let fulfillment = FulfillmentService::new(store.clone(), notifier, admin_email);
    let checkout = CheckoutService::new(store.clone(), InMemoryPaymentGateway::new());

    Arc::new(AppState {
        fulfillment,
        checkout,
        store,
    })
}

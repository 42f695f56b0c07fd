//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use docstore::{DocumentStoreExt, InMemoryDocumentStore};
use domain::{
    CartItem, CheckoutSession, Money, PaymentId, Product, ProductId, UserAccount, UserId,
    collections,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, InMemoryDocumentStore) {
    let store = InMemoryDocumentStore::new();
    let state = api::create_default_state(store.clone(), "ops@example.com");
    let app = api::create_app(state, get_metrics_handle());
    (app, store)
}

async fn seed_catalog(store: &InMemoryDocumentStore) {
    store
        .set_as(
            &collections::product_doc(&ProductId::new("p1")),
            &Product {
                name: "Widget".to_string(),
                price: Money::from_minor_units(999),
                stock: 10,
                sold: 0,
                images: vec![],
            },
        )
        .await
        .unwrap();
    store
        .set_as(
            &collections::user_doc(&UserId::new("u1")),
            &UserAccount {
                email: "u1@example.com".to_string(),
                loyalty_points: 0,
                cart: vec![],
                address: None,
            },
        )
        .await
        .unwrap();
}

async fn post_json(app: axum::Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _store) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "storefront-api");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _store) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_checkout_creates_payment_intent_and_session() {
    let (app, store) = setup();
    seed_catalog(&store).await;

    let (status, json) = post_json(
        app,
        "/checkout",
        json!({
            "user_id": "u1",
            "items": [{"product_id": "p1", "quantity": 2}],
            "loyalty_points_requested": 0,
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let intent_id = json["payment_intent_id"].as_str().unwrap();
    assert!(json["client_secret"].as_str().unwrap().contains(intent_id));

    let session: CheckoutSession = store
        .get_as(&collections::session_doc(&PaymentId::new(intent_id)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.cart_total().minor_units(), 1998);
}

#[tokio::test]
async fn test_checkout_rejects_empty_cart() {
    let (app, _store) = setup();

    let (status, json) = post_json(
        app,
        "/checkout",
        json!({"user_id": "u1", "items": []}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "cart is empty");
}

#[tokio::test]
async fn test_checkout_rejects_unknown_product() {
    let (app, store) = setup();
    seed_catalog(&store).await;

    let (status, _json) = post_json(
        app,
        "/checkout",
        json!({
            "user_id": "u1",
            "items": [{"product_id": "ghost", "quantity": 1}],
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_fulfills_confirmed_payment() {
    let (app, store) = setup();
    seed_catalog(&store).await;

    store
        .set_as(
            &collections::session_doc(&PaymentId::new("pi_1")),
            &CheckoutSession {
                user_id: UserId::new("u1"),
                cart: vec![CartItem {
                    product_id: ProductId::new("p1"),
                    name: "Widget".to_string(),
                    quantity: 1,
                    unit_price: Money::from_minor_units(999),
                }],
                loyalty_points_requested: 0,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();

    let (status, json) = post_json(
        app,
        "/webhooks/payment",
        json!({
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_1", "amount": 999}},
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received"], true);

    let product: Product = store
        .get_as(&collections::product_doc(&ProductId::new("p1")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock, 9);

    let orders = store.ids_in_collection(collections::ORDERS).await;
    assert_eq!(orders.len(), 1);

    // Session consumed, confirmation queued for the mailer.
    assert!(
        !store
            .exists(&collections::session_doc(&PaymentId::new("pi_1")))
            .await
            .unwrap()
    );
    assert_eq!(store.ids_in_collection(collections::NOTIFICATIONS).await.len(), 2);
}

#[tokio::test]
async fn test_webhook_acknowledges_failed_fulfillment() {
    let (app, store) = setup();
    seed_catalog(&store).await;

    // No session staged for this payment.
    let (status, json) = post_json(
        app,
        "/webhooks/payment",
        json!({
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_unknown", "amount": 999}},
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received"], true);
    assert!(store.ids_in_collection(collections::ORDERS).await.is_empty());
}

#[tokio::test]
async fn test_webhook_skips_fulfillment_for_failed_payments() {
    let (app, store) = setup();

    let (status, json) = post_json(
        app,
        "/webhooks/payment",
        json!({
            "type": "payment_intent.payment_failed",
            "data": {"object": {"id": "pi_1", "amount": 999}},
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received"], true);
    assert!(store.ids_in_collection(collections::ORDERS).await.is_empty());
}

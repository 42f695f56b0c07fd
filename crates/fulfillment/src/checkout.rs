//! Checkout: server-side cart pricing and payment intent creation.
//!
//! Client-submitted carts carry product IDs and quantities only. All
//! prices come from the live catalog so a tampered client cannot set
//! its own totals.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use docstore::{DocStoreError, DocumentStore, DocumentStoreExt};
use domain::{
    CartItem, CheckoutSession, Money, PaymentId, PaymentIntent, PaymentMetadata, Product,
    ProductId, UserId, collections,
};
use serde::Deserialize;

/// Smallest amount the payment processor accepts.
pub const MINIMUM_CHARGE: Money = Money::from_minor_units(50);

/// An unpriced cart line as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid loyalty point redemption: {0}")]
    InvalidRedemption(i64),

    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("amount {amount} is below the minimum charge of {minimum}")]
    AmountBelowMinimum { amount: Money, minimum: Money },

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("document store error: {0}")]
    Store(#[from] DocStoreError),
}

/// Payment processor client. The production implementation talks to
/// the processor's API; tests use [`InMemoryPaymentGateway`].
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        amount: Money,
        metadata: PaymentMetadata,
    ) -> Result<PaymentIntent, CheckoutError>;
}

/// In-memory gateway for tests with failure injection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<GatewayState>>,
}

#[derive(Debug, Default)]
struct GatewayState {
    intents: Vec<(PaymentId, Money)>,
    fail_on_create: bool,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    pub fn intent_count(&self) -> usize {
        self.state.read().unwrap().intents.len()
    }

    pub fn has_intent(&self, id: &PaymentId) -> bool {
        self.state
            .read()
            .unwrap()
            .intents
            .iter()
            .any(|(intent_id, _)| intent_id == id)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount: Money,
        _metadata: PaymentMetadata,
    ) -> Result<PaymentIntent, CheckoutError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_create {
            return Err(CheckoutError::Gateway(
                "simulated gateway failure".to_string(),
            ));
        }
        let id = PaymentId::new(format!("PI-{:04}", state.intents.len() + 1));
        state.intents.push((id.clone(), amount));
        Ok(PaymentIntent {
            client_secret: format!("{}_secret", id.as_str()),
            id,
        })
    }
}

/// Prices carts, creates payment intents, and stages checkout sessions.
#[derive(Debug, Clone)]
pub struct CheckoutService<S, G> {
    store: S,
    gateway: G,
}

impl<S, G> CheckoutService<S, G>
where
    S: DocumentStore,
    G: PaymentGateway,
{
    pub fn new(store: S, gateway: G) -> Self {
        Self { store, gateway }
    }

    /// Prices the cart from the catalog, creates a payment intent for
    /// the total, and writes the checkout session keyed by the intent
    /// ID. Returns the intent for the client to confirm.
    #[tracing::instrument(skip(self, lines), fields(user_id = %user_id, lines = lines.len()))]
    pub async fn begin_checkout(
        &self,
        user_id: UserId,
        lines: Vec<CartLine>,
        loyalty_points_requested: i64,
    ) -> Result<PaymentIntent, CheckoutError> {
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if loyalty_points_requested < 0 {
            return Err(CheckoutError::InvalidRedemption(loyalty_points_requested));
        }

        let refs: Vec<_> = lines
            .iter()
            .map(|line| collections::product_doc(&line.product_id))
            .collect();
        let docs = self.store.get_many(&refs).await?;

        let mut cart = Vec::with_capacity(lines.len());
        let mut total = Money::zero();
        for (line, doc) in lines.iter().zip(docs) {
            let Some(doc) = doc else {
                return Err(CheckoutError::ProductNotFound(line.product_id.clone()));
            };
            let product: Product = doc.decode()?;
            let item = CartItem {
                product_id: line.product_id.clone(),
                name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
            };
            total += item.line_total();
            cart.push(item);
        }

        if total < MINIMUM_CHARGE {
            return Err(CheckoutError::AmountBelowMinimum {
                amount: total,
                minimum: MINIMUM_CHARGE,
            });
        }

        let metadata = PaymentMetadata {
            user_id: Some(user_id.clone()),
            loyalty_points_used: Some(loyalty_points_requested),
        };
        let intent = self.gateway.create_payment_intent(total, metadata).await?;

        let session = CheckoutSession {
            user_id,
            cart,
            loyalty_points_requested,
            created_at: Utc::now(),
        };
        self.store
            .set_as(&collections::session_doc(&intent.id), &session)
            .await?;

        tracing::info!(payment_id = %intent.id, total = %total, "checkout session staged");
        metrics::counter!("checkout_sessions_created_total").increment(1);

        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore::InMemoryDocumentStore;
    use serde_json::json;

    async fn seed_product(store: &InMemoryDocumentStore, id: &str, price_cents: i64) {
        store
            .set(
                &collections::product_doc(&ProductId::new(id)),
                json!({"name": format!("Product {id}"), "price": {"cents": price_cents}, "stock": 10}),
            )
            .await
            .unwrap();
    }

    fn line(id: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    fn service(
        store: &InMemoryDocumentStore,
    ) -> CheckoutService<InMemoryDocumentStore, InMemoryPaymentGateway> {
        CheckoutService::new(store.clone(), InMemoryPaymentGateway::new())
    }

    #[tokio::test]
    async fn begin_checkout_prices_from_catalog_and_stages_session() {
        let store = InMemoryDocumentStore::new();
        seed_product(&store, "p1", 500).await;
        seed_product(&store, "p2", 250).await;
        let service = service(&store);

        let intent = service
            .begin_checkout(UserId::new("u1"), vec![line("p1", 2), line("p2", 1)], 10)
            .await
            .unwrap();

        let session: CheckoutSession = store
            .get_as(&collections::session_doc(&intent.id))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(session.user_id, UserId::new("u1"));
        assert_eq!(session.cart_total().minor_units(), 1250);
        assert_eq!(session.loyalty_points_requested, 10);
        assert_eq!(session.cart[0].name, "Product p1");
    }

    #[tokio::test]
    async fn begin_checkout_rejects_empty_cart() {
        let store = InMemoryDocumentStore::new();
        let service = service(&store);

        let result = service.begin_checkout(UserId::new("u1"), vec![], 0).await;
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[tokio::test]
    async fn begin_checkout_rejects_negative_redemption() {
        let store = InMemoryDocumentStore::new();
        seed_product(&store, "p1", 500).await;
        let service = service(&store);

        let result = service
            .begin_checkout(UserId::new("u1"), vec![line("p1", 1)], -5)
            .await;
        assert!(matches!(result, Err(CheckoutError::InvalidRedemption(-5))));
    }

    #[tokio::test]
    async fn begin_checkout_rejects_unknown_product() {
        let store = InMemoryDocumentStore::new();
        seed_product(&store, "p1", 500).await;
        let service = service(&store);

        let result = service
            .begin_checkout(UserId::new("u1"), vec![line("p1", 1), line("ghost", 1)], 0)
            .await;
        assert!(matches!(result, Err(CheckoutError::ProductNotFound(id)) if id.as_str() == "ghost"));
    }

    #[tokio::test]
    async fn begin_checkout_enforces_minimum_charge() {
        let store = InMemoryDocumentStore::new();
        seed_product(&store, "cheap", 49).await;
        let service = service(&store);

        let result = service
            .begin_checkout(UserId::new("u1"), vec![line("cheap", 1)], 0)
            .await;
        assert!(matches!(
            result,
            Err(CheckoutError::AmountBelowMinimum { .. })
        ));

        // No session may be staged for a rejected checkout.
        assert!(
            store
                .ids_in_collection(collections::CHECKOUT_SESSIONS).await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn gateway_failure_stages_no_session() {
        let store = InMemoryDocumentStore::new();
        seed_product(&store, "p1", 500).await;
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_create(true);
        let service = CheckoutService::new(store.clone(), gateway);

        let result = service
            .begin_checkout(UserId::new("u1"), vec![line("p1", 1)], 0)
            .await;
        assert!(matches!(result, Err(CheckoutError::Gateway(_))));
        assert!(
            store
                .ids_in_collection(collections::CHECKOUT_SESSIONS).await
                .is_empty()
        );
    }
}

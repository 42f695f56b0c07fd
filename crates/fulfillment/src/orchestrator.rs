//! The fulfillment workflow: the single place where a confirmed
//! payment is turned into an order.

use std::time::Instant;

use docstore::{DocRef, DocumentStore, DocumentStoreExt, Transaction, run_transaction};
use domain::{
    CartItem, CheckoutSession, DomainError, Money, Order, OrderId, OrderStatus,
    PaymentConfirmation, Product, UserAccount, UserId, collections,
};
use serde_json::json;

use crate::error::FulfillmentError;
use crate::notify::{Notification, NotificationSink};

/// Loyalty points awarded per whole currency unit charged.
pub const POINTS_PER_WHOLE_UNIT: i64 = 1;

/// Everything the post-commit steps need from a committed fulfillment.
#[derive(Debug, Clone)]
pub struct FulfilledOrder {
    pub order_id: OrderId,
    pub order: Order,
    pub customer_email: String,
    pub points_awarded: i64,
}

/// Turns confirmed payments into orders.
///
/// On success the transaction atomically decrements stock, settles
/// loyalty points, records the order, and clears the customer's cart.
/// Notifications are dispatched after commit and never affect the
/// outcome. The checkout session is deleted in every case.
#[derive(Debug, Clone)]
pub struct FulfillmentService<S, N> {
    store: S,
    notifier: N,
    admin_email: String,
}

impl<S, N> FulfillmentService<S, N>
where
    S: DocumentStore,
    N: NotificationSink,
{
    pub fn new(store: S, notifier: N, admin_email: impl Into<String>) -> Self {
        Self {
            store,
            notifier,
            admin_email: admin_email.into(),
        }
    }

    /// Handles a confirmed payment end to end. Returns the order ID on
    /// success; the error describes why no order was placed.
    #[tracing::instrument(skip(self, confirmation), fields(payment_id = %confirmation.id))]
    pub async fn fulfill_order(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<OrderId, FulfillmentError> {
        metrics::counter!("fulfillment_attempts_total").increment(1);
        let start = Instant::now();
        let session_ref = collections::session_doc(&confirmation.id);

        // Known race: the session read happens outside the transaction,
        // so two concurrent deliveries of the same confirmation can both
        // observe the session and fulfill twice. See DESIGN.md.
        let session: Option<CheckoutSession> = self.store.get_as(&session_ref).await?;

        // An absent session means the payment was already processed or
        // never staged a checkout. Processors replay webhooks, so this
        // is routine: log and stop, no notifications.
        let Some(session) = session else {
            tracing::warn!("no checkout session found, nothing to fulfill");
            return Err(FulfillmentError::SessionNotFound(confirmation.id.clone()));
        };

        let result = self.run_fulfillment(&confirmation, &session).await;

        match &result {
            Ok(fulfilled) => {
                metrics::counter!("fulfillment_completed_total").increment(1);
                tracing::info!(
                    order_id = %fulfilled.order_id,
                    total = %fulfilled.order.total,
                    points_awarded = fulfilled.points_awarded,
                    "order fulfilled"
                );
                self.notify_success(fulfilled).await;
            }
            Err(err) => {
                metrics::counter!("fulfillment_failed_total").increment(1);
                tracing::error!(error = %err, "fulfillment failed");
                self.notify_failure(&confirmation, &session, err).await;
            }
        }

        // The session goes away whether fulfillment succeeded or not:
        // a replayed confirmation must never act on stale cart state.
        if let Err(err) = self.store.delete(&session_ref).await {
            tracing::error!(doc = %session_ref, error = %err, "failed to delete checkout session");
        }

        metrics::histogram!("fulfillment_duration_seconds").record(start.elapsed().as_secs_f64());
        result.map(|fulfilled| fulfilled.order_id)
    }

    /// The transactional core. Re-run from scratch on version
    /// conflicts, so it must stay free of side effects.
    async fn run_fulfillment(
        &self,
        confirmation: &PaymentConfirmation,
        session: &CheckoutSession,
    ) -> Result<FulfilledOrder, FulfillmentError> {
        // Stable across retries so contention cannot mint two orders.
        let order_id = OrderId::new();
        let user_ref = collections::user_doc(&session.user_id);

        // The closure owns its captures: async closures that capture by
        // reference cannot currently be proven `Send` in generic contexts.
        let confirmation = confirmation.clone();
        let session = session.clone();

        let fulfilled = run_transaction(&self.store, async move |tx: &mut Transaction<'_, S>| {
            let account = read_account(tx, &user_ref, &session.user_id).await?;

            let product_refs: Vec<DocRef> = session
                .cart
                .iter()
                .map(|item| collections::product_doc(&item.product_id))
                .collect();
            let product_docs: Vec<Option<serde_json::Value>> = tx.get_many(&product_refs).await?;

            let mut items = Vec::with_capacity(session.cart.len());
            for ((cart_item, product_ref), raw) in
                session.cart.iter().zip(&product_refs).zip(product_docs)
            {
                let product: Product = raw
                    .and_then(|value| serde_json::from_value(value).ok())
                    .ok_or_else(|| {
                        FulfillmentError::Domain(DomainError::ProductNotFound(
                            cart_item.product_id.clone(),
                        ))
                    })?;

                if product.stock < cart_item.quantity as i64 {
                    return Err(DomainError::InsufficientStock {
                        name: product.name,
                        requested: cart_item.quantity,
                        available: product.stock,
                    }
                    .into());
                }

                tx.update(
                    product_ref,
                    json!({
                        "stock": product.stock - cart_item.quantity as i64,
                        "sold": product.sold + cart_item.quantity as i64,
                    }),
                )?;

                // The order records the live catalog name and price at
                // fulfillment time.
                items.push(CartItem {
                    product_id: cart_item.product_id.clone(),
                    name: product.name,
                    quantity: cart_item.quantity,
                    unit_price: product.price,
                });
            }

            let requested = session.loyalty_points_requested;
            if requested < 0 {
                return Err(DomainError::InvalidRedemption(requested).into());
            }
            if requested > account.loyalty_points {
                return Err(DomainError::InsufficientLoyaltyPoints {
                    requested,
                    available: account.loyalty_points,
                }
                .into());
            }

            let total = Money::from_minor_units(confirmation.amount_minor_units);
            let points_awarded = total.whole_units() * POINTS_PER_WHOLE_UNIT;
            let new_balance = account.loyalty_points - requested + points_awarded;

            let now = chrono::Utc::now();
            let order = Order {
                user_id: session.user_id.clone(),
                items,
                total,
                payment_id: confirmation.id.clone(),
                status: OrderStatus::Processing,
                shipping_address: account.address.clone(),
                created_at: now,
                updated_at: now,
            };
            tx.set(&collections::order_doc(&order_id), &order)?;

            tx.update(
                &user_ref,
                json!({
                    "loyalty_points": new_balance,
                    "cart": [],
                }),
            )?;

            Ok::<_, FulfillmentError>(FulfilledOrder {
                order_id,
                order,
                customer_email: account.email,
                points_awarded,
            })
        })
        .await?;

        Ok(fulfilled)
    }

    async fn notify_success(&self, fulfilled: &FulfilledOrder) {
        self.enqueue(Notification::order_confirmation(
            &fulfilled.customer_email,
            &fulfilled.order_id,
        ))
        .await;
        self.enqueue(Notification::sale_confirmation_admin(
            &self.admin_email,
            &fulfilled.order_id,
            &fulfilled.order.total.to_string(),
        ))
        .await;
    }

    async fn notify_failure(
        &self,
        confirmation: &PaymentConfirmation,
        session: &CheckoutSession,
        err: &FulfillmentError,
    ) {
        if let Some(email) = self.lookup_customer_email(&session.user_id).await {
            self.enqueue(Notification::order_failure_customer(
                &email,
                &confirmation.id,
            ))
            .await;
        }
        self.enqueue(Notification::order_failure_admin(
            &self.admin_email,
            &confirmation.id,
            &err.to_string(),
        ))
        .await;
    }

    async fn lookup_customer_email(&self, user_id: &UserId) -> Option<String> {
        match self
            .store
            .get_as::<UserAccount>(&collections::user_doc(user_id))
            .await
        {
            Ok(account) => account.map(|a| a.email),
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "failed to look up customer email");
                None
            }
        }
    }

    async fn enqueue(&self, notification: Notification) {
        if let Err(err) = self.notifier.enqueue(notification).await {
            tracing::warn!(error = %err, "failed to enqueue notification");
        }
    }
}

async fn read_account<S: DocumentStore>(
    tx: &mut Transaction<'_, S>,
    user_ref: &DocRef,
    user_id: &UserId,
) -> Result<UserAccount, FulfillmentError> {
    let raw: Option<serde_json::Value> = tx.get(user_ref).await?;
    // A document that does not decode as an account is treated the same
    // as a missing one.
    raw.and_then(|value| serde_json::from_value(value).ok())
        .ok_or_else(|| FulfillmentError::Domain(DomainError::AccountNotFound(user_id.clone())))
}

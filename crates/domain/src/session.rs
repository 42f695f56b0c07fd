//! Checkout sessions staged between payment intent creation and the
//! fulfillment webhook.

use crate::{Money, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A priced line in a cart or order.
///
/// The name and unit price are captured from the catalog at checkout
/// time so the order record reflects what the customer actually paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    /// Line total: unit price times quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// The server-side record of a checkout in flight, written when the
/// payment intent is created and consumed by the fulfillment webhook.
/// Keyed by the payment intent ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub user_id: UserId,
    pub cart: Vec<CartItem>,
    /// Loyalty points the customer asked to redeem. Validated against
    /// the live balance inside the fulfillment transaction.
    #[serde(default)]
    pub loyalty_points_requested: i64,
    pub created_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// Sum of all line totals.
    pub fn cart_total(&self) -> Money {
        self.cart.iter().map(CartItem::line_total).sum()
    }
}

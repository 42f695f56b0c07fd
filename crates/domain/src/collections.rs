//! Well-known document collections.

use crate::{OrderId, PaymentId, ProductId, UserId};
use docstore::DocRef;

/// Customer account documents, keyed by user ID.
pub const USERS: &str = "users";

/// Product catalog documents, keyed by product ID.
pub const PRODUCTS: &str = "products";

/// Completed order documents, keyed by order ID.
pub const ORDERS: &str = "orders";

/// Pending checkout sessions, keyed by payment intent ID.
pub const CHECKOUT_SESSIONS: &str = "checkout_sessions";

/// Queued notification documents, keyed by a random UUID.
pub const NOTIFICATIONS: &str = "notifications";

/// Document reference for a user account.
pub fn user_doc(id: &UserId) -> DocRef {
    DocRef::new(USERS, id.as_str())
}

/// Document reference for a catalog product.
pub fn product_doc(id: &ProductId) -> DocRef {
    DocRef::new(PRODUCTS, id.as_str())
}

/// Document reference for an order.
pub fn order_doc(id: &OrderId) -> DocRef {
    DocRef::new(ORDERS, id.to_string())
}

/// Document reference for the checkout session tied to a payment.
pub fn session_doc(id: &PaymentId) -> DocRef {
    DocRef::new(CHECKOUT_SESSIONS, id.as_str())
}

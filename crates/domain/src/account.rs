//! Customer account records.

use crate::session::CartItem;
use serde::{Deserialize, Serialize};

/// A customer account as persisted in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub email: String,
    #[serde(default)]
    pub loyalty_points: i64,
    /// The customer's working cart, cleared when an order completes.
    #[serde(default)]
    pub cart: Vec<CartItem>,
    /// Free-form shipping address, copied verbatim onto orders.
    #[serde(default)]
    pub address: Option<serde_json::Value>,
}

//! Product catalog records.

use crate::Money;
use serde::{Deserialize, Serialize};

/// A catalog product as persisted in the `products` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub price: Money,
    /// Units currently available for sale.
    pub stock: i64,
    /// Lifetime units sold, bumped alongside stock decrements.
    #[serde(default)]
    pub sold: i64,
    #[serde(default)]
    pub images: Vec<String>,
}

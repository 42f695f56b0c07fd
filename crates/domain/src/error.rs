//! Domain-level failure taxonomy.
//!
//! These are the business reasons a fulfillment transaction aborts.
//! They are terminal: retrying the same transaction cannot succeed
//! until the underlying data changes.

use crate::{ProductId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        name: String,
        requested: u32,
        available: i64,
    },

    #[error("insufficient loyalty points: requested {requested}, available {available}")]
    InsufficientLoyaltyPoints { requested: i64, available: i64 },

    #[error("invalid loyalty point redemption: {0}")]
    InvalidRedemption(i64),

    #[error("account not found: {0}")]
    AccountNotFound(UserId),

    #[error("product not found: {0}")]
    ProductNotFound(ProductId),
}

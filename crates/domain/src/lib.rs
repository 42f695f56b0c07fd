//! Domain layer for the storefront back end.
//!
//! This crate provides the typed records persisted in the document store
//! and the value objects shared across services:
//! - identifiers (`UserId`, `ProductId`, `OrderId`, `PaymentId`)
//! - `Money` in minor currency units
//! - persisted records (`Product`, `UserAccount`, `Order`, `CheckoutSession`)
//! - the payment-processor webhook payload subset
//! - the domain abort taxonomy (`DomainError`)

pub mod account;
pub mod catalog;
pub mod collections;
pub mod error;
pub mod ids;
pub mod money;
pub mod order;
pub mod payment;
pub mod session;

pub use account::UserAccount;
pub use catalog::Product;
pub use error::DomainError;
pub use ids::{OrderId, PaymentId, ProductId, UserId};
pub use money::Money;
pub use order::{Order, OrderStatus};
pub use payment::{PaymentConfirmation, PaymentIntent, PaymentMetadata};
pub use session::{CartItem, CheckoutSession};

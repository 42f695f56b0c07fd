//! Order fulfillment and checkout services.
//!
//! The centerpiece is [`FulfillmentService`], which reacts to a
//! confirmed payment by atomically decrementing stock, settling
//! loyalty points, recording the order, and clearing the cart, then
//! dispatching best-effort notifications and removing the checkout
//! session.
//!
//! [`CheckoutService`] is the other half of the handshake: it prices
//! the cart server-side, creates the payment intent, and stages the
//! checkout session the webhook later consumes.

pub mod checkout;
pub mod error;
pub mod notify;
pub mod orchestrator;

pub use checkout::{
    CartLine, CheckoutError, CheckoutService, InMemoryPaymentGateway, MINIMUM_CHARGE,
    PaymentGateway,
};
pub use error::FulfillmentError;
pub use notify::{
    InMemoryNotificationSink, Notification, NotificationKind, NotificationSink, NotifyError,
    StoreNotificationSink,
};
pub use orchestrator::{FulfilledOrder, FulfillmentService, POINTS_PER_WHOLE_UNIT};

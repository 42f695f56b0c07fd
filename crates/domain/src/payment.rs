//! Payment-processor payloads.
//!
//! Only the subset of the processor's webhook and intent objects that
//! fulfillment actually reads is modelled here. Unknown fields are
//! ignored on deserialization.

use crate::{PaymentId, UserId};
use serde::{Deserialize, Serialize};

/// A confirmed payment, as delivered by the processor's webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub id: PaymentId,
    /// Amount charged, in minor currency units.
    #[serde(rename = "amount")]
    pub amount_minor_units: i64,
    #[serde(default)]
    pub metadata: PaymentMetadata,
}

/// Metadata attached to the payment intent at creation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub loyalty_points_used: Option<i64>,
}

/// A freshly created payment intent, returned to the client so it can
/// confirm the charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: PaymentId,
    pub client_secret: String,
}

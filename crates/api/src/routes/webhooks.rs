//! Payment-processor webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use docstore::DocumentStore;
use domain::PaymentConfirmation;
use serde::{Deserialize, Serialize};

use super::AppState;

/// A webhook event envelope as delivered by the payment processor.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

/// POST /webhooks/payment — receives payment events.
///
/// Always acknowledges with 200 so the processor does not retry
/// deliveries whose failures a retry cannot fix. Fulfillment failures
/// are logged and surfaced through notifications instead.
#[tracing::instrument(skip(state, event), fields(event_type = %event.event_type))]
pub async fn payment<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(event): Json<WebhookEvent>,
) -> Json<WebhookResponse> {
    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            match serde_json::from_value::<PaymentConfirmation>(event.data.object) {
                Ok(confirmation) => {
                    if let Err(err) = state.fulfillment.fulfill_order(confirmation).await {
                        tracing::error!(error = %err, "fulfillment failed for confirmed payment");
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "malformed payment confirmation payload");
                }
            }
        }
        "payment_intent.payment_failed" => {
            tracing::warn!("payment failed, no fulfillment attempted");
        }
        other => {
            tracing::debug!(event_type = %other, "ignoring unhandled webhook event");
        }
    }

    Json(WebhookResponse { received: true })
}

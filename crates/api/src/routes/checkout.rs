//! Checkout endpoint: prices the cart and creates a payment intent.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use docstore::DocumentStore;
use fulfillment::CartLine;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub loyalty_points_requested: i64,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub payment_intent_id: String,
    pub client_secret: String,
}

/// POST /checkout — prices the submitted cart server-side and returns
/// a payment intent for the client to confirm.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    if req.user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }

    let intent = state
        .checkout
        .begin_checkout(
            req.user_id.into(),
            req.items,
            req.loyalty_points_requested,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            payment_intent_id: intent.id.to_string(),
            client_secret: intent.client_secret,
        }),
    ))
}

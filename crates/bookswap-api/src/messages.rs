use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use bookswap_types::api::{Claims, SendMessageRequest};
use bookswap_types::models::Message;

use crate::error::ApiError;
use crate::extract::{JsonBody, parse_product_id};
use crate::state::AppState;

/// Only the seller and the matched requester may read or write a listing's chat.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let product_id = parse_product_id(&id)?;

    let product = state
        .run_db(move |db| db.get_product(product_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    if !product.is_participant(claims.id) {
        warn!("User {} denied chat history of product {}", claims.id, product_id);
        return Err(ApiError::forbidden(
            "Not authorized to view messages for this product",
        ));
    }

    let messages = state.run_db(move |db| db.list_messages(product_id)).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product_id = parse_product_id(&id)?;
    let sender_id = claims.id;
    let (product, sender) = state
        .run_db(move |db| Ok((db.get_product(product_id)?, db.get_user_by_id(sender_id)?)))
        .await?;
    let (Some(product), Some(sender)) = (product, sender) else {
        return Err(ApiError::not_found("Product or sender not found"));
    };

    // Participation only ever grows (a listing gains a matched user and never
    // loses it), so a check made here still holds at insert time.
    if !product.is_participant(sender_id) {
        warn!("User {} denied sending on product {}", sender_id, product_id);
        return Err(ApiError::forbidden(
            "Not authorized to send messages for this product",
        ));
    }
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message text is required"));
    }

    let message = Message {
        id: Uuid::new_v4(),
        product_id,
        sender_id,
        sender_name: sender.name,
        message: req.message,
        created_at: Utc::now(),
    };

    let stored = message.clone();
    state.run_db(move |db| db.create_message(&stored)).await?;
    info!("Message {} posted on product {}", message.id, product_id);

    Ok((StatusCode::CREATED, Json(message)))
}

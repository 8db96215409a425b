use axum::extract::{FromRequest, FromRequestParts};
use uuid::Uuid;

use crate::error::ApiError;

/// `axum::Json` whose rejections come back as `{ "message": ... }` bodies.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// `axum::extract::Query` with the same error body as [`JsonBody`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

/// Listing ids arrive as path strings; anything that is not a UUID cannot
/// name an existing listing.
pub fn parse_product_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse::<Uuid>()
        .map_err(|_| ApiError::not_found("Product not found"))
}

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use bookswap_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Decode and validate a token signed with `secret`.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Extract and validate the bearer token from the Authorization header.
/// On success the decoded [`Claims`] are available to handlers as an `Extension`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Not authorized, no token"))?;

    let claims = verify_token(&state.jwt_secret, token).map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::unauthorized("Not authorized, token failed")
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

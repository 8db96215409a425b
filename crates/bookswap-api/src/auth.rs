use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use bookswap_db::models::UserRow;
use bookswap_types::api::{Claims, LoginRequest, RegisterRequest, UserInfo};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::state::AppState;

/// Tokens stay valid this long after issuance.
pub const TOKEN_TTL_DAYS: i64 = 30;

/// POST /api/users
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_string();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Name, email and password are required"));
    }

    let lookup = email.clone();
    if state
        .run_db(move |db| db.get_user_by_email(&lookup))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let password_hash = hash_password_blocking(req.password).await?;

    let row = UserRow {
        id: Uuid::new_v4(),
        name,
        email,
        password: password_hash,
        created_at: Utc::now(),
    };
    let user = row.to_user();

    // The UNIQUE constraint settles races between two registrations of one email.
    if !state.run_db(move |db| db.create_user(&row)).await? {
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let token = create_token(&state.jwt_secret, user.id)?;
    info!("Registered user {} ({})", user.id, user.email);

    Ok((
        StatusCode::CREATED,
        Json(UserInfo {
            id: user.id,
            name: user.name,
            email: user.email,
            token,
        }),
    ))
}

/// POST /api/users/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::unauthorized("Invalid email or password");

    let email = req.email.trim().to_string();
    let user = state
        .run_db(move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(invalid)?;

    let stored = user.password.clone();
    let password = req.password;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(e.into()))??;
    if !verified {
        return Err(invalid());
    }

    let token = create_token(&state.jwt_secret, user.id)?;

    Ok(Json(UserInfo {
        id: user.id,
        name: user.name,
        email: user.email,
        token,
    }))
}

/// GET /api/users/profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .run_db(move |db| db.get_user_by_id(claims.id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user.to_user()))
}

/// Argon2id PHC string for `password` with a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

async fn hash_password_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(ApiError::Internal)
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| anyhow::anyhow!("stored password hash is corrupt: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(secret: &str, user_id: Uuid) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        id: user_id,
        iat: now.timestamp() as usize,
        exp: (now + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::verify_token;

    #[test]
    fn token_round_trips_user_id() {
        let id = Uuid::new_v4();
        let token = create_token("secret", id).unwrap();
        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.id, id);

        let ttl = claims.exp - claims.iat;
        assert_eq!(ttl, (TOKEN_TTL_DAYS * 24 * 60 * 60) as usize);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = create_token("secret", Uuid::new_v4()).unwrap();
        assert!(verify_token("another", &token).is_err());
        assert!(verify_token("secret", "not-a-token").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let past = Utc::now() - chrono::Duration::days(31);
        let claims = Claims {
            id: Uuid::new_v4(),
            iat: past.timestamp() as usize,
            exp: (past + chrono::Duration::days(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(verify_token("secret", &token).is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
        assert!(verify_password("hunter22", "garbage").is_err());
    }
}

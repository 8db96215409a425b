//! Database row types that never leave the DB/API boundary.
//! Listings, notifications and messages map straight onto bookswap-types models.
use chrono::{DateTime, Utc};
use uuid::Uuid;

use bookswap_types::models::User;

pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

use anyhow::Result;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use bookswap_types::models::{Category, Product};

use crate::Database;
use crate::models::UserRow;

pub const DEMO_SELLER_EMAIL: &str = "demo@bookswap.local";
const DEMO_SELLER_NAME: &str = "Demo Seller";

const DEMO_LISTINGS: [(&str, &str, Category); 3] = [
    ("Introduction to React", "Covers the basics of React.", Category::Ru),
    ("Foundations of Statistics", "An introductory statistics text.", Category::Rb),
    (
        "Web Design Textbook",
        "HTML, CSS and JavaScript fundamentals.",
        Category::Rd,
    ),
];

/// Creates the demo seller and a few listings on an empty store.
/// Returns the number of listings created; zero if the store already had listings.
pub fn seed_demo(db: &Database, password_hash: &str) -> Result<usize> {
    if db.count_products()? > 0 {
        return Ok(0);
    }

    let seller = match db.get_user_by_email(DEMO_SELLER_EMAIL)? {
        Some(seller) => seller,
        None => {
            let row = UserRow {
                id: Uuid::new_v4(),
                name: DEMO_SELLER_NAME.to_string(),
                email: DEMO_SELLER_EMAIL.to_string(),
                password: password_hash.to_string(),
                created_at: Utc::now(),
            };
            db.create_user(&row)?;
            row
        }
    };

    for (name, description, category) in DEMO_LISTINGS {
        db.create_product(&Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            image: "/uploads/sample.jpg".to_string(),
            description: description.to_string(),
            category,
            seller_id: seller.id,
            seller_name: seller.name.clone(),
            requesters: vec![],
            is_sold: false,
            matched_user: None,
            created_at: Utc::now(),
        })?;
    }

    info!("Seeded {} demo listings for {}", DEMO_LISTINGS.len(), DEMO_SELLER_EMAIL);
    Ok(DEMO_LISTINGS.len())
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public view of a registered user. The password hash never leaves the DB layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Faculty code a textbook is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "RU")]
    Ru,
    #[serde(rename = "RB")]
    Rb,
    #[serde(rename = "RD")]
    Rd,
    #[serde(rename = "RE")]
    Re,
    #[serde(rename = "RM")]
    Rm,
    #[serde(rename = "RG")]
    Rg,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Ru,
        Category::Rb,
        Category::Rd,
        Category::Re,
        Category::Rm,
        Category::Rg,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Ru => "RU",
            Self::Rb => "RB",
            Self::Rd => "RD",
            Self::Re => "RE",
            Self::Rm => "RM",
            Self::Rg => "RG",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category code '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.code() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// A textbook listing.
///
/// `is_sold` and `matched_user` move together: a listing is sold exactly when
/// a matched user is recorded, and the matched user was one of `requesters`
/// at the time of the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub description: String,
    pub category: Category,
    pub seller_id: Uuid,
    pub seller_name: String,
    /// Requester ids in the order they asked.
    pub requesters: Vec<Uuid>,
    pub is_sold: bool,
    pub matched_user: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Seller or matched requester: the two parties allowed into the chat.
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.seller_id == user_id || self.matched_user == Some(user_id)
    }

    pub fn has_requester(&self, user_id: Uuid) -> bool {
        self.requesters.contains(&user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Text delivered to the requester a seller picked.
    pub fn match_message(product_name: &str) -> String {
        format!("「{}」 matched! You can now chat with the seller.", product_name)
    }
}

/// A chat line on a matched listing. `sender_name` is captured at send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_codes_parse_back() {
        for category in Category::ALL {
            assert_eq!(category.code().parse::<Category>().unwrap(), category);
        }
        assert!("rb".parse::<Category>().is_err());
        assert!("".parse::<Category>().is_err());
    }

    #[test]
    fn category_serializes_as_code() {
        let json = serde_json::to_string(&Category::Rb).unwrap();
        assert_eq!(json, "\"RB\"");
    }

    #[test]
    fn participants_are_seller_and_matched_user() {
        let seller = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let product = Product {
            id: Uuid::new_v4(),
            name: "Linear Algebra".into(),
            image: "/uploads/sample.jpg".into(),
            description: String::new(),
            category: Category::Rd,
            seller_id: seller,
            seller_name: "Sato".into(),
            requesters: vec![buyer, stranger],
            is_sold: true,
            matched_user: Some(buyer),
            created_at: Utc::now(),
        };

        assert!(product.is_participant(seller));
        assert!(product.is_participant(buyer));
        assert!(!product.is_participant(stranger));
        assert!(product.has_requester(stranger));
    }
}

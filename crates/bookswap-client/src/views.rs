//! View models: what each screen shows, derived from API data and the
//! current session.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use bookswap_types::models::{Category, Message, Notification, Product, User};

use crate::api::ApiClient;
use crate::error::ClientError;

// -- Home --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryTab {
    #[default]
    All,
    Only(Category),
}

impl CategoryTab {
    /// "All" first, then one tab per category.
    pub fn tabs() -> Vec<CategoryTab> {
        std::iter::once(CategoryTab::All)
            .chain(Category::ALL.into_iter().map(CategoryTab::Only))
            .collect()
    }

    pub fn label(self) -> &'static str {
        match self {
            CategoryTab::All => "All",
            CategoryTab::Only(c) => c.code(),
        }
    }

    pub fn filter(self) -> Option<Category> {
        match self {
            CategoryTab::All => None,
            CategoryTab::Only(c) => Some(c),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HomeView {
    pub active: CategoryTab,
    pub products: Vec<Product>,
}

impl HomeView {
    pub async fn load(client: &ApiClient, tab: CategoryTab) -> Result<Self, ClientError> {
        Ok(Self {
            active: tab,
            products: client.products(tab.filter()).await?,
        })
    }
}

// -- Product page --

#[derive(Debug, Clone)]
pub struct ProductView {
    pub product: Product,
    viewer: Option<Uuid>,
    requested: bool,
}

impl ProductView {
    pub fn new(product: Product, viewer: Option<Uuid>) -> Self {
        let requested = viewer.is_some_and(|id| product.has_requester(id));
        Self {
            product,
            viewer,
            requested,
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.product.is_sold {
            "Recipient decided"
        } else {
            "Open"
        }
    }

    pub fn already_requested(&self) -> bool {
        self.requested
    }

    /// Whether a request button is shown at all: logged in, not the seller,
    /// and the listing is still open.
    pub fn shows_request_button(&self) -> bool {
        match self.viewer {
            Some(id) => id != self.product.seller_id && !self.product.is_sold,
            None => false,
        }
    }

    pub fn can_request(&self) -> bool {
        self.shows_request_button() && !self.requested
    }

    pub fn request_button_label(&self) -> &'static str {
        if self.requested { "Requested" } else { "Request this book" }
    }

    pub fn can_open_chat(&self) -> bool {
        self.product.is_sold && self.viewer.is_some_and(|id| self.product.is_participant(id))
    }

    /// Send the request, mark it locally, then refresh from the server.
    /// A failed refresh keeps the local mark.
    pub async fn request(&mut self, client: &ApiClient) -> Result<(), ClientError> {
        if !self.can_request() {
            return Ok(());
        }
        client.request_product(self.product.id).await?;
        self.requested = true;
        if let Ok(fresh) = client.product(self.product.id).await {
            self.product = fresh;
        }
        Ok(())
    }
}

// -- Profile --

#[derive(Debug, Clone)]
pub struct ListingRow {
    pub product: Product,
}

impl ListingRow {
    pub fn requester_count(&self) -> usize {
        self.product.requesters.len()
    }

    /// Requesters the seller may still pick from. Empty once matched.
    pub fn match_candidates(&self) -> &[Uuid] {
        if self.product.is_sold {
            &[]
        } else {
            &self.product.requesters
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileView {
    pub user: User,
    pub listings: Vec<ListingRow>,
}

impl ProfileView {
    pub async fn load(client: &ApiClient) -> Result<Self, ClientError> {
        let user = client.profile().await?;
        let listings = client
            .my_products()
            .await?
            .into_iter()
            .map(|product| ListingRow { product })
            .collect();
        Ok(Self { user, listings })
    }

    /// Confirm a match, then reload the listings so the row shows as closed.
    pub async fn match_requester(
        &mut self,
        client: &ApiClient,
        product_id: Uuid,
        requester_id: Uuid,
    ) -> Result<(), ClientError> {
        client.match_product(product_id, requester_id).await?;
        info!("Matched product {} with {}", product_id, requester_id);
        *self = Self::load(client).await?;
        Ok(())
    }
}

// -- Matched --

/// Who is on the other side of a matched listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Counterpart {
    /// Viewer is the seller; the matched requester's id.
    Recipient(Uuid),
    /// Viewer is the recipient; the seller's display name.
    Seller(String),
}

#[derive(Debug, Clone)]
pub struct MatchedCard {
    pub product: Product,
    pub counterpart: Counterpart,
}

pub fn matched_cards(products: Vec<Product>, viewer: Uuid) -> Vec<MatchedCard> {
    products
        .into_iter()
        .filter_map(|product| {
            let counterpart = if product.seller_id == viewer {
                Counterpart::Recipient(product.matched_user?)
            } else {
                Counterpart::Seller(product.seller_name.clone())
            };
            Some(MatchedCard {
                product,
                counterpart,
            })
        })
        .collect()
}

// -- Notifications --

#[derive(Debug, Clone, Default)]
pub struct NotificationBadge {
    pub notifications: Vec<Notification>,
}

impl NotificationBadge {
    pub fn new(notifications: Vec<Notification>) -> Self {
        Self { notifications }
    }

    pub fn unread(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    /// Local state only changes once the server has acknowledged.
    pub async fn mark_all_read(&mut self, client: &ApiClient) -> Result<(), ClientError> {
        if self.unread() == 0 {
            return Ok(());
        }
        client.mark_notifications_read().await?;
        for n in &mut self.notifications {
            n.read = true;
        }
        Ok(())
    }
}

// -- Chat --

#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub sender_name: String,
    pub text: String,
    pub mine: bool,
    pub sent_at: DateTime<Utc>,
}

pub fn chat_lines(messages: &[Message], viewer: Uuid) -> Vec<ChatLine> {
    messages
        .iter()
        .map(|m| ChatLine {
            sender_name: m.sender_name.clone(),
            text: m.message.clone(),
            mine: m.sender_id == viewer,
            sent_at: m.created_at,
        })
        .collect()
}

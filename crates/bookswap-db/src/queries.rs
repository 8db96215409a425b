use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use bookswap_types::models::{Category, Message, Notification, Product};

use crate::Database;
use crate::models::UserRow;

/// What happened when a user asked for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Added,
    /// The user was already a requester; nothing changed.
    AlreadyRequested,
    NotFound,
    UnknownUser,
    OwnListing,
    AlreadyMatched,
}

/// What happened when a seller tried to close a listing.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched {
        product: Product,
        notification: Notification,
    },
    NotFound,
    NotSeller,
    AlreadyMatched,
    NotARequester,
}

const PRODUCT_COLUMNS: &str =
    "id, name, image, description, category, seller_id, seller_name, is_sold, matched_user, created_at";

impl Database {
    // -- Users --

    /// Inserts a user. Returns `false` when the email is already registered.
    pub fn create_user(&self, user: &UserRow) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, name, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user.id, user.name, user.email, user.password, user.created_at],
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", &email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id))
    }

    pub fn count_users(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(n as usize)
        })
    }

    // -- Products --

    pub fn create_product(&self, product: &Product) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO products (id, name, image, description, category, seller_id, seller_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    product.id,
                    product.name,
                    product.image,
                    product.description,
                    product.category.code(),
                    product.seller_id,
                    product.seller_name,
                    product.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// All listings, newest first, optionally restricted to one category.
    pub fn list_products(&self, category: Option<Category>) -> Result<Vec<Product>> {
        self.with_conn(|conn| match category {
            Some(category) => query_products(conn, "WHERE category = ?1", [category.code()]),
            None => query_products(conn, "", params![]),
        })
    }

    pub fn list_products_by_seller(&self, seller_id: Uuid) -> Result<Vec<Product>> {
        self.with_conn(|conn| query_products(conn, "WHERE seller_id = ?1", [seller_id]))
    }

    /// Listings the user matched on, either as the chosen requester or as the
    /// seller of a sold listing.
    pub fn list_matched_products(&self, user_id: Uuid) -> Result<Vec<Product>> {
        self.with_conn(|conn| {
            query_products(
                conn,
                "WHERE matched_user = ?1 OR (seller_id = ?1 AND is_sold = 1)",
                [user_id],
            )
        })
    }

    pub fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        self.with_conn(|conn| query_product(conn, id))
    }

    pub fn count_products(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))?;
            Ok(n as usize)
        })
    }

    /// Adds `user_id` to the listing's requesters. Asking twice is a no-op.
    pub fn request_product(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RequestOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let listing: Option<(Uuid, bool)> = tx
                .query_row(
                    "SELECT seller_id, is_sold FROM products WHERE id = ?1",
                    [product_id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            let user_exists = tx
                .query_row("SELECT 1 FROM users WHERE id = ?1", [user_id], |_| Ok(()))
                .optional()?
                .is_some();

            let outcome = match listing {
                None => RequestOutcome::NotFound,
                Some(_) if !user_exists => RequestOutcome::UnknownUser,
                Some((seller_id, _)) if seller_id == user_id => RequestOutcome::OwnListing,
                Some((_, true)) => RequestOutcome::AlreadyMatched,
                Some(_) => {
                    let inserted = tx.execute(
                        "INSERT OR IGNORE INTO product_requests (product_id, user_id, created_at)
                         VALUES (?1, ?2, ?3)",
                        params![product_id, user_id, now],
                    )?;
                    if inserted == 1 {
                        RequestOutcome::Added
                    } else {
                        RequestOutcome::AlreadyRequested
                    }
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Closes a listing on `requester_id` and notifies them.
    ///
    /// The sold flag is flipped with a compare-and-set inside the same
    /// transaction as the notification insert, so at most one match per
    /// listing ever succeeds.
    pub fn match_product(
        &self,
        product_id: Uuid,
        seller_id: Uuid,
        requester_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<MatchOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(mut product) = query_product(&tx, product_id)? else {
                return Ok(MatchOutcome::NotFound);
            };
            if product.seller_id != seller_id {
                return Ok(MatchOutcome::NotSeller);
            }
            if product.is_sold {
                return Ok(MatchOutcome::AlreadyMatched);
            }
            if !product.has_requester(requester_id) {
                return Ok(MatchOutcome::NotARequester);
            }

            let updated = tx.execute(
                "UPDATE products SET is_sold = 1, matched_user = ?2 WHERE id = ?1 AND is_sold = 0",
                params![product_id, requester_id],
            )?;
            if updated == 0 {
                return Ok(MatchOutcome::AlreadyMatched);
            }

            let notification = Notification {
                id: Uuid::new_v4(),
                user_id: requester_id,
                message: Notification::match_message(&product.name),
                read: false,
                created_at: now,
            };
            insert_notification(&tx, &notification)?;
            tx.commit()?;

            product.is_sold = true;
            product.matched_user = Some(requester_id);
            Ok(MatchOutcome::Matched {
                product,
                notification,
            })
        })
    }

    // -- Notifications --

    /// The user's notifications, newest first.
    pub fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, message, read, created_at FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(Notification {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        message: row.get(2)?,
                        read: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Marks every notification owned by `user_id` as read. Returns how many flipped.
    pub fn mark_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                [user_id],
            )?;
            Ok(updated)
        })
    }

    // -- Messages --

    pub fn create_message(&self, message: &Message) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, product_id, sender_id, sender_name, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.id,
                    message.product_id,
                    message.sender_id,
                    message.sender_name,
                    message.message,
                    message.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Chat history for a listing, oldest first.
    pub fn list_messages(&self, product_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, product_id, sender_id, sender_name, message, created_at FROM messages
                 WHERE product_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([product_id], |row| {
                    Ok(Message {
                        id: row.get(0)?,
                        product_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        sender_name: row.get(3)?,
                        message: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn query_user(conn: &Connection, filter: &str, value: &dyn ToSql) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, name, email, password, created_at FROM users WHERE {filter}");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let code: String = row.get(4)?;
    let category = code
        .parse::<Category>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        image: row.get(2)?,
        description: row.get(3)?,
        category,
        seller_id: row.get(5)?,
        seller_name: row.get(6)?,
        requesters: Vec::new(),
        is_sold: row.get(7)?,
        matched_user: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn query_product(conn: &Connection, id: Uuid) -> Result<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    let product = conn.query_row(&sql, [id], product_from_row).optional()?;

    match product {
        Some(product) => {
            let mut products = [product];
            attach_requesters(conn, &mut products)?;
            let [product] = products;
            Ok(Some(product))
        }
        None => Ok(None),
    }
}

fn query_products<P: rusqlite::Params>(
    conn: &Connection,
    filter: &str,
    params: P,
) -> Result<Vec<Product>> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products {filter} ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut products = stmt
        .query_map(params, product_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    attach_requesters(conn, &mut products)?;
    Ok(products)
}

/// Batch-loads requester lists for a set of listings, in request order.
fn attach_requesters(conn: &Connection, products: &mut [Product]) -> Result<()> {
    if products.is_empty() {
        return Ok(());
    }

    let placeholders: Vec<String> = (1..=products.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT product_id, user_id FROM product_requests WHERE product_id IN ({}) ORDER BY rowid",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = products.iter().map(|p| &p.id as &dyn ToSql).collect();

    let mut by_product: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let rows = stmt.query_map(params.as_slice(), |row| {
        Ok((row.get::<_, Uuid>(0)?, row.get::<_, Uuid>(1)?))
    })?;
    for row in rows {
        let (product_id, user_id) = row?;
        by_product.entry(product_id).or_default().push(user_id);
    }

    for product in products.iter_mut() {
        product.requesters = by_product.remove(&product.id).unwrap_or_default();
    }
    Ok(())
}

fn insert_notification(conn: &Connection, notification: &Notification) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (id, user_id, message, read, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            notification.id,
            notification.user_id,
            notification.message,
            notification.read,
            notification.created_at,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(db: &Database, name: &str) -> Uuid {
        let row = UserRow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@campus.test", name.to_lowercase()),
            password: "$argon2id$placeholder".to_string(),
            created_at: Utc::now(),
        };
        assert!(db.create_user(&row).unwrap());
        row.id
    }

    fn listing(db: &Database, seller_id: Uuid, name: &str, category: Category) -> Uuid {
        let seller = db.get_user_by_id(seller_id).unwrap().unwrap();
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            image: "/uploads/sample.jpg".to_string(),
            description: String::new(),
            category,
            seller_id,
            seller_name: seller.name,
            requesters: vec![],
            is_sold: false,
            matched_user: None,
            created_at: Utc::now(),
        };
        db.create_product(&product).unwrap();
        product.id
    }

    #[test]
    fn duplicate_email_is_rejected_without_insert() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "Aiko");

        let dup = UserRow {
            id: Uuid::new_v4(),
            name: "Other".into(),
            email: "aiko@campus.test".into(),
            password: "x".into(),
            created_at: Utc::now(),
        };
        assert!(!db.create_user(&dup).unwrap());
        assert_eq!(db.count_users().unwrap(), 1);
        assert_eq!(
            db.get_user_by_email("aiko@campus.test").unwrap().unwrap().name,
            "Aiko"
        );
    }

    #[test]
    fn requesting_twice_keeps_one_entry() {
        let db = Database::open_in_memory().unwrap();
        let seller = user(&db, "Seller");
        let buyer = user(&db, "Buyer");
        let pid = listing(&db, seller, "Calculus I", Category::Ru);

        assert_eq!(db.request_product(pid, buyer, Utc::now()).unwrap(), RequestOutcome::Added);
        assert_eq!(
            db.request_product(pid, buyer, Utc::now()).unwrap(),
            RequestOutcome::AlreadyRequested
        );
        assert_eq!(db.get_product(pid).unwrap().unwrap().requesters, vec![buyer]);
    }

    #[test]
    fn request_rejections() {
        let db = Database::open_in_memory().unwrap();
        let seller = user(&db, "Seller");
        let buyer = user(&db, "Buyer");
        let pid = listing(&db, seller, "Calculus I", Category::Ru);

        assert_eq!(
            db.request_product(pid, seller, Utc::now()).unwrap(),
            RequestOutcome::OwnListing
        );
        assert_eq!(
            db.request_product(Uuid::new_v4(), buyer, Utc::now()).unwrap(),
            RequestOutcome::NotFound
        );
        assert_eq!(
            db.request_product(pid, Uuid::new_v4(), Utc::now()).unwrap(),
            RequestOutcome::UnknownUser
        );
        assert!(db.get_product(pid).unwrap().unwrap().requesters.is_empty());
    }

    #[test]
    fn requesters_keep_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let seller = user(&db, "Seller");
        let first = user(&db, "First");
        let second = user(&db, "Second");
        let third = user(&db, "Third");
        let pid = listing(&db, seller, "Organic Chemistry", Category::Rb);

        for id in [second, first, third] {
            db.request_product(pid, id, Utc::now()).unwrap();
        }
        assert_eq!(
            db.get_product(pid).unwrap().unwrap().requesters,
            vec![second, first, third]
        );
    }

    #[test]
    fn match_succeeds_exactly_once() {
        let db = Database::open_in_memory().unwrap();
        let seller = user(&db, "Seller");
        let buyer = user(&db, "Buyer");
        let other = user(&db, "Other");
        let pid = listing(&db, seller, "Microeconomics", Category::Rd);
        db.request_product(pid, buyer, Utc::now()).unwrap();
        db.request_product(pid, other, Utc::now()).unwrap();

        let outcome = db.match_product(pid, seller, buyer, Utc::now()).unwrap();
        let MatchOutcome::Matched {
            product,
            notification,
        } = outcome.clone()
        else {
            panic!("expected a match, got {:?}", outcome);
        };
        assert!(product.is_sold);
        assert_eq!(product.matched_user, Some(buyer));
        assert_eq!(notification.user_id, buyer);
        assert!(notification.message.contains("Microeconomics"));

        assert_eq!(
            db.match_product(pid, seller, other, Utc::now()).unwrap(),
            MatchOutcome::AlreadyMatched
        );
        let stored = db.get_product(pid).unwrap().unwrap();
        assert!(stored.is_sold);
        assert_eq!(stored.matched_user, Some(buyer));
        assert!(db.list_notifications(other).unwrap().is_empty());
        assert_eq!(db.list_notifications(buyer).unwrap().len(), 1);
    }

    #[test]
    fn match_rejections_leave_listing_open() {
        let db = Database::open_in_memory().unwrap();
        let seller = user(&db, "Seller");
        let buyer = user(&db, "Buyer");
        let stranger = user(&db, "Stranger");
        let pid = listing(&db, seller, "Microeconomics", Category::Rd);
        db.request_product(pid, buyer, Utc::now()).unwrap();

        assert_eq!(
            db.match_product(pid, stranger, buyer, Utc::now()).unwrap(),
            MatchOutcome::NotSeller
        );
        assert_eq!(
            db.match_product(pid, seller, stranger, Utc::now()).unwrap(),
            MatchOutcome::NotARequester
        );
        assert_eq!(
            db.match_product(Uuid::new_v4(), seller, buyer, Utc::now()).unwrap(),
            MatchOutcome::NotFound
        );

        let stored = db.get_product(pid).unwrap().unwrap();
        assert!(!stored.is_sold);
        assert_eq!(stored.matched_user, None);
    }

    #[test]
    fn sold_listing_refuses_new_requests() {
        let db = Database::open_in_memory().unwrap();
        let seller = user(&db, "Seller");
        let buyer = user(&db, "Buyer");
        let late = user(&db, "Late");
        let pid = listing(&db, seller, "Statistics", Category::Rb);
        db.request_product(pid, buyer, Utc::now()).unwrap();
        db.match_product(pid, seller, buyer, Utc::now()).unwrap();

        assert_eq!(
            db.request_product(pid, late, Utc::now()).unwrap(),
            RequestOutcome::AlreadyMatched
        );
    }

    #[test]
    fn category_filter_is_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let seller = user(&db, "Seller");
        let older = listing(&db, seller, "Statistics", Category::Rb);
        let _other = listing(&db, seller, "React Primer", Category::Ru);
        let newer = listing(&db, seller, "Econometrics", Category::Rb);

        let ids: Vec<Uuid> = db
            .list_products(Some(Category::Rb))
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![newer, older]);
        assert_eq!(db.list_products(None).unwrap().len(), 3);
        assert!(db.list_products(Some(Category::Rg)).unwrap().is_empty());
    }

    #[test]
    fn matched_view_covers_both_parties_only() {
        let db = Database::open_in_memory().unwrap();
        let seller = user(&db, "Seller");
        let buyer = user(&db, "Buyer");
        let sold = listing(&db, seller, "Sold", Category::Re);
        let open = listing(&db, seller, "Open", Category::Re);
        db.request_product(sold, buyer, Utc::now()).unwrap();
        db.request_product(open, buyer, Utc::now()).unwrap();
        db.match_product(sold, seller, buyer, Utc::now()).unwrap();

        let seller_view: Vec<Uuid> = db
            .list_matched_products(seller)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        let buyer_view: Vec<Uuid> = db
            .list_matched_products(buyer)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(seller_view, vec![sold]);
        assert_eq!(buyer_view, vec![sold]);
        assert_eq!(db.list_products_by_seller(seller).unwrap().len(), 2);
        assert!(db.list_products_by_seller(buyer).unwrap().is_empty());
    }

    #[test]
    fn mark_read_is_scoped_to_owner() {
        let db = Database::open_in_memory().unwrap();
        let seller = user(&db, "Seller");
        let alice = user(&db, "Alice");
        let bob = user(&db, "Bob");
        let first = listing(&db, seller, "First", Category::Rm);
        let second = listing(&db, seller, "Second", Category::Rm);
        let third = listing(&db, seller, "Third", Category::Rm);
        for (pid, who) in [(first, alice), (second, alice), (third, bob)] {
            db.request_product(pid, who, Utc::now()).unwrap();
            db.match_product(pid, seller, who, Utc::now()).unwrap();
        }

        let alice_notes = db.list_notifications(alice).unwrap();
        assert_eq!(alice_notes.len(), 2);
        assert!(alice_notes[0].message.contains("Second"));

        assert_eq!(db.mark_notifications_read(alice).unwrap(), 2);
        assert_eq!(db.mark_notifications_read(alice).unwrap(), 0);
        assert!(db.list_notifications(alice).unwrap().iter().all(|n| n.read));
        assert!(db.list_notifications(bob).unwrap().iter().all(|n| !n.read));
    }

    #[test]
    fn messages_come_back_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        let seller = user(&db, "Seller");
        let buyer = user(&db, "Buyer");
        let pid = listing(&db, seller, "Physics", Category::Rg);

        for (sender, name, text) in [(buyer, "Buyer", "hello"), (seller, "Seller", "hi!"), (buyer, "Buyer", "tomorrow?")] {
            db.create_message(&Message {
                id: Uuid::new_v4(),
                product_id: pid,
                sender_id: sender,
                sender_name: name.to_string(),
                message: text.to_string(),
                created_at: Utc::now(),
            })
            .unwrap();
        }

        let texts: Vec<String> = db
            .list_messages(pid)
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(texts, vec!["hello", "hi!", "tomorrow?"]);
        assert!(db.list_messages(Uuid::new_v4()).unwrap().is_empty());
    }
}

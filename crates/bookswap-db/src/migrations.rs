use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          BLOB PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE products (
                id           BLOB PRIMARY KEY,
                name         TEXT NOT NULL,
                image        TEXT NOT NULL,
                description  TEXT NOT NULL,
                category     TEXT NOT NULL,
                seller_id    BLOB NOT NULL REFERENCES users(id),
                seller_name  TEXT NOT NULL,
                is_sold      INTEGER NOT NULL DEFAULT 0,
                matched_user BLOB REFERENCES users(id),
                created_at   TEXT NOT NULL,
                CHECK ((is_sold = 0) = (matched_user IS NULL))
            );

            CREATE INDEX idx_products_category ON products(category);
            CREATE INDEX idx_products_seller ON products(seller_id);

            CREATE TABLE product_requests (
                product_id  BLOB NOT NULL REFERENCES products(id),
                user_id     BLOB NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (product_id, user_id)
            );

            CREATE TABLE notifications (
                id          BLOB PRIMARY KEY,
                user_id     BLOB NOT NULL REFERENCES users(id),
                message     TEXT NOT NULL,
                read        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            CREATE TABLE messages (
                id           BLOB PRIMARY KEY,
                product_id   BLOB NOT NULL REFERENCES products(id),
                sender_id    BLOB NOT NULL REFERENCES users(id),
                sender_name  TEXT NOT NULL,
                message      TEXT NOT NULL,
                created_at   TEXT NOT NULL
            );

            CREATE INDEX idx_messages_product ON messages(product_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}

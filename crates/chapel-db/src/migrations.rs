use rusqlite::Connection;
use tracing::info;

use crate::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (document store)");
        conn.execute_batch(
            "
            CREATE TABLE documents (
                collection  TEXT NOT NULL,
                id          TEXT NOT NULL,
                seq         INTEGER NOT NULL,
                body        TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX idx_documents_order
                ON documents(collection, seq);

            CREATE TABLE settings (
                key         TEXT PRIMARY KEY,
                body        TEXT NOT NULL
            );

            CREATE TABLE activity_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                action      TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE otps (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                email       TEXT NOT NULL,
                code        TEXT NOT NULL,
                expires_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_otps_email
                ON otps(email);

            CREATE TABLE seeded_collections (
                name        TEXT PRIMARY KEY,
                seeded_at   TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (credentials and session)");
        conn.execute_batch(
            "
            CREATE TABLE credentials (
                member_id       TEXT PRIMARY KEY,
                password_hash   TEXT NOT NULL
            );

            CREATE TABLE session (
                key         TEXT PRIMARY KEY,
                body        TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (2);
            "
        )?;
    }

    if version < 3 {
        info!("Running migration v3 (unique member emails and transaction ids)");
        conn.execute_batch(
            "
            CREATE UNIQUE INDEX idx_members_email
                ON documents(lower(trim(json_extract(body, '$.email'))))
                WHERE collection = 'members';

            CREATE UNIQUE INDEX idx_donations_transaction
                ON documents(json_extract(body, '$.transactionId'))
                WHERE collection = 'donations' AND json_extract(body, '$.transactionId') != '';

            INSERT INTO schema_version (version) VALUES (3);
            "
        )?;
    }

    Ok(())
}

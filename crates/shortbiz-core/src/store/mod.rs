//! SQLite persistence.
//!
//! One [`Store`] owns one connection behind a mutex. Callers never hold the
//! lock across an `.await`; every method takes it, runs its statements, and
//! releases it before returning.

mod billing;
mod blogs;
mod contact;
mod pages;
mod users;

use std::sync::{Mutex, MutexGuard};

use camino::Utf8Path;
use rusqlite::Connection;

use crate::error::{StoreError, StoreResult};

pub use billing::{PaymentEvent, Plan, PlanChanges, PlanDraft, Subscription, SubscriptionStatus};
pub use blogs::{Artifact, Deduction, NewArtifact};
pub use contact::ContactMessage;
pub use pages::{Block, BlockChanges, BlockClicks, BlockDraft, Page, PageDraft, VisitMeta};
pub use users::{Role, User};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id               TEXT PRIMARY KEY,
    email            TEXT NOT NULL UNIQUE,
    hashed_password  TEXT NOT NULL,
    role             TEXT NOT NULL DEFAULT 'user',
    tokens_remaining INTEGER NOT NULL DEFAULT 0 CHECK (tokens_remaining >= 0),
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS blogs (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title            TEXT NOT NULL,
    topic            TEXT NOT NULL,
    audience         TEXT NOT NULL,
    tone             TEXT NOT NULL,
    seo_keyword      TEXT,
    word_count       INTEGER NOT NULL,
    features_json    TEXT NOT NULL,
    token_cost       INTEGER NOT NULL,
    content_markdown TEXT NOT NULL,
    content_html     TEXT NOT NULL,
    created_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_blogs_user ON blogs(user_id);

CREATE TABLE IF NOT EXISTS pages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id   TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    slug       TEXT NOT NULL UNIQUE,
    title      TEXT NOT NULL,
    bio        TEXT,
    avatar_url TEXT,
    theme      TEXT
);

CREATE TABLE IF NOT EXISTS blocks (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id    INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    owner_id   TEXT NOT NULL,
    label      TEXT NOT NULL,
    url        TEXT NOT NULL,
    is_primary INTEGER NOT NULL DEFAULT 0,
    sort_order INTEGER,
    is_active  INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_blocks_page ON blocks(page_id);

CREATE TABLE IF NOT EXISTS page_views (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id    INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    ip_address TEXT,
    user_agent TEXT,
    referrer   TEXT
);
CREATE INDEX IF NOT EXISTS idx_page_views_page ON page_views(page_id);

CREATE TABLE IF NOT EXISTS link_clicks (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id    INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    block_id   INTEGER NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    ip_address TEXT,
    user_agent TEXT,
    referrer   TEXT
);
CREATE INDEX IF NOT EXISTS idx_link_clicks_page ON link_clicks(page_id);

CREATE TABLE IF NOT EXISTS plans (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    description TEXT,
    price_cents INTEGER NOT NULL,
    currency    TEXT NOT NULL DEFAULT 'USD',
    interval    TEXT NOT NULL DEFAULT 'monthly',
    max_links   INTEGER,
    max_pages   INTEGER,
    is_active   INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS subscriptions (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id            TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    plan_id            INTEGER NOT NULL REFERENCES plans(id),
    status             TEXT NOT NULL DEFAULT 'pending',
    started_at         TEXT NOT NULL,
    current_period_end TEXT,
    invoice_id         TEXT
);
CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id);

CREATE TABLE IF NOT EXISTS payment_events (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    subscription_id INTEGER NOT NULL REFERENCES subscriptions(id) ON DELETE CASCADE,
    event_type      TEXT NOT NULL,
    raw_payload     TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contact_messages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    email      TEXT NOT NULL,
    subject    TEXT,
    message    TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

/// Handle to the application database.
#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    #[tracing::instrument(fields(path = %path))]
    pub fn open(path: &Utf8Path) -> StoreResult<Self> {
        let conn = Connection::open(path.as_std_path())?;
        Self::init(conn)
    }

    /// A fresh private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("schema applied");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run `f` with the connection.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` with mutable access, for transactions.
    pub(crate) fn with_conn_mut<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.lock()?;
        f(&mut conn)
    }
}

/// Whether `err` is a UNIQUE constraint failure.
pub(crate) fn is_unique_violation(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|c| Ok(c.execute_batch(SCHEMA)?))
            .unwrap();
    }

    #[test]
    fn open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::try_from(dir.path().join("app.db")).unwrap();
        Store::open(&path).unwrap();
        assert!(path.exists());
        // Reopening an existing database keeps working.
        Store::open(&path).unwrap();
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let store = Store::open_in_memory().unwrap();
        let on: i64 = store
            .with_conn(|c| Ok(c.query_row("PRAGMA foreign_keys", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(on, 1);
    }
}

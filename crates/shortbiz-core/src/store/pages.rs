//! Link-in-bio pages, their blocks, and visit tracking.

use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::Store;
use crate::error::StoreResult;

/// A public profile page. One per owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Row id.
    pub id: i64,
    /// Owning account.
    pub owner_id: String,
    /// Public URL slug, unique across owners.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Short bio.
    pub bio: Option<String>,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
    /// Theme name.
    pub theme: Option<String>,
}

/// Fields an owner sets on their page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct PageDraft {
    /// Public URL slug.
    #[validate(length(min = 1, max = 64))]
    #[validate(custom(
        function = "slug_chars",
        message = "use lowercase letters, digits, '-' or '_'"
    ))]
    pub slug: String,
    /// Display title.
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub title: String,
    /// Short bio.
    #[serde(default)]
    pub bio: Option<String>,
    /// Avatar image URL (http or https).
    #[serde(default)]
    #[validate(url(message = "must be an http(s) URL"))]
    #[validate(custom(function = "http_scheme", message = "must be an http(s) URL"))]
    pub avatar_url: Option<String>,
    /// Theme name.
    #[serde(default)]
    pub theme: Option<String>,
}

/// A link on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Row id.
    pub id: i64,
    /// Page the block belongs to.
    pub page_id: i64,
    /// Owning account.
    pub owner_id: String,
    /// Link text.
    pub label: String,
    /// Link target.
    pub url: String,
    /// Highlighted link.
    pub is_primary: bool,
    /// Position; unset blocks sort last.
    pub sort_order: Option<i64>,
    /// Hidden from the public page when false.
    pub is_active: bool,
}

/// Fields for a new block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct BlockDraft {
    /// Link text.
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub label: String,
    /// Link target (http or https).
    #[validate(url(message = "must be an http(s) URL"))]
    #[validate(custom(function = "http_scheme", message = "must be an http(s) URL"))]
    pub url: String,
    /// Highlighted link.
    #[serde(default)]
    pub is_primary: bool,
    /// Position; defaults to after the last block.
    #[serde(default)]
    pub sort_order: Option<i64>,
    /// Visible on the public page.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn slug_chars(slug: &str) -> Result<(), ValidationError> {
    if slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("slug"))
    }
}

/// The `url` check accepts any scheme; links and avatars must be web URLs.
fn http_scheme(url: &str) -> Result<(), ValidationError> {
    match url.split_once("://") {
        Some((scheme, _))
            if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") =>
        {
            Ok(())
        }
        _ => Err(ValidationError::new("http_url")),
    }
}

/// A partial block update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(default)]
pub struct BlockChanges {
    /// New link text.
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub label: Option<String>,
    /// New link target.
    #[validate(url(message = "must be an http(s) URL"))]
    #[validate(custom(function = "http_scheme", message = "must be an http(s) URL"))]
    pub url: Option<String>,
    /// New highlight flag.
    pub is_primary: Option<bool>,
    /// New position.
    pub sort_order: Option<i64>,
    /// New visibility.
    pub is_active: Option<bool>,
}

impl BlockChanges {
    /// Whether the update changes nothing.
    pub const fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.url.is_none()
            && self.is_primary.is_none()
            && self.sort_order.is_none()
            && self.is_active.is_none()
    }
}

/// Request metadata recorded with views and clicks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct VisitMeta {
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Referring URL.
    pub referrer: Option<String>,
}

/// Click count for one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockClicks {
    /// Block id.
    pub block_id: i64,
    /// Block label.
    pub label: String,
    /// Recorded clicks.
    pub clicks: i64,
}

const PAGE_COLUMNS: &str = "id, owner_id, slug, title, bio, avatar_url, theme";
const BLOCK_COLUMNS: &str = "id, page_id, owner_id, label, url, is_primary, sort_order, is_active";

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        slug: row.get(2)?,
        title: row.get(3)?,
        bio: row.get(4)?,
        avatar_url: row.get(5)?,
        theme: row.get(6)?,
    })
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<Block> {
    Ok(Block {
        id: row.get(0)?,
        page_id: row.get(1)?,
        owner_id: row.get(2)?,
        label: row.get(3)?,
        url: row.get(4)?,
        is_primary: row.get(5)?,
        sort_order: row.get(6)?,
        is_active: row.get(7)?,
    })
}

impl Store {
    /// The page owned by `owner_id`.
    pub fn page_by_owner(&self, owner_id: &str) -> StoreResult<Option<Page>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE owner_id = ?1"),
                    [owner_id],
                    page_from_row,
                )
                .optional()?)
        })
    }

    /// The page published under `slug`.
    pub fn page_by_slug(&self, slug: &str) -> StoreResult<Option<Page>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE slug = ?1"),
                    [slug],
                    page_from_row,
                )
                .optional()?)
        })
    }

    /// Create or replace the owner's page.
    ///
    /// A slug taken by another owner surfaces as a UNIQUE constraint failure.
    pub fn upsert_page(&self, owner_id: &str, draft: &PageDraft) -> StoreResult<Page> {
        self.with_conn(|conn| {
            let updated = conn
                .query_row(
                    &format!(
                        "UPDATE pages SET slug = ?2, title = ?3, bio = ?4, avatar_url = ?5, theme = ?6
                         WHERE owner_id = ?1
                         RETURNING {PAGE_COLUMNS}"
                    ),
                    params![
                        owner_id,
                        draft.slug,
                        draft.title,
                        draft.bio,
                        draft.avatar_url,
                        draft.theme
                    ],
                    page_from_row,
                )
                .optional()?;
            if let Some(page) = updated {
                return Ok(page);
            }
            Ok(conn.query_row(
                &format!(
                    "INSERT INTO pages (owner_id, slug, title, bio, avatar_url, theme)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     RETURNING {PAGE_COLUMNS}"
                ),
                params![
                    owner_id,
                    draft.slug,
                    draft.title,
                    draft.bio,
                    draft.avatar_url,
                    draft.theme
                ],
                page_from_row,
            )?)
        })
    }

    /// Blocks of a page, by position (unset last) then id.
    pub fn blocks_for_page(&self, page_id: i64, active_only: bool) -> StoreResult<Vec<Block>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BLOCK_COLUMNS} FROM blocks
                 WHERE page_id = ?1 AND (?2 = 0 OR is_active = 1)
                 ORDER BY sort_order IS NULL, sort_order, id"
            ))?;
            let rows = stmt.query_map(params![page_id, active_only], block_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Insert a block, placing it after the current last block when the
    /// draft has no position.
    pub fn insert_block(&self, page: &Page, draft: &BlockDraft) -> StoreResult<Block> {
        self.with_conn(|conn| {
            let sort_order = match draft.sort_order {
                Some(order) => order,
                None => conn.query_row(
                    "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM blocks WHERE page_id = ?1",
                    [page.id],
                    |row| row.get(0),
                )?,
            };
            Ok(conn.query_row(
                &format!(
                    "INSERT INTO blocks (page_id, owner_id, label, url, is_primary, sort_order, is_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     RETURNING {BLOCK_COLUMNS}"
                ),
                params![
                    page.id,
                    page.owner_id,
                    draft.label,
                    draft.url,
                    draft.is_primary,
                    sort_order,
                    draft.is_active
                ],
                block_from_row,
            )?)
        })
    }

    /// A block owned by `owner_id`.
    pub fn owned_block(&self, owner_id: &str, block_id: i64) -> StoreResult<Option<Block>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = ?1 AND owner_id = ?2"),
                    params![block_id, owner_id],
                    block_from_row,
                )
                .optional()?)
        })
    }

    /// A block that sits on `page_id`.
    pub fn block_on_page(&self, page_id: i64, block_id: i64) -> StoreResult<Option<Block>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = ?1 AND page_id = ?2"),
                    params![block_id, page_id],
                    block_from_row,
                )
                .optional()?)
        })
    }

    /// Apply `changes` to an owned block.
    pub fn update_block(
        &self,
        owner_id: &str,
        block_id: i64,
        changes: &BlockChanges,
    ) -> StoreResult<Option<Block>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "UPDATE blocks SET
                            label = COALESCE(?3, label),
                            url = COALESCE(?4, url),
                            is_primary = COALESCE(?5, is_primary),
                            sort_order = COALESCE(?6, sort_order),
                            is_active = COALESCE(?7, is_active)
                         WHERE id = ?1 AND owner_id = ?2
                         RETURNING {BLOCK_COLUMNS}"
                    ),
                    params![
                        block_id,
                        owner_id,
                        changes.label,
                        changes.url,
                        changes.is_primary,
                        changes.sort_order,
                        changes.is_active
                    ],
                    block_from_row,
                )
                .optional()?)
        })
    }

    /// Delete an owned block. Returns whether a row was removed.
    pub fn delete_block(&self, owner_id: &str, block_id: i64) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM blocks WHERE id = ?1 AND owner_id = ?2",
                params![block_id, owner_id],
            )?;
            Ok(removed > 0)
        })
    }

    /// Record a page view.
    pub fn record_view(&self, page_id: i64, meta: &VisitMeta) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO page_views (page_id, created_at, ip_address, user_agent, referrer)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    page_id,
                    Utc::now(),
                    meta.ip_address,
                    meta.user_agent,
                    meta.referrer
                ],
            )?;
            Ok(())
        })
    }

    /// Record a link click.
    pub fn record_click(&self, page_id: i64, block_id: i64, meta: &VisitMeta) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO link_clicks (page_id, block_id, created_at, ip_address, user_agent, referrer)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    page_id,
                    block_id,
                    Utc::now(),
                    meta.ip_address,
                    meta.user_agent,
                    meta.referrer
                ],
            )?;
            Ok(())
        })
    }

    /// Total views, total clicks, and clicks per block for a page.
    pub fn page_counts(&self, page_id: i64) -> StoreResult<(i64, i64, Vec<BlockClicks>)> {
        self.with_conn(|conn| {
            let views: i64 = conn.query_row(
                "SELECT COUNT(*) FROM page_views WHERE page_id = ?1",
                [page_id],
                |row| row.get(0),
            )?;
            let clicks: i64 = conn.query_row(
                "SELECT COUNT(*) FROM link_clicks WHERE page_id = ?1",
                [page_id],
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(
                "SELECT b.id, b.label, COUNT(c.id)
                 FROM blocks b LEFT JOIN link_clicks c ON c.block_id = b.id
                 WHERE b.page_id = ?1
                 GROUP BY b.id
                 ORDER BY b.sort_order IS NULL, b.sort_order, b.id",
            )?;
            let per_block = stmt
                .query_map([page_id], |row| {
                    Ok(BlockClicks {
                        block_id: row.get(0)?,
                        label: row.get(1)?,
                        clicks: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok((views, clicks, per_block))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Role, is_unique_violation};

    fn setup() -> (Store, Page) {
        let store = Store::open_in_memory().unwrap();
        let user = store.insert_user("a@example.com", "h", Role::User, 0).unwrap();
        let page = store
            .upsert_page(
                &user.id,
                &PageDraft {
                    slug: "alice".into(),
                    title: "Alice".into(),
                    ..PageDraft::default()
                },
            )
            .unwrap();
        (store, page)
    }

    fn draft(label: &str, sort_order: Option<i64>) -> BlockDraft {
        BlockDraft {
            label: label.into(),
            url: "https://example.com".into(),
            is_primary: false,
            sort_order,
            is_active: true,
        }
    }

    #[test]
    fn upsert_updates_in_place() {
        let (store, page) = setup();
        let updated = store
            .upsert_page(
                &page.owner_id,
                &PageDraft {
                    slug: "alice2".into(),
                    title: "Alice B".into(),
                    bio: Some("hi".into()),
                    ..PageDraft::default()
                },
            )
            .unwrap();
        assert_eq!(updated.id, page.id);
        assert_eq!(updated.slug, "alice2");
        assert!(store.page_by_slug("alice").unwrap().is_none());
    }

    #[test]
    fn slug_is_unique_across_owners() {
        let (store, _) = setup();
        let bob = store.insert_user("b@example.com", "h", Role::User, 0).unwrap();
        let err = store
            .upsert_page(
                &bob.id,
                &PageDraft {
                    slug: "alice".into(),
                    title: "Bob".into(),
                    ..PageDraft::default()
                },
            )
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn sort_order_defaults_to_max_plus_one_and_nulls_sort_last() {
        let (store, page) = setup();
        let a = store.insert_block(&page, &draft("a", Some(5))).unwrap();
        let b = store.insert_block(&page, &draft("b", None)).unwrap();
        assert_eq!(b.sort_order, Some(6));

        // Force an unset position to check NULL ordering.
        store
            .with_conn(|c| {
                Ok(c.execute("UPDATE blocks SET sort_order = NULL WHERE id = ?1", [a.id])?)
            })
            .unwrap();
        let labels: Vec<_> = store
            .blocks_for_page(page.id, false)
            .unwrap()
            .into_iter()
            .map(|b| b.label)
            .collect();
        assert_eq!(labels, vec!["b", "a"]);
    }

    #[test]
    fn active_only_filters_hidden_blocks() {
        let (store, page) = setup();
        let hidden = store.insert_block(&page, &draft("hidden", None)).unwrap();
        store.insert_block(&page, &draft("shown", None)).unwrap();
        store
            .update_block(
                &page.owner_id,
                hidden.id,
                &BlockChanges {
                    is_active: Some(false),
                    ..BlockChanges::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(store.blocks_for_page(page.id, true).unwrap().len(), 1);
        assert_eq!(store.blocks_for_page(page.id, false).unwrap().len(), 2);
    }

    #[test]
    fn update_and_delete_require_ownership() {
        let (store, page) = setup();
        let block = store.insert_block(&page, &draft("a", None)).unwrap();
        let changes = BlockChanges {
            label: Some("renamed".into()),
            ..BlockChanges::default()
        };
        assert!(store.update_block("someone-else", block.id, &changes).unwrap().is_none());
        assert!(!store.delete_block("someone-else", block.id).unwrap());

        let renamed = store.update_block(&page.owner_id, block.id, &changes).unwrap().unwrap();
        assert_eq!(renamed.label, "renamed");
        assert_eq!(renamed.url, block.url);
        assert!(store.delete_block(&page.owner_id, block.id).unwrap());
    }

    #[test]
    fn counts_views_and_clicks() {
        let (store, page) = setup();
        let a = store.insert_block(&page, &draft("a", None)).unwrap();
        let b = store.insert_block(&page, &draft("b", None)).unwrap();
        let meta = VisitMeta {
            referrer: Some("https://t.co".into()),
            ..VisitMeta::default()
        };
        store.record_view(page.id, &meta).unwrap();
        store.record_view(page.id, &meta).unwrap();
        store.record_click(page.id, a.id, &meta).unwrap();

        let (views, clicks, per_block) = store.page_counts(page.id).unwrap();
        assert_eq!(views, 2);
        assert_eq!(clicks, 1);
        assert_eq!(per_block[0].block_id, a.id);
        assert_eq!(per_block[0].clicks, 1);
        assert_eq!(per_block[1].block_id, b.id);
        assert_eq!(per_block[1].clicks, 0);
    }
}

//! Generated blog posts and the balance deduction that pays for them.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};
use serde::{Deserialize, Serialize};

use super::Store;
use crate::blog::FeatureSelection;
use crate::error::StoreResult;

/// A persisted generation result. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Row id.
    pub id: i64,
    /// Owning account.
    pub owner_id: String,
    /// Title taken from the first H1.
    pub title: String,
    /// Requested topic.
    pub topic: String,
    /// Requested audience.
    pub audience: String,
    /// Requested tone.
    pub tone: String,
    /// Requested SEO keyword.
    pub seo_keyword: Option<String>,
    /// Requested length.
    pub word_count: u32,
    /// Requested features.
    pub features: FeatureSelection,
    /// Tokens charged.
    pub token_cost: i64,
    /// Generated Markdown.
    pub content_markdown: String,
    /// Rendered HTML.
    pub content_html: String,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

/// An artifact ready to be written, minus id and timestamp.
#[derive(Debug, Clone)]
#[allow(missing_docs)] // mirrors `Artifact`
pub struct NewArtifact {
    pub owner_id: String,
    pub title: String,
    pub topic: String,
    pub audience: String,
    pub tone: String,
    pub seo_keyword: Option<String>,
    pub word_count: u32,
    pub features: FeatureSelection,
    pub token_cost: i64,
    pub content_markdown: String,
    pub content_html: String,
}

/// Result of [`Store::deduct_and_insert`].
#[derive(Debug)]
pub enum Deduction {
    /// Balance charged and artifact written.
    Committed {
        /// The stored artifact.
        artifact: Artifact,
        /// Balance after the charge.
        tokens_remaining: i64,
    },
    /// The balance read inside the transaction was below the cost.
    Insufficient {
        /// Balance at commit time.
        balance: i64,
    },
    /// The owner no longer exists.
    UnknownOwner,
}

const BLOG_COLUMNS: &str = "id, user_id, title, topic, audience, tone, seo_keyword, word_count, \
                            features_json, token_cost, content_markdown, content_html, created_at";

fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<Artifact> {
    let features_json: String = row.get(8)?;
    let features = serde_json::from_str(&features_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
    Ok(Artifact {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        topic: row.get(3)?,
        audience: row.get(4)?,
        tone: row.get(5)?,
        seo_keyword: row.get(6)?,
        word_count: row.get(7)?,
        features,
        token_cost: row.get(9)?,
        content_markdown: row.get(10)?,
        content_html: row.get(11)?,
        created_at: row.get(12)?,
    })
}

impl Store {
    /// Charge the owner and persist the artifact atomically.
    ///
    /// Runs in an IMMEDIATE transaction: the write lock is taken before the
    /// balance is read, so the check and the decrement cannot interleave with
    /// another writer. Nothing is written unless the balance covers the cost.
    pub fn deduct_and_insert(&self, new: &NewArtifact) -> StoreResult<Deduction> {
        let features_json = serde_json::to_string(&new.features)?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let balance: Option<i64> = tx
                .query_row(
                    "SELECT tokens_remaining FROM users WHERE id = ?1",
                    [&new.owner_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(balance) = balance else {
                return Ok(Deduction::UnknownOwner);
            };
            if balance < new.token_cost {
                return Ok(Deduction::Insufficient { balance });
            }

            let tokens_remaining = balance - new.token_cost;
            tx.execute(
                "UPDATE users SET tokens_remaining = ?2 WHERE id = ?1",
                params![new.owner_id, tokens_remaining],
            )?;

            let created_at = Utc::now();
            tx.execute(
                "INSERT INTO blogs (user_id, title, topic, audience, tone, seo_keyword, word_count,
                                    features_json, token_cost, content_markdown, content_html, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    new.owner_id,
                    new.title,
                    new.topic,
                    new.audience,
                    new.tone,
                    new.seo_keyword,
                    new.word_count,
                    features_json,
                    new.token_cost,
                    new.content_markdown,
                    new.content_html,
                    created_at
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(Deduction::Committed {
                artifact: Artifact {
                    id,
                    owner_id: new.owner_id.clone(),
                    title: new.title.clone(),
                    topic: new.topic.clone(),
                    audience: new.audience.clone(),
                    tone: new.tone.clone(),
                    seo_keyword: new.seo_keyword.clone(),
                    word_count: new.word_count,
                    features: new.features,
                    token_cost: new.token_cost,
                    content_markdown: new.content_markdown.clone(),
                    content_html: new.content_html.clone(),
                    created_at,
                },
                tokens_remaining,
            })
        })
    }

    /// Look up a post by id.
    pub fn blog_by_id(&self, id: i64) -> StoreResult<Option<Artifact>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = ?1"),
                    [id],
                    artifact_from_row,
                )
                .optional()?)
        })
    }

    /// All posts of `owner_id`, newest first.
    pub fn blogs_by_owner(&self, owner_id: &str) -> StoreResult<Vec<Artifact>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BLOG_COLUMNS} FROM blogs WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map([owner_id], artifact_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Number of posts stored for `owner_id`.
    pub fn blog_count(&self, owner_id: &str) -> StoreResult<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM blogs WHERE user_id = ?1",
                [owner_id],
                |row| row.get(0),
            )?)
        })
    }
}

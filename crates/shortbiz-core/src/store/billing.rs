//! Plans, subscriptions, and payment events.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Store;
use crate::error::StoreResult;

/// A purchasable plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Row id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Stable identifier used at checkout, unique.
    pub slug: String,
    /// Marketing copy.
    pub description: Option<String>,
    /// Price per interval in cents.
    pub price_cents: i64,
    /// ISO currency code.
    pub currency: String,
    /// Billing interval, e.g. `monthly` or `yearly`.
    pub interval: String,
    /// Link limit, if any.
    pub max_links: Option<i64>,
    /// Page limit, if any.
    pub max_pages: Option<i64>,
    /// Offered for new checkouts.
    pub is_active: bool,
}

/// Fields for a new plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct PlanDraft {
    /// Display name.
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Unique identifier.
    #[validate(length(min = 1, max = 50))]
    pub slug: String,
    /// Marketing copy.
    #[serde(default)]
    pub description: Option<String>,
    /// Price per interval in cents.
    #[validate(range(min = 0))]
    pub price_cents: i64,
    /// ISO currency code.
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub currency: String,
    /// Billing interval.
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Link limit.
    #[serde(default)]
    pub max_links: Option<i64>,
    /// Page limit.
    #[serde(default)]
    pub max_pages: Option<i64>,
    /// Offered for new checkouts.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_interval() -> String {
    "monthly".to_string()
}

const fn default_active() -> bool {
    true
}

impl PlanDraft {
    /// A draft with defaults for everything but the required fields.
    pub fn new(name: impl Into<String>, slug: impl Into<String>, price_cents: i64) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            description: None,
            price_cents,
            currency: default_currency(),
            interval: default_interval(),
            max_links: None,
            max_pages: None,
            is_active: true,
        }
    }
}

/// A partial plan update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(default)]
pub struct PlanChanges {
    /// New name.
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New price in cents.
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    /// New currency.
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    /// New interval.
    pub interval: Option<String>,
    /// New link limit.
    pub max_links: Option<i64>,
    /// New page limit.
    pub max_pages: Option<i64>,
    /// New availability.
    pub is_active: Option<bool>,
}

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Checkout started, not yet paid.
    Pending,
    /// Paid and current.
    Active,
    /// Ended by the customer or the gateway.
    Canceled,
}

impl SubscriptionStatus {
    /// Lowercase name as stored.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for SubscriptionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SubscriptionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            other => Err(FromSqlError::Other(
                format!("unknown subscription status `{other}`").into(),
            )),
        }
    }
}

/// A customer's subscription to a plan, joined with the plan's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Row id.
    pub id: i64,
    /// Subscriber.
    pub user_id: String,
    /// Subscribed plan.
    pub plan_id: i64,
    /// Plan slug.
    pub plan_slug: String,
    /// Plan name.
    pub plan_name: String,
    /// Lifecycle state.
    pub status: SubscriptionStatus,
    /// Checkout time.
    pub started_at: DateTime<Utc>,
    /// End of the paid period, once paid.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Gateway invoice id.
    pub invoice_id: Option<String>,
}

/// A recorded gateway event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Row id.
    pub id: i64,
    /// Subscription the event concerns.
    pub subscription_id: i64,
    /// Event name, e.g. `checkout_created` or `invoice_paid`.
    pub event_type: String,
    /// Raw gateway payload, when one was sent.
    pub raw_payload: Option<String>,
    /// Receive time.
    pub created_at: DateTime<Utc>,
}

const PLAN_COLUMNS: &str =
    "id, name, slug, description, price_cents, currency, interval, max_links, max_pages, is_active";

const SUBSCRIPTION_SELECT: &str = "SELECT s.id, s.user_id, s.plan_id, p.slug, p.name, s.status, \
     s.started_at, s.current_period_end, s.invoice_id \
     FROM subscriptions s JOIN plans p ON p.id = s.plan_id";

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<Plan> {
    Ok(Plan {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        price_cents: row.get(4)?,
        currency: row.get(5)?,
        interval: row.get(6)?,
        max_links: row.get(7)?,
        max_pages: row.get(8)?,
        is_active: row.get(9)?,
    })
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plan_id: row.get(2)?,
        plan_slug: row.get(3)?,
        plan_name: row.get(4)?,
        status: row.get(5)?,
        started_at: row.get(6)?,
        current_period_end: row.get(7)?,
        invoice_id: row.get(8)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<PaymentEvent> {
    Ok(PaymentEvent {
        id: row.get(0)?,
        subscription_id: row.get(1)?,
        event_type: row.get(2)?,
        raw_payload: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn insert_event(
    conn: &Connection,
    subscription_id: i64,
    event_type: &str,
    raw_payload: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO payment_events (subscription_id, event_type, raw_payload, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![subscription_id, event_type, raw_payload, Utc::now()],
    )?;
    Ok(())
}

fn subscription_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<Subscription>> {
    conn.query_row(
        &format!("{SUBSCRIPTION_SELECT} WHERE s.id = ?1"),
        [id],
        subscription_from_row,
    )
    .optional()
}

impl Store {
    /// Plans open for checkout, cheapest first.
    pub fn active_plans(&self) -> StoreResult<Vec<Plan>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PLAN_COLUMNS} FROM plans WHERE is_active = 1 ORDER BY price_cents, id"
            ))?;
            let rows = stmt.query_map([], plan_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Look up a plan by slug, active or not.
    pub fn plan_by_slug(&self, slug: &str) -> StoreResult<Option<Plan>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {PLAN_COLUMNS} FROM plans WHERE slug = ?1"),
                    [slug],
                    plan_from_row,
                )
                .optional()?)
        })
    }

    /// Insert a plan. A duplicate slug surfaces as a UNIQUE constraint failure.
    pub fn insert_plan(&self, draft: &PlanDraft) -> StoreResult<Plan> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                &format!(
                    "INSERT INTO plans (name, slug, description, price_cents, currency, interval,
                                        max_links, max_pages, is_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     RETURNING {PLAN_COLUMNS}"
                ),
                params![
                    draft.name,
                    draft.slug,
                    draft.description,
                    draft.price_cents,
                    draft.currency,
                    draft.interval,
                    draft.max_links,
                    draft.max_pages,
                    draft.is_active
                ],
                plan_from_row,
            )?)
        })
    }

    /// Apply `changes` to a plan.
    pub fn update_plan(&self, id: i64, changes: &PlanChanges) -> StoreResult<Option<Plan>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "UPDATE plans SET
                            name = COALESCE(?2, name),
                            description = COALESCE(?3, description),
                            price_cents = COALESCE(?4, price_cents),
                            currency = COALESCE(?5, currency),
                            interval = COALESCE(?6, interval),
                            max_links = COALESCE(?7, max_links),
                            max_pages = COALESCE(?8, max_pages),
                            is_active = COALESCE(?9, is_active)
                         WHERE id = ?1
                         RETURNING {PLAN_COLUMNS}"
                    ),
                    params![
                        id,
                        changes.name,
                        changes.description,
                        changes.price_cents,
                        changes.currency,
                        changes.interval,
                        changes.max_links,
                        changes.max_pages,
                        changes.is_active
                    ],
                    plan_from_row,
                )
                .optional()?)
        })
    }

    /// Delete a plan. Returns whether a row was removed.
    pub fn delete_plan(&self, id: i64) -> StoreResult<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM plans WHERE id = ?1", [id])? > 0))
    }

    /// An active subscription of `user_id` to `plan_id`, if one exists.
    pub fn active_subscription(
        &self,
        user_id: &str,
        plan_id: i64,
    ) -> StoreResult<Option<Subscription>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "{SUBSCRIPTION_SELECT}
                         WHERE s.user_id = ?1 AND s.plan_id = ?2 AND s.status = 'active'"
                    ),
                    params![user_id, plan_id],
                    subscription_from_row,
                )
                .optional()?)
        })
    }

    /// Create a pending subscription and record its `checkout_created` event.
    pub fn insert_pending_subscription(
        &self,
        user_id: &str,
        plan_id: i64,
        invoice_id: &str,
        started_at: DateTime<Utc>,
    ) -> StoreResult<Subscription> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO subscriptions (user_id, plan_id, status, started_at, invoice_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user_id,
                    plan_id,
                    SubscriptionStatus::Pending,
                    started_at,
                    invoice_id
                ],
            )?;
            let id = tx.last_insert_rowid();
            insert_event(&tx, id, "checkout_created", None)?;
            let sub = subscription_by_id(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(sub)
        })
    }

    /// Look up a subscription by id.
    pub fn subscription(&self, id: i64) -> StoreResult<Option<Subscription>> {
        self.with_conn(|conn| Ok(subscription_by_id(conn, id)?))
    }

    /// Record a gateway event and, when `status` is set, move the
    /// subscription to it. Returns the subscription after the change.
    pub fn apply_payment_event(
        &self,
        subscription_id: i64,
        event_type: &str,
        raw_payload: Option<&str>,
        status: Option<(SubscriptionStatus, Option<DateTime<Utc>>)>,
    ) -> StoreResult<Option<Subscription>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if subscription_by_id(&tx, subscription_id)?.is_none() {
                return Ok(None);
            }
            if let Some((status, period_end)) = status {
                tx.execute(
                    "UPDATE subscriptions
                     SET status = ?2, current_period_end = COALESCE(?3, current_period_end)
                     WHERE id = ?1",
                    params![subscription_id, status, period_end],
                )?;
            }
            insert_event(&tx, subscription_id, event_type, raw_payload)?;
            let sub = subscription_by_id(&tx, subscription_id)?;
            tx.commit()?;
            Ok(sub)
        })
    }

    /// Subscriptions of `user_id`, or of everyone when `None`; newest first.
    pub fn subscriptions(&self, user_id: Option<&str>) -> StoreResult<Vec<Subscription>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SUBSCRIPTION_SELECT}
                 WHERE ?1 IS NULL OR s.user_id = ?1
                 ORDER BY s.started_at DESC, s.id DESC"
            ))?;
            let rows = stmt.query_map([user_id], subscription_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Every recorded payment event, newest first.
    pub fn payment_events(&self) -> StoreResult<Vec<PaymentEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, subscription_id, event_type, raw_payload, created_at
                 FROM payment_events ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map([], event_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}

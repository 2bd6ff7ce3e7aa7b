//! Checkout and subscription lifecycle against a payment gateway.
//!
//! Only a stub gateway exists: it mints invoice ids and checkout URLs without
//! talking to anything. Gateway callbacks arrive through [`webhook`].

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::require_admin;
use crate::config::BillingConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{PaymentEvent, Plan, Store, Subscription, SubscriptionStatus, User};

/// Event recorded when a checkout is started.
pub const CHECKOUT_CREATED: &str = "checkout_created";
/// Gateway event that activates a subscription.
pub const INVOICE_PAID: &str = "invoice_paid";
/// Gateway event that cancels a subscription.
pub const SUBSCRIPTION_CANCELED: &str = "subscription_canceled";

/// An invoice opened with the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    /// Gateway-side id.
    pub id: String,
    /// Where the customer pays.
    pub checkout_url: String,
}

/// Opens invoices with a payment provider.
pub trait InvoiceGateway: Send + Sync {
    /// Open an invoice for `user` buying `plan`.
    fn create_invoice(&self, user: &User, plan: &Plan, now: DateTime<Utc>) -> ServiceResult<Invoice>;
}

/// Gateway that fabricates invoices locally.
#[derive(Debug, Clone)]
pub struct StubGateway {
    base_url: String,
}

impl StubGateway {
    /// A stub issuing checkout URLs under `billing.checkout_base_url`.
    pub fn new(cfg: &BillingConfig) -> Self {
        Self {
            base_url: cfg.checkout_base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl InvoiceGateway for StubGateway {
    fn create_invoice(&self, user: &User, plan: &Plan, now: DateTime<Utc>) -> ServiceResult<Invoice> {
        let short_user: String = user.id.chars().take(8).collect();
        let id = format!("INV-{short_user}-{}-{}", plan.slug, now.timestamp());
        Ok(Invoice {
            checkout_url: format!("{}/invoice/{id}", self.base_url),
            id,
        })
    }
}

/// A started checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    /// The pending subscription.
    pub subscription_id: i64,
    /// Where the customer pays.
    pub checkout_url: String,
    /// Subscription state, `pending` at this point.
    pub status: SubscriptionStatus,
}

/// End of a paid period that starts at `start` and runs one `interval`.
///
/// Unknown intervals are treated as monthly.
pub fn period_end(start: DateTime<Utc>, interval: &str) -> DateTime<Utc> {
    let months = match interval {
        "yearly" | "annual" | "annually" => 12,
        "quarterly" => 3,
        "weekly" => return start + chrono::Duration::weeks(1),
        _ => 1,
    };
    start.checked_add_months(Months::new(months)).unwrap_or(start)
}

/// Start a checkout for `plan_slug`.
#[tracing::instrument(skip(store, gateway, user), fields(user_id = %user.id))]
pub fn checkout(
    store: &Store,
    gateway: &dyn InvoiceGateway,
    user: &User,
    plan_slug: &str,
) -> ServiceResult<Checkout> {
    let plan = store
        .plan_by_slug(plan_slug)?
        .filter(|p| p.is_active)
        .ok_or_else(|| ServiceError::not_found("Plan not found or inactive."))?;

    if store.active_subscription(&user.id, plan.id)?.is_some() {
        return Err(ServiceError::Conflict(
            "You already have an active subscription for this plan.".into(),
        ));
    }

    let now = Utc::now();
    let invoice = gateway.create_invoice(user, &plan, now)?;
    let sub = store.insert_pending_subscription(&user.id, plan.id, &invoice.id, now)?;
    info!(subscription_id = sub.id, invoice_id = %invoice.id, "checkout created");
    Ok(Checkout {
        subscription_id: sub.id,
        checkout_url: invoice.checkout_url,
        status: sub.status,
    })
}

/// Apply a gateway callback to a subscription.
///
/// `invoice_paid` activates it for one billing interval and
/// `subscription_canceled` cancels it. Any other event is only recorded.
#[tracing::instrument(skip(store, raw_payload))]
pub fn webhook(
    store: &Store,
    subscription_id: i64,
    event_type: &str,
    raw_payload: Option<&str>,
) -> ServiceResult<Subscription> {
    let sub = store
        .subscription(subscription_id)?
        .ok_or_else(|| ServiceError::not_found("Subscription not found."))?;

    let transition = match event_type {
        INVOICE_PAID => {
            let interval = store
                .plan_by_slug(&sub.plan_slug)?
                .map_or_else(|| "monthly".to_string(), |p| p.interval);
            let now = Utc::now();
            Some((SubscriptionStatus::Active, Some(period_end(now, &interval))))
        }
        SUBSCRIPTION_CANCELED => Some((SubscriptionStatus::Canceled, None)),
        other => {
            warn!(event_type = other, "unhandled payment event recorded without state change");
            None
        }
    };

    let updated = store
        .apply_payment_event(subscription_id, event_type, raw_payload, transition)?
        .ok_or_else(|| ServiceError::not_found("Subscription not found."))?;
    info!(status = %updated.status, "payment event applied");
    Ok(updated)
}

/// The user's subscriptions, newest first.
pub fn my_subscriptions(store: &Store, user: &User) -> ServiceResult<Vec<Subscription>> {
    Ok(store.subscriptions(Some(&user.id))?)
}

/// Every subscription, newest first. Admin only.
pub fn all_subscriptions(store: &Store, admin: &User) -> ServiceResult<Vec<Subscription>> {
    require_admin(admin)?;
    Ok(store.subscriptions(None)?)
}

/// Every payment event, newest first. Admin only.
pub fn payment_events(store: &Store, admin: &User) -> ServiceResult<Vec<PaymentEvent>> {
    require_admin(admin)?;
    Ok(store.payment_events()?)
}

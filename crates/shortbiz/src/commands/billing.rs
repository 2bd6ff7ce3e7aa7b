//! Billing command: checkout, gateway callbacks, and subscription listings.

use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use shortbiz_core::payments::{self, StubGateway};
use shortbiz_core::store::{PaymentEvent, Subscription, SubscriptionStatus};
use tracing::instrument;

use super::{AppContext, print_json};

/// Arguments for the `billing` subcommand.
#[derive(Args, Debug)]
pub struct BillingArgs {
    #[command(subcommand)]
    command: BillingCommand,
}

#[derive(Subcommand, Debug)]
enum BillingCommand {
    /// Start a checkout for a plan
    Checkout {
        /// Plan slug
        plan: String,
    },
    /// Apply a payment gateway callback to a subscription
    Webhook {
        /// Subscription id
        subscription_id: i64,
        /// Event type (invoice_paid, subscription_canceled, ...)
        event_type: String,
        /// Raw callback body, stored with the event
        #[arg(long)]
        payload: Option<String>,
    },
    /// List your subscriptions
    Subscriptions {
        /// Every account's subscriptions (admin)
        #[arg(long)]
        all: bool,
    },
    /// List recorded payment events (admin)
    Events,
}

/// Run a `billing` subcommand.
#[instrument(name = "cmd_billing", skip_all)]
pub fn cmd_billing(args: BillingArgs, ctx: &AppContext) -> anyhow::Result<()> {
    match args.command {
        BillingCommand::Checkout { plan } => {
            let user = ctx.current_user()?;
            let gateway = StubGateway::new(&ctx.config.billing);
            let checkout = payments::checkout(&ctx.store, &gateway, &user, &plan)?;
            if ctx.json {
                print_json(&checkout)?;
            } else {
                println!(
                    "{} subscription {} ({})",
                    "Checkout started:".green(),
                    checkout.subscription_id,
                    checkout.status
                );
                println!("{}: {}", "Pay at".dimmed(), checkout.checkout_url.cyan());
            }
        }
        BillingCommand::Webhook {
            subscription_id,
            event_type,
            payload,
        } => {
            // Gateway callbacks are unauthenticated, as with the HTTP webhook.
            let sub =
                payments::webhook(&ctx.store, subscription_id, &event_type, payload.as_deref())?;
            if ctx.json {
                print_json(&sub)?;
            } else {
                print_subscription(&sub);
            }
        }
        BillingCommand::Subscriptions { all } => {
            let user = ctx.current_user()?;
            let subs = if all {
                payments::all_subscriptions(&ctx.store, &user)?
            } else {
                payments::my_subscriptions(&ctx.store, &user)?
            };
            if ctx.json {
                print_json(&subs)?;
            } else if subs.is_empty() {
                println!("{}", "No subscriptions.".dimmed());
            } else {
                for sub in &subs {
                    print_subscription(sub);
                }
            }
        }
        BillingCommand::Events => {
            let admin = ctx.current_user()?;
            let events = payments::payment_events(&ctx.store, &admin)?;
            if ctx.json {
                print_json(&events)?;
            } else {
                for event in &events {
                    print_event(event);
                }
            }
        }
    }
    Ok(())
}

fn print_subscription(sub: &Subscription) {
    let status = match sub.status {
        SubscriptionStatus::Active => sub.status.green().to_string(),
        SubscriptionStatus::Pending => sub.status.yellow().to_string(),
        SubscriptionStatus::Canceled => sub.status.red().to_string(),
    };
    print!(
        "{:>4}  {} ({})  {status}",
        format!("#{}", sub.id).cyan(),
        sub.plan_name.bold(),
        sub.plan_slug
    );
    if let Some(end) = sub.current_period_end {
        print!("  {}", format!("until {}", end.format("%Y-%m-%d")).dimmed());
    }
    println!();
}

fn print_event(event: &PaymentEvent) {
    println!(
        "{}  {:>4}  {}",
        event.created_at.format("%Y-%m-%d %H:%M:%S").dimmed(),
        format!("#{}", event.subscription_id).cyan(),
        event.event_type
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use shortbiz_core::store::{PlanDraft, Role};

    fn checkout(plan: &str) -> BillingArgs {
        BillingArgs {
            command: BillingCommand::Checkout { plan: plan.into() },
        }
    }

    #[test]
    fn checkout_then_pay() {
        let mut ctx = test_support::context();
        ctx.store
            .insert_plan(&PlanDraft::new("Pro", "pro", 1900))
            .unwrap();
        let user = test_support::sign_in(&mut ctx, "a@example.com", Role::User);

        cmd_billing(checkout("pro"), &ctx).unwrap();
        let sub = &payments::my_subscriptions(&ctx.store, &user).unwrap()[0];
        assert_eq!(sub.status, SubscriptionStatus::Pending);

        let paid = BillingArgs {
            command: BillingCommand::Webhook {
                subscription_id: sub.id,
                event_type: payments::INVOICE_PAID.into(),
                payload: Some(r#"{"paid":true}"#.into()),
            },
        };
        cmd_billing(paid, &ctx).unwrap();
        let sub = ctx.store.subscription(sub.id).unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);

        let err = cmd_billing(checkout("pro"), &ctx).unwrap_err();
        assert!(err.to_string().contains("already have an active subscription"));

        cmd_billing(
            BillingArgs {
                command: BillingCommand::Subscriptions { all: false },
            },
            &ctx,
        )
        .unwrap();
    }

    #[test]
    fn admin_views_are_guarded() {
        let mut ctx = test_support::context();
        test_support::sign_in(&mut ctx, "a@example.com", Role::User);
        assert!(
            cmd_billing(
                BillingArgs {
                    command: BillingCommand::Events
                },
                &ctx
            )
            .is_err()
        );
        assert!(
            cmd_billing(
                BillingArgs {
                    command: BillingCommand::Subscriptions { all: true }
                },
                &ctx
            )
            .is_err()
        );

        test_support::sign_in(&mut ctx, "boss@example.com", Role::Admin);
        cmd_billing(
            BillingArgs {
                command: BillingCommand::Events,
            },
            &ctx,
        )
        .unwrap();
    }
}

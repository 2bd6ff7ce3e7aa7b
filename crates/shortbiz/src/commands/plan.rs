//! Plan command: the pricing catalogue.

use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use shortbiz_core::pricing;
use shortbiz_core::store::{Plan, PlanChanges, PlanDraft};
use tracing::instrument;

use super::{AppContext, format_price, print_json};

/// Arguments for the `plan` subcommand.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(subcommand)]
    command: PlanCommand,
}

#[derive(Subcommand, Debug)]
enum PlanCommand {
    /// List plans open for checkout, cheapest first
    List,
    /// Add a plan (admin)
    Create(CreateArgs),
    /// Change a plan (admin)
    Update(UpdateArgs),
    /// Delete a plan (admin)
    Delete {
        /// Plan id
        id: i64,
    },
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Display name
    name: String,

    /// Unique identifier used at checkout
    slug: String,

    /// Price per interval in cents
    #[arg(long)]
    price_cents: i64,

    /// ISO currency code
    #[arg(long, default_value = "USD")]
    currency: String,

    /// Billing interval (monthly, quarterly, yearly, weekly)
    #[arg(long, default_value = "monthly")]
    interval: String,

    /// Marketing copy
    #[arg(long)]
    description: Option<String>,

    /// Link limit
    #[arg(long)]
    max_links: Option<i64>,

    /// Page limit
    #[arg(long)]
    max_pages: Option<i64>,

    /// Create the plan closed for checkout
    #[arg(long)]
    inactive: bool,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// Plan id
    id: i64,

    /// New name
    #[arg(long)]
    name: Option<String>,

    /// New description
    #[arg(long)]
    description: Option<String>,

    /// New price in cents
    #[arg(long)]
    price_cents: Option<i64>,

    /// New currency
    #[arg(long)]
    currency: Option<String>,

    /// New interval
    #[arg(long)]
    interval: Option<String>,

    /// New link limit
    #[arg(long)]
    max_links: Option<i64>,

    /// New page limit
    #[arg(long)]
    max_pages: Option<i64>,

    /// Open or close the plan for checkout
    #[arg(long)]
    active: Option<bool>,
}

/// Run a `plan` subcommand.
#[instrument(name = "cmd_plan", skip_all)]
pub fn cmd_plan(args: PlanArgs, ctx: &AppContext) -> anyhow::Result<()> {
    match args.command {
        PlanCommand::List => {
            let plans = pricing::list_active_plans(&ctx.store)?;
            if ctx.json {
                print_json(&plans)?;
            } else if plans.is_empty() {
                println!("{}", "No plans on offer.".dimmed());
            } else {
                for plan in &plans {
                    print_plan(plan);
                }
            }
        }
        PlanCommand::Create(create) => {
            let admin = ctx.current_user()?;
            let draft = PlanDraft {
                name: create.name,
                slug: create.slug,
                description: create.description,
                price_cents: create.price_cents,
                currency: create.currency,
                interval: create.interval,
                max_links: create.max_links,
                max_pages: create.max_pages,
                is_active: !create.inactive,
            };
            let plan = pricing::create_plan(&ctx.store, &admin, &draft)?;
            if ctx.json {
                print_json(&plan)?;
            } else {
                print!("{} ", "Created".green());
                print_plan(&plan);
            }
        }
        PlanCommand::Update(update) => {
            let admin = ctx.current_user()?;
            let changes = PlanChanges {
                name: update.name,
                description: update.description,
                price_cents: update.price_cents,
                currency: update.currency,
                interval: update.interval,
                max_links: update.max_links,
                max_pages: update.max_pages,
                is_active: update.active,
            };
            let plan = pricing::update_plan(&ctx.store, &admin, update.id, &changes)?;
            if ctx.json {
                print_json(&plan)?;
            } else {
                print!("{} ", "Updated".green());
                print_plan(&plan);
            }
        }
        PlanCommand::Delete { id } => {
            let admin = ctx.current_user()?;
            pricing::delete_plan(&ctx.store, &admin, id)?;
            if ctx.json {
                print_json(&serde_json::json!({ "deleted": id }))?;
            } else {
                println!("{} plan {id}", "Deleted".green());
            }
        }
    }
    Ok(())
}

fn print_plan(plan: &Plan) {
    println!(
        "{} ({})  {} / {}",
        plan.name.bold(),
        plan.slug.cyan(),
        format_price(plan.price_cents, &plan.currency),
        plan.interval
    );
    let mut limits = Vec::new();
    if let Some(links) = plan.max_links {
        limits.push(format!("{links} links"));
    }
    if let Some(pages) = plan.max_pages {
        limits.push(format!("{pages} pages"));
    }
    if !limits.is_empty() {
        println!("    {}", limits.join(", ").dimmed());
    }
    if let Some(ref desc) = plan.description {
        println!("    {desc}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use shortbiz_core::store::Role;

    fn create(slug: &str, cents: i64) -> PlanArgs {
        PlanArgs {
            command: PlanCommand::Create(CreateArgs {
                name: "Pro".into(),
                slug: slug.into(),
                price_cents: cents,
                currency: "USD".into(),
                interval: "monthly".into(),
                description: None,
                max_links: Some(50),
                max_pages: None,
                inactive: false,
            }),
        }
    }

    #[test]
    fn admin_lifecycle() {
        let mut ctx = test_support::context();
        test_support::sign_in(&mut ctx, "boss@example.com", Role::Admin);

        cmd_plan(create("pro", 1900), &ctx).unwrap();
        let plan = ctx.store.plan_by_slug("pro").unwrap().unwrap();
        assert_eq!(plan.max_links, Some(50));

        let update = PlanArgs {
            command: PlanCommand::Update(UpdateArgs {
                id: plan.id,
                name: None,
                description: Some("For growing shops".into()),
                price_cents: None,
                currency: None,
                interval: None,
                max_links: None,
                max_pages: None,
                active: Some(false),
            }),
        };
        cmd_plan(update, &ctx).unwrap();
        assert!(pricing::list_active_plans(&ctx.store).unwrap().is_empty());

        cmd_plan(
            PlanArgs {
                command: PlanCommand::Delete { id: plan.id },
            },
            &ctx,
        )
        .unwrap();
        assert!(ctx.store.plan_by_slug("pro").unwrap().is_none());
    }

    #[test]
    fn list_is_public_but_create_is_not() {
        let mut ctx = test_support::context();
        cmd_plan(
            PlanArgs {
                command: PlanCommand::List,
            },
            &ctx,
        )
        .unwrap();

        test_support::sign_in(&mut ctx, "a@example.com", Role::User);
        let err = cmd_plan(create("pro", 1900), &ctx).unwrap_err();
        assert!(err.to_string().contains("Admin access required"));
    }
}

//! Public command: what visitors see, and recording their visits.

use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use shortbiz_core::content;
use shortbiz_core::store::VisitMeta;
use tracing::instrument;

use super::block::print_block;
use super::page::print_page;
use super::{AppContext, print_json};

/// Arguments for the `public` subcommand.
#[derive(Args, Debug)]
pub struct PublicArgs {
    #[command(subcommand)]
    command: PublicCommand,
}

#[derive(Subcommand, Debug)]
enum PublicCommand {
    /// Show a published page with its visible blocks
    Page {
        /// Page slug
        slug: String,
    },
    /// Record a page view
    View {
        /// Page slug
        slug: String,
        #[command(flatten)]
        visit: VisitArgs,
    },
    /// Record a click on a block
    Click {
        /// Page slug
        slug: String,
        /// Block id
        block_id: i64,
        #[command(flatten)]
        visit: VisitArgs,
    },
}

#[derive(Args, Debug, Default)]
struct VisitArgs {
    /// Visitor IP address
    #[arg(long)]
    ip: Option<String>,

    /// Visitor user agent
    #[arg(long)]
    user_agent: Option<String>,

    /// Referring URL
    #[arg(long)]
    referrer: Option<String>,
}

impl From<VisitArgs> for VisitMeta {
    fn from(args: VisitArgs) -> Self {
        Self {
            ip_address: args.ip,
            user_agent: args.user_agent,
            referrer: args.referrer,
        }
    }
}

/// Run a `public` subcommand. No sign-in needed.
#[instrument(name = "cmd_public", skip_all)]
pub fn cmd_public(args: PublicArgs, ctx: &AppContext) -> anyhow::Result<()> {
    match args.command {
        PublicCommand::Page { slug } => {
            let public = content::public_page(&ctx.store, &slug)?;
            if ctx.json {
                print_json(&public)?;
            } else {
                print_page(&public.page);
                println!();
                for block in &public.blocks {
                    print_block(block);
                }
            }
        }
        PublicCommand::View { slug, visit } => {
            content::track_view(&ctx.store, &slug, &visit.into())?;
            if ctx.json {
                print_json(&serde_json::json!({ "recorded": "view", "slug": slug }))?;
            } else {
                println!("{} view of /{slug}", "Recorded".green());
            }
        }
        PublicCommand::Click {
            slug,
            block_id,
            visit,
        } => {
            content::track_click(&ctx.store, &slug, block_id, &visit.into())?;
            if ctx.json {
                print_json(&serde_json::json!({
                    "recorded": "click",
                    "slug": slug,
                    "block_id": block_id,
                }))?;
            } else {
                println!("{} click on block {block_id} of /{slug}", "Recorded".green());
            }
        }
    }
    Ok(())
}

//! Page command: the signed-in owner's link-in-bio page.

use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use shortbiz_core::content::{self, PageStats};
use shortbiz_core::store::{Page, PageDraft};
use tracing::instrument;

use super::{AppContext, print_json};

/// Arguments for the `page` subcommand.
#[derive(Args, Debug)]
pub struct PageArgs {
    #[command(subcommand)]
    command: PageCommand,
}

#[derive(Subcommand, Debug)]
enum PageCommand {
    /// Show your page
    Show,
    /// Create or replace your page
    Save(SaveArgs),
    /// Views and clicks on your page
    Stats,
}

#[derive(Args, Debug)]
struct SaveArgs {
    /// Public URL slug (lowercase letters, digits, `-`, `_`)
    #[arg(long)]
    slug: String,

    /// Display title
    #[arg(long)]
    title: String,

    /// Short bio
    #[arg(long)]
    bio: Option<String>,

    /// Avatar image URL
    #[arg(long)]
    avatar_url: Option<String>,

    /// Theme name
    #[arg(long)]
    theme: Option<String>,
}

impl From<SaveArgs> for PageDraft {
    fn from(args: SaveArgs) -> Self {
        Self {
            slug: args.slug,
            title: args.title,
            bio: args.bio,
            avatar_url: args.avatar_url,
            theme: args.theme,
        }
    }
}

/// Run a `page` subcommand.
#[instrument(name = "cmd_page", skip_all)]
pub fn cmd_page(args: PageArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let user = ctx.current_user()?;
    match args.command {
        PageCommand::Show => {
            let page = content::get_my_page(&ctx.store, &user.id)?;
            if ctx.json {
                print_json(&page)?;
            } else {
                print_page(&page);
            }
        }
        PageCommand::Save(save) => {
            let page = content::upsert_my_page(&ctx.store, &user.id, &save.into())?;
            if ctx.json {
                print_json(&page)?;
            } else {
                println!("{} /{}", "Saved".green(), page.slug.bold());
            }
        }
        PageCommand::Stats => {
            let stats = content::page_stats(&ctx.store, &user.id)?;
            if ctx.json {
                print_json(&stats)?;
            } else {
                print_stats(&stats);
            }
        }
    }
    Ok(())
}

pub(crate) fn print_page(page: &Page) {
    println!("{}  {}", page.title.bold(), format!("/{}", page.slug).cyan());
    if let Some(ref bio) = page.bio {
        println!("{bio}");
    }
    if let Some(ref url) = page.avatar_url {
        println!("{}: {}", "Avatar".dimmed(), url);
    }
    if let Some(ref theme) = page.theme {
        println!("{}: {}", "Theme".dimmed(), theme);
    }
}

fn print_stats(stats: &PageStats) {
    println!("{}", format!("/{}", stats.slug).bold());
    println!("{}: {}", "Views".dimmed(), stats.total_views);
    println!("{}: {}", "Clicks".dimmed(), stats.total_clicks);
    if !stats.blocks.is_empty() {
        println!();
        for block in &stats.blocks {
            println!("{:>6}  {}", block.clicks.cyan(), block.label);
        }
    }
}

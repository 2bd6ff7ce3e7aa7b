//! Block command: links on the signed-in owner's page.

use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use shortbiz_core::content;
use shortbiz_core::store::{Block, BlockChanges, BlockDraft};
use tracing::instrument;

use super::{AppContext, print_json};

/// Arguments for the `block` subcommand.
#[derive(Args, Debug)]
pub struct BlockArgs {
    #[command(subcommand)]
    command: BlockCommand,
}

#[derive(Subcommand, Debug)]
enum BlockCommand {
    /// List your blocks in display order
    List,
    /// Add a link block
    Add(AddArgs),
    /// Change fields of a block
    Update(UpdateArgs),
    /// Delete a block
    Remove {
        /// Block id
        id: i64,
    },
}

#[derive(Args, Debug)]
struct AddArgs {
    /// Link text
    label: String,

    /// Link target (http or https)
    url: String,

    /// Highlight this link
    #[arg(long)]
    primary: bool,

    /// Position (defaults to after the last block)
    #[arg(long)]
    position: Option<i64>,

    /// Hide the block from the public page
    #[arg(long)]
    hidden: bool,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// Block id
    id: i64,

    /// New link text
    #[arg(long)]
    label: Option<String>,

    /// New link target
    #[arg(long)]
    url: Option<String>,

    /// Highlight this link
    #[arg(long)]
    primary: Option<bool>,

    /// New position
    #[arg(long)]
    position: Option<i64>,

    /// Show on the public page
    #[arg(long)]
    active: Option<bool>,
}

/// Run a `block` subcommand.
#[instrument(name = "cmd_block", skip_all)]
pub fn cmd_block(args: BlockArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let user = ctx.current_user()?;
    match args.command {
        BlockCommand::List => {
            let blocks = content::list_my_blocks(&ctx.store, &user.id)?;
            if ctx.json {
                print_json(&blocks)?;
            } else if blocks.is_empty() {
                println!("{}", "No blocks yet.".dimmed());
            } else {
                for block in &blocks {
                    print_block(block);
                }
            }
        }
        BlockCommand::Add(add) => {
            let draft = BlockDraft {
                label: add.label,
                url: add.url,
                is_primary: add.primary,
                sort_order: add.position,
                is_active: !add.hidden,
            };
            let block = content::create_block(&ctx.store, &user.id, &draft)?;
            emit(ctx, &block, "Added")?;
        }
        BlockCommand::Update(update) => {
            let changes = BlockChanges {
                label: update.label,
                url: update.url,
                is_primary: update.primary,
                sort_order: update.position,
                is_active: update.active,
            };
            let block = content::update_block(&ctx.store, &user.id, update.id, &changes)?;
            emit(ctx, &block, "Updated")?;
        }
        BlockCommand::Remove { id } => {
            content::delete_block(&ctx.store, &user.id, id)?;
            if ctx.json {
                print_json(&serde_json::json!({ "deleted": id }))?;
            } else {
                println!("{} block {id}", "Removed".green());
            }
        }
    }
    Ok(())
}

fn emit(ctx: &AppContext, block: &Block, verb: &str) -> anyhow::Result<()> {
    if ctx.json {
        print_json(block)
    } else {
        print!("{} ", verb.green());
        print_block(block);
        Ok(())
    }
}

pub(crate) fn print_block(block: &Block) {
    let marker = if block.is_primary { "*" } else { " " };
    let position = block
        .sort_order
        .map_or_else(|| "-".to_string(), |p| p.to_string());
    print!(
        "{:>4} {marker} {}  {}",
        format!("#{}", block.id).cyan(),
        block.label.bold(),
        block.url
    );
    print!("  {}", format!("pos {position}").dimmed());
    if !block.is_active {
        print!("  {}", "hidden".yellow());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use shortbiz_core::store::{PageDraft, Role};

    fn add(label: &str, url: &str) -> BlockArgs {
        BlockArgs {
            command: BlockCommand::Add(AddArgs {
                label: label.into(),
                url: url.into(),
                primary: false,
                position: None,
                hidden: false,
            }),
        }
    }

    fn with_page() -> (AppContext, String) {
        let mut ctx = test_support::context();
        let user = test_support::sign_in(&mut ctx, "ann@example.com", Role::User);
        content::upsert_my_page(
            &ctx.store,
            &user.id,
            &PageDraft {
                slug: "ann".into(),
                title: "Ann".into(),
                ..PageDraft::default()
            },
        )
        .unwrap();
        (ctx, user.id)
    }

    #[test]
    fn add_update_remove() {
        let (ctx, owner) = with_page();
        cmd_block(add("Shop", "https://shop.example.com"), &ctx).unwrap();
        cmd_block(add("Blog", "https://blog.example.com"), &ctx).unwrap();

        let blocks = content::list_my_blocks(&ctx.store, &owner).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].sort_order, Some(blocks[0].sort_order.unwrap() + 1));

        let update = BlockArgs {
            command: BlockCommand::Update(UpdateArgs {
                id: blocks[0].id,
                label: Some("Store".into()),
                url: None,
                primary: Some(true),
                position: None,
                active: Some(false),
            }),
        };
        cmd_block(update, &ctx).unwrap();
        let first = ctx.store.owned_block(&owner, blocks[0].id).unwrap().unwrap();
        assert_eq!(first.label, "Store");
        assert!(first.is_primary);
        assert!(!first.is_active);

        cmd_block(
            BlockArgs {
                command: BlockCommand::Remove { id: blocks[1].id },
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(content::list_my_blocks(&ctx.store, &owner).unwrap().len(), 1);
    }

    #[test]
    fn rejects_non_http_links() {
        let (ctx, _) = with_page();
        assert!(cmd_block(add("Mail", "mailto:ann@example.com"), &ctx).is_err());
    }

    #[test]
    fn removing_missing_block_fails() {
        let (ctx, _) = with_page();
        let err = cmd_block(
            BlockArgs {
                command: BlockCommand::Remove { id: 99 },
            },
            &ctx,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Block not found"));
    }
}

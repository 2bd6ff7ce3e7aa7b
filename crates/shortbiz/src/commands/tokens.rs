//! Tokens command: top up account balances.

use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use serde::Serialize;
use shortbiz_core::auth;
use tracing::instrument;

use super::{AppContext, print_json};

/// Arguments for the `tokens` subcommand.
#[derive(Args, Debug)]
pub struct TokensArgs {
    #[command(subcommand)]
    command: TokensCommand,
}

#[derive(Subcommand, Debug)]
enum TokensCommand {
    /// Add tokens to an account (admin)
    Grant {
        /// Account id
        user_id: String,
        /// Tokens to add
        amount: i64,
    },
}

#[derive(Serialize)]
struct Grant<'a> {
    user_id: &'a str,
    granted: i64,
    tokens_remaining: i64,
}

/// Run a `tokens` subcommand.
#[instrument(name = "cmd_tokens", skip_all)]
pub fn cmd_tokens(args: TokensArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let TokensCommand::Grant { user_id, amount } = args.command;
    let admin = ctx.current_user()?;
    let balance = auth::grant_tokens(&ctx.store, &admin, &user_id, amount)?;

    if ctx.json {
        print_json(&Grant {
            user_id: &user_id,
            granted: amount,
            tokens_remaining: balance,
        })?;
    } else {
        println!(
            "{} {amount} tokens to {user_id} (balance: {})",
            "Granted".green(),
            balance.cyan()
        );
    }
    Ok(())
}

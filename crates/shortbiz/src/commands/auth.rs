//! Auth command: register, log in, and show the signed-in account.

use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use shortbiz_core::auth::Registration;
use shortbiz_core::store::{Role, User};
use tracing::{debug, instrument};

use super::{AppContext, print_json};

/// Arguments for the `auth` subcommand.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    command: AuthCommand,
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Create an account
    Register(CredentialArgs),
    /// Exchange credentials for an access token
    Login(CredentialArgs),
    /// Show the signed-in account and its token balance
    Me,
}

#[derive(Args, Debug)]
struct CredentialArgs {
    /// Account email
    #[arg(long)]
    email: String,

    /// Account password (at least 8 characters)
    #[arg(long, env = "SHORTBIZ_PASSWORD", hide_env_values = true)]
    password: String,

    /// Role for a new account (ignored by `login`)
    #[arg(long, value_enum, default_value_t)]
    role: Role,
}

/// Run an `auth` subcommand.
#[instrument(name = "cmd_auth", skip_all)]
pub fn cmd_auth(args: AuthArgs, ctx: &AppContext) -> anyhow::Result<()> {
    match args.command {
        AuthCommand::Register(creds) => {
            debug!(email = %creds.email, role = %creds.role, "registering account");
            let user = ctx.auth.register(
                &ctx.store,
                &Registration {
                    email: creds.email,
                    password: creds.password,
                    role: creds.role,
                },
            )?;
            if ctx.json {
                print_json(&user)?;
            } else {
                println!("{} {}", "Registered".green(), user.email.bold());
                print_account(&user);
            }
        }
        AuthCommand::Login(creds) => {
            let token = ctx.auth.login(&ctx.store, &creds.email, &creds.password)?;
            if ctx.json {
                print_json(&token)?;
            } else {
                // Bare token so `export SHORTBIZ_TOKEN=$(shortbiz auth login ...)` works.
                println!("{}", token.access_token);
            }
        }
        AuthCommand::Me => {
            let user = ctx.current_user()?;
            if ctx.json {
                print_json(&user)?;
            } else {
                println!("{}", user.email.bold());
                print_account(&user);
            }
        }
    }
    Ok(())
}

fn print_account(user: &User) {
    println!("{}: {}", "Id".dimmed(), user.id);
    println!("{}: {}", "Role".dimmed(), user.role);
    println!("{}: {}", "Tokens".dimmed(), user.tokens_remaining.cyan());
    println!(
        "{}: {}",
        "Created".dimmed(),
        user.created_at.format("%Y-%m-%d %H:%M UTC")
    );
}

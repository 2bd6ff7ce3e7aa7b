//! Contact command: the public contact form and its inbox.

use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use shortbiz_core::contact::{self, ContactForm};
use tracing::instrument;

use super::{AppContext, print_json};

/// Arguments for the `contact` subcommand.
#[derive(Args, Debug)]
pub struct ContactArgs {
    #[command(subcommand)]
    command: ContactCommand,
}

#[derive(Subcommand, Debug)]
enum ContactCommand {
    /// Send a message
    Submit {
        /// Your name
        #[arg(long)]
        name: String,
        /// Your email
        #[arg(long)]
        email: String,
        /// Subject line
        #[arg(long)]
        subject: Option<String>,
        /// Message body
        #[arg(long)]
        message: String,
    },
    /// Read received messages, newest first (admin)
    List,
}

/// Run a `contact` subcommand.
#[instrument(name = "cmd_contact", skip_all)]
pub fn cmd_contact(args: ContactArgs, ctx: &AppContext) -> anyhow::Result<()> {
    match args.command {
        ContactCommand::Submit {
            name,
            email,
            subject,
            message,
        } => {
            let form = ContactForm {
                name,
                email,
                subject,
                message,
            };
            let saved = contact::submit_contact(&ctx.store, &form)?;
            if ctx.json {
                print_json(&saved)?;
            } else {
                println!("{} Thanks, we'll be in touch.", "Sent.".green());
            }
        }
        ContactCommand::List => {
            let admin = ctx.current_user()?;
            let messages = contact::list_contact_messages(&ctx.store, &admin)?;
            if ctx.json {
                print_json(&messages)?;
            } else if messages.is_empty() {
                println!("{}", "Inbox is empty.".dimmed());
            } else {
                for msg in &messages {
                    println!(
                        "{}  {} <{}>",
                        msg.created_at.format("%Y-%m-%d %H:%M").dimmed(),
                        msg.name.bold(),
                        msg.email
                    );
                    if let Some(ref subject) = msg.subject {
                        println!("  {}", subject.cyan());
                    }
                    println!("  {}", msg.message);
                    println!();
                }
            }
        }
    }
    Ok(())
}

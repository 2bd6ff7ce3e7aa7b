//! Library interface for the `shortbiz` CLI.
//!
//! This crate exposes the CLI's argument parser and command structure as a library,
//! primarily for documentation generation and testing. The actual entry point is
//! in `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Available subcommands
//! - [`commands`] - Command implementations
//!
//! # Documentation Generation
//!
//! The [`command()`] function returns the clap `Command` for generating man pages
//! and shell completions via `xtask`.

pub mod commands;

#[cfg(feature = "mcp")]
pub mod server;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    ///
    /// Call this once at startup to set the color mode.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG                   Log filter (e.g., debug, shortbiz_core=trace)
    SHORTBIZ_LOG_PATH          Explicit log file path
    SHORTBIZ_LOG_DIR           Log directory
    SHORTBIZ_TOKEN             Access token (same as --token)
    SHORTBIZ_DATABASE_PATH     SQLite database file
    SHORTBIZ_AUTH__JWT_SECRET  Secret used to sign access tokens
    OPENAI_API_KEY             Generation backend API key
    OPENAI_MODEL               Generation model
";
/// Command-line interface definition for shortbiz.
#[derive(Parser)]
#[command(name = "shortbiz")]
#[command(about = "Small-business backend: accounts, link-in-bio pages, billing, and AI blog posts", long_about = None)]
#[command(version, arg_required_else_help = true)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Print only the version number (for scripting)
    #[arg(long)]
    pub version_only: bool,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Access token from `auth login`
    #[arg(long, global = true, env = "SHORTBIZ_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Register, sign in, and inspect the current account
    Auth(commands::auth::AuthArgs),

    /// Manage token balances (admin)
    Tokens(commands::tokens::TokensArgs),

    /// Estimate, generate, and read AI blog posts
    Blog(commands::blog::BlogArgs),

    /// Manage your link-in-bio page
    Page(commands::page::PageArgs),

    /// Manage the link blocks on your page
    Block(commands::block::BlockArgs),

    /// Public page access and visit tracking
    Public(commands::public::PublicArgs),

    /// Browse and manage pricing plans
    Plan(commands::plan::PlanArgs),

    /// Checkout, payment callbacks, and subscriptions
    Billing(commands::billing::BillingArgs),

    /// Send or read contact form messages
    Contact(commands::contact::ContactArgs),

    /// Show package information
    Info(commands::info::InfoArgs),

    /// Start MCP (Model Context Protocol) server on stdio
    #[cfg(feature = "mcp")]
    Serve(commands::serve::ServeArgs),
}

/// Returns the clap command for documentation generation
pub fn command() -> clap::Command {
    Cli::command()
}

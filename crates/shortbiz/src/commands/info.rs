//! Info command implementation

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use shortbiz_core::config::{Config, ConfigSources};
use tracing::{debug, instrument};

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_path: Option<String>,
    brand_name: String,
    starting_tokens: i64,
    model: String,
    api_base: String,
    api_key_set: bool,
    token_ttl_minutes: i64,
    checkout_base_url: String,
}

impl ConfigInfo {
    fn from_config(config: &Config, sources: &ConfigSources) -> Self {
        Self {
            config_file: sources.primary_file().map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            database_path: config.database_path.as_ref().map(|p| p.to_string()),
            brand_name: config.brand_name.clone(),
            starting_tokens: config.starting_tokens,
            model: config.llm.model.clone(),
            api_base: config.llm.api_base.clone(),
            api_key_set: config.llm.api_key.as_deref().is_some_and(|k| !k.is_empty()),
            token_ttl_minutes: config.auth.token_ttl_minutes,
            checkout_base_url: config.billing.checkout_base_url.clone(),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
}

/// Print package information
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `sources` - Config source metadata from loading
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    sources: &ConfigSources,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let full_info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, sources),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&full_info)?);
        return Ok(());
    }

    let pkg = &full_info.package;
    println!("{} {}", pkg.name.bold(), pkg.version.green());
    if !pkg.description.is_empty() {
        println!("{}", pkg.description);
    }
    if !pkg.license.is_empty() {
        println!("{}: {}", "License".dimmed(), pkg.license);
    }
    if !pkg.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), pkg.repository.cyan());
    }

    let cfg = &full_info.config;
    println!();
    println!("{}", "Configuration".bold().underline());
    match cfg.config_file {
        Some(ref path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    println!("{}: {}", "Log level".dimmed(), cfg.log_level);
    if let Some(ref dir) = cfg.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }
    println!(
        "{}: {}",
        "Database".dimmed(),
        cfg.database_path.as_deref().unwrap_or("(user data dir)")
    );
    println!("{}: {}", "Brand".dimmed(), cfg.brand_name);
    println!("{}: {}", "Starting tokens".dimmed(), cfg.starting_tokens);

    println!();
    println!("{}", "Generation".bold().underline());
    println!("{}: {}", "Model".dimmed(), cfg.model);
    println!("{}: {}", "API base".dimmed(), cfg.api_base);
    if cfg.api_key_set {
        println!("{}: {}", "API key".dimmed(), "set".green());
    } else {
        println!("{}: {}", "API key".dimmed(), "missing".yellow());
    }

    Ok(())
}

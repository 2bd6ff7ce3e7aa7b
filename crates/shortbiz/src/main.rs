//! shortbiz CLI
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use shortbiz::commands::AppContext;
use shortbiz::{Cli, Commands, commands};
use shortbiz_core::config::ConfigLoader;
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if cli.version_only {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // arg_required_else_help ensures we have --version-only or a subcommand
    let Some(command) = cli.command else {
        return Ok(());
    };

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let (config, config_sources) = loader.load().context("failed to load configuration")?;

    let obs_config = observability::ObservabilityConfig::from_env_with_overrides(
        config
            .log_dir
            .as_ref()
            .map(|dir| dir.as_std_path().to_path_buf()),
    );
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging/tracing")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        signed_in = cli.token.is_some(),
        "CLI initialized"
    );

    let json = cli.json;
    let open = || AppContext::open(config.clone(), cli.token.clone(), json);

    // Execute command
    let result = match command {
        Commands::Auth(args) => open().and_then(|ctx| commands::auth::cmd_auth(args, &ctx)),
        Commands::Tokens(args) => open().and_then(|ctx| commands::tokens::cmd_tokens(args, &ctx)),
        Commands::Blog(args) => open().and_then(|ctx| commands::blog::cmd_blog(args, &ctx)),
        Commands::Page(args) => open().and_then(|ctx| commands::page::cmd_page(args, &ctx)),
        Commands::Block(args) => open().and_then(|ctx| commands::block::cmd_block(args, &ctx)),
        Commands::Public(args) => open().and_then(|ctx| commands::public::cmd_public(args, &ctx)),
        Commands::Plan(args) => open().and_then(|ctx| commands::plan::cmd_plan(args, &ctx)),
        Commands::Billing(args) => {
            open().and_then(|ctx| commands::billing::cmd_billing(args, &ctx))
        }
        Commands::Contact(args) => {
            open().and_then(|ctx| commands::contact::cmd_contact(args, &ctx))
        }
        Commands::Info(args) => commands::info::cmd_info(args, json, &config, &config_sources),
        #[cfg(feature = "mcp")]
        Commands::Serve(args) => open().and_then(|ctx| {
            let rt = tokio::runtime::Runtime::new()
                .context("failed to create async runtime for MCP server")?;
            rt.block_on(commands::serve::cmd_serve(args, ctx))
        }),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}

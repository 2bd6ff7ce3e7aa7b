//! Serve command: run the MCP server on stdio.

use anyhow::Context;
use clap::Args;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing::{info, instrument};

use crate::server::ShortbizServer;

use super::AppContext;

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {}

/// Serve MCP requests on stdin/stdout until the client disconnects.
///
/// Logs go to stderr and the log file; stdout belongs to the protocol.
#[instrument(name = "cmd_serve", skip_all)]
pub async fn cmd_serve(_args: ServeArgs, ctx: AppContext) -> anyhow::Result<()> {
    let server = ShortbizServer::from_config(&ctx.config, ctx.store);
    info!("MCP server listening on stdio");

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    let reason = service
        .waiting()
        .await
        .context("MCP server stopped unexpectedly")?;
    info!(?reason, "MCP server shut down");
    Ok(())
}

mod ado;
mod cli;
mod config;
mod error;
mod handlers;
mod logging;
mod model;
mod server;
mod services;
mod util;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use tracing::{error, info};

use cli::Cli;
use config::AdoConfig;
use handlers::Handlers;
use server::AdoMcpServer;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal; real environment variables still apply.
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if cli::is_informational(&e) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };
    let _log_guard = match logging::init(&cli.log_level, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Azure DevOps MCP server");

    let config = AdoConfig::load(&cli.config_path()).context("Configuration error")?;

    let mut handlers = Handlers::default();
    handlers
        .initialize(&config)
        .context("Failed to initialize handlers")?;

    if cli.skip_preload {
        info!("Skipping work item state preload");
    } else {
        handlers.states.preload_cache().await;
    }

    info!(project = %config.project, "Server initialized for project {}", config.project);

    let service = AdoMcpServer::new(Arc::new(handlers))
        .serve(stdio())
        .await
        .context("Failed to start MCP server")?;
    let reason = service.waiting().await?;
    info!(?reason, "MCP server stopped");
    Ok(())
}

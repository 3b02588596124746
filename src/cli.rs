use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;

use crate::config::default_config_path;

/// MCP server exposing Azure DevOps work items over stdio.
#[derive(Debug, Parser)]
#[command(name = "ado-mcp", version)]
pub struct Cli {
    /// Config file for values not set in the environment [default: ~/.ado-mcp/config.toml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level for this crate. `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Do not load the work item state catalog at startup
    #[arg(long)]
    pub skip_preload: bool,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }
}

/// `--help` and `--version` surface as parse errors but are not failures.
pub fn is_informational(err: &clap::Error) -> bool {
    matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}

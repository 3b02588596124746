use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(format!("ado_mcp={level}"))
        .with_context(|| format!("invalid log level '{level}'"))
}

/// Install the global subscriber. stdout belongs to the MCP transport, so the
/// console layer writes to stderr. The returned guard must outlive the server
/// or buffered file output is lost.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter(level)?,
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let name = path
                .file_name()
                .with_context(|| format!("log file path has no file name: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_targets_this_crate() {
        let filter = default_filter("debug").unwrap();
        assert_eq!(filter.to_string(), "ado_mcp=debug");
    }
}

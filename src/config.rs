use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable pairs: primary name first, fallback second.
pub const PAT_VARS: (&str, &str) = ("AZURE_DEVOPS_PAT", "ADO_PERSONAL_ACCESS_TOKEN");
pub const ORG_URL_VARS: (&str, &str) = ("AZURE_DEVOPS_ORG_URL", "ADO_ORGANIZATION_URL");
pub const PROJECT_VARS: (&str, &str) = ("AZURE_DEVOPS_PROJECT", "ADO_PROJECT_NAME");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing Azure DevOps configuration: {}", .missing.join(", "))]
    Missing { missing: Vec<String> },
    #[error("Failed to read config from {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Connection parameters for one Azure DevOps project.
#[derive(Clone, PartialEq, Eq)]
pub struct AdoConfig {
    pub pat: String,
    pub organization_url: String,
    pub project: String,
}

impl fmt::Debug for AdoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdoConfig")
            .field("pat", &"<redacted>")
            .field("organization_url", &self.organization_url)
            .field("project", &self.project)
            .finish()
    }
}

/// Optional on-disk source, consulted only for fields the environment leaves unset.
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub pat: Option<String>,
    pub organization_url: Option<String>,
    pub project: Option<String>,
}

pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ado-mcp")
        .join("config.toml")
}

pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl AdoConfig {
    /// Resolve from the process environment, then the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = load_file_config(path)?;
        Self::resolve(|name| std::env::var(name).ok(), &file)
    }

    pub fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        file: &FileConfig,
    ) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut field = |vars: (&str, &str), from_file: &Option<String>| {
            let value = first_present(&lookup, vars).or_else(|| non_empty(from_file.clone()));
            if value.is_none() {
                missing.push(format!("{} (or {})", vars.0, vars.1));
            }
            value.unwrap_or_default()
        };

        let pat = field(PAT_VARS, &file.pat);
        let organization_url = field(ORG_URL_VARS, &file.organization_url);
        let project = field(PROJECT_VARS, &file.project);

        if !missing.is_empty() {
            tracing::error!(missing = ?missing, "Azure DevOps configuration is missing");
            return Err(ConfigError::Missing { missing });
        }

        Ok(Self {
            pat,
            organization_url,
            project,
        })
    }
}

fn first_present(lookup: &impl Fn(&str) -> Option<String>, vars: (&str, &str)) -> Option<String> {
    non_empty(lookup(vars.0)).or_else(|| non_empty(lookup(vars.1)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

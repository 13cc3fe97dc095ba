use config::{ConfigError, Environment};
use serde::Deserialize;
use std::path::PathBuf;

const ENV_PREFIX: &str = "LMSD";
const DEFAULT_LOG_FILTER: &str = "lmsd=info";

/// Process-level settings, read from `LMSD_LOG` and `LMSD_WORKSPACE`.
/// Per-workspace settings live in the database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_log")]
    pub log: String,
    #[serde(default)]
    pub workspace: Option<PathBuf>,
}

fn default_log() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: default_log(),
            workspace: None,
        }
    }
}

pub fn load() -> Result<Config, ConfigError> {
    load_from(Environment::with_prefix(ENV_PREFIX))
}

fn load_from(env: Environment) -> Result<Config, ConfigError> {
    let cfg: Config = config::Config::builder()
        .add_source(env)
        .build()?
        .try_deserialize()?;
    Ok(cfg.with_fallbacks())
}

impl Config {
    /// Blank values count as unset.
    fn with_fallbacks(self) -> Self {
        Self {
            log: Some(self.log)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(default_log),
            workspace: self.workspace.filter(|p| !p.as_os_str().is_empty()),
        }
    }
}

//! Configuration management utilities

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable naming the application
pub const ENV_APP_NAME: &str = "ADK_APP_NAME";
/// Environment variable naming the deployment environment
pub const ENV_ENVIRONMENT: &str = "ADK_ENVIRONMENT";
/// Environment variable holding a tracing filter directive
pub const ENV_LOG_FILTER: &str = "ADK_LOG_FILTER";
/// Environment variable selecting `pretty` or `json` log output
pub const ENV_LOG_FORMAT: &str = "ADK_LOG_FORMAT";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-field lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => bail!("Unknown log format '{other}', expected 'pretty' or 'json'"),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Tracing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `adk_runtime=debug`
    pub filter: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Application name, used as the session namespace by runners
    pub app_name: String,
    /// Environment (dev, prod, etc.)
    pub environment: String,
    /// Tracing setup
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "adk-rs".to_string(),
            environment: "development".to_string(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Build a configuration from `ADK_*` environment variables
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(app_name) = lookup(ENV_APP_NAME) {
            if app_name.trim().is_empty() {
                bail!("{ENV_APP_NAME} must not be empty");
            }
            config.app_name = app_name;
        }
        if let Some(environment) = lookup(ENV_ENVIRONMENT) {
            config.environment = environment;
        }
        if let Some(filter) = lookup(ENV_LOG_FILTER) {
            config.log.filter = filter;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.log.format = format
                .parse()
                .with_context(|| format!("Invalid {ENV_LOG_FORMAT}"))?;
        }
        Ok(config)
    }

    /// Whether this is a production deployment
    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "prod" | "production")
    }
}

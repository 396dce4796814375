use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::app::ExecRequest;
use crate::error::PodExecError;
use crate::kubernetes::exec::DEFAULT_SHELL;
use crate::labels::LabelSelector;
use crate::selector::RetryPolicy;

/// Errors that can occur during config operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

/// Run a command on a randomly chosen running pod matching a label selector
#[derive(Parser, Debug)]
#[command(name = "pod-exec", version)]
pub struct Args {
    /// Namespace to look for pods in
    pub namespace: String,

    /// Pod label selector, comma separated key=value pairs
    pub labels: String,

    /// The container to run on
    pub container: String,

    /// Command to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Dry run only: select a pod and print the command without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Kubeconfig context (disables in-cluster credentials)
    #[arg(long, env = "POD_EXEC_CONTEXT")]
    pub context: Option<String>,

    /// Number of pod list attempts before giving up
    #[arg(long, env = "POD_EXEC_MAX_ATTEMPTS", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long, env = "POD_EXEC_ATTEMPT_INTERVAL")]
    pub attempt_interval: Option<u64>,

    /// Shell used to interpret the command inside the container
    #[arg(long, env = "POD_EXEC_SHELL")]
    pub shell: Option<String>,

    /// Settings file (defaults to <config dir>/pod-exec/config.json)
    #[arg(long, env = "POD_EXEC_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Load the settings file named by `--config`, or the default one
    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        match &self.config {
            Some(path) => Settings::load_from(path),
            None => Settings::load(),
        }
    }

    /// Validate the arguments and merge them over `settings`.
    ///
    /// The label selector is parsed here, before any cluster access.
    pub fn into_request(self, settings: Settings) -> Result<ExecRequest, PodExecError> {
        let selector = LabelSelector::parse(&self.labels)?;

        if self.namespace.is_empty() {
            return Err(PodExecError::MissingArgument("namespace"));
        }
        if self.container.is_empty() {
            return Err(PodExecError::MissingArgument("container"));
        }
        if self.command.is_empty() {
            return Err(PodExecError::MissingArgument("command"));
        }

        let retry = RetryPolicy::new(
            self.max_attempts.unwrap_or(settings.retry.max_attempts),
            self.attempt_interval
                .map(Duration::from_secs)
                .unwrap_or(settings.retry.interval),
        );

        Ok(ExecRequest {
            namespace: self.namespace,
            selector,
            container: self.container,
            command: self.command,
            dry_run: self.dry_run,
            retry,
            shell: self.shell.unwrap_or(settings.shell),
            context: self.context.or(settings.context),
        })
    }
}

/// Defaults read from the settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Pod selection retry budget
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Shell used to run the joined command
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Kubeconfig context to use instead of the current one
    #[serde(default)]
    pub context: Option<String>,
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            shell: default_shell(),
            context: None,
        }
    }
}

impl Settings {
    /// Get the configuration directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        Ok(dirs::config_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join("pod-exec"))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load settings from the default location
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Ok(path) => Self::load_from(&path),
            Err(ConfigError::ConfigDirNotFound) => {
                tracing::debug!("No config directory, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Load settings from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&contents)?;

        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(settings)
    }
}

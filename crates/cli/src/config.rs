use std::path::Path;

use anyhow::{Context, Result};
use chainrun_core::{split_words, PoolConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::args::Cli;

pub const CONFIG_FILE: &str = ".chainrun.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Consecutive lines per group
    pub chunk_size: usize,
    /// Lines are NUL-separated
    pub null_separated: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1,
            null_separated: false,
        }
    }
}

/// Settings read from the TOML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainrunConfig {
    pub pool: PoolConfig,
    pub input: InputConfig,
}

impl ChainrunConfig {
    /// Load `explicit` if given (it must exist), else `.chainrun.toml` in the
    /// current directory when present, else defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = std::env::current_dir()?.join(CONFIG_FILE);
                if !default_path.exists() {
                    debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
                default_path
            }
        };

        Self::read(&path).await
    }

    async fn read(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Apply command-line flags on top of the file settings.
    pub fn merge_cli(mut self, cli: &Cli) -> Result<Self> {
        let pool = &mut self.pool;

        if let Some(jobs) = cli.jobs {
            pool.jobs = jobs;
        }
        pool.deinterlace |= cli.deinterlace;
        pool.ordered |= cli.ordered;
        pool.halt_on_failure |= cli.halt_all;
        if cli.master.is_some() {
            pool.master_index = cli.master;
        }
        if let Some(signal) = cli.kill_signal {
            pool.kill_signal = signal;
        }
        if let Some(shell) = &cli.shell {
            pool.shell_prefix = if shell.trim().is_empty() {
                Vec::new()
            } else {
                split_words(shell).context("Invalid --shell value")?
            };
        }

        if let Some(chunk_size) = cli.chunk_size {
            self.input.chunk_size = chunk_size;
        }
        self.input.null_separated |= cli.null;

        Ok(self)
    }
}

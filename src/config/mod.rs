//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use cli::Cli;

/// Complete campaign configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub campaign: CampaignConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub net: NetConfig,
}

/// What the campaign runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Job list path, one shell command per line
    pub file: Option<PathBuf>,
    /// Setup command every worker runs before the first job
    pub prologue: Option<String>,
    /// Teardown command every worker runs after the last job
    pub epilogue: Option<String>,
}

/// Worker pool sizing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Worker count. Local mode defaults to the number of CPUs;
    /// coordinator mode has no default (the operator knows the cluster).
    pub workers: Option<usize>,
}

impl PoolConfig {
    /// Pool size for local mode, falling back to the CPU count.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }
}

/// Network settings for the TCP modes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConfig {
    /// Port the coordinator listens on for joining workers
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Coordinator address a worker joins, `host:port`
    pub connect: Option<String>,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self { listen_port: default_listen_port(), connect: None }
    }
}

pub(crate) fn default_listen_port() -> u16 {
    7070
}

impl Config {
    /// Build a configuration from CLI arguments alone.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            campaign: CampaignConfig {
                file: cli.file.clone(),
                prologue: cli.prologue.clone(),
                epilogue: cli.epilogue.clone(),
            },
            pool: PoolConfig { workers: cli.workers },
            net: NetConfig { listen_port: cli.listen_port, connect: cli.connect.clone() },
        }
    }
}

//! Configuration validation

use super::Config;
use crate::config::cli::ExecutionMode;
use anyhow::Result;

/// Validate the effective configuration for the selected mode.
///
/// Runs before anything is opened, bound, or spawned, so a bad invocation
/// dies with one diagnostic and no protocol traffic.
pub fn validate_config(config: &Config, mode: ExecutionMode) -> Result<()> {
    match mode {
        ExecutionMode::Local => {
            validate_campaign(config)?;
            validate_pool(config)?;
        }
        ExecutionMode::Coordinator => {
            validate_campaign(config)?;
            validate_pool(config)?;
            if config.pool.workers.is_none() {
                anyhow::bail!("coordinator mode requires a worker count (-w/--workers)");
            }
        }
        ExecutionMode::Worker => {
            if config.net.connect.is_none() {
                anyhow::bail!("worker mode requires a coordinator address (--connect host:port)");
            }
        }
    }
    Ok(())
}

fn validate_campaign(config: &Config) -> Result<()> {
    if config.campaign.file.is_none() {
        anyhow::bail!("must provide a campaign file (-f/--file)");
    }
    Ok(())
}

fn validate_pool(config: &Config) -> Result<()> {
    if config.pool.workers == Some(0) {
        anyhow::bail!("workers must be at least 1");
    }
    Ok(())
}

//! TOML configuration file parsing

use super::{default_listen_port, Config};
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse a TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from a string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config =
        ::toml::from_str(contents).context("failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments over a TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    if cli.file.is_some() {
        config.campaign.file = cli.file.clone();
    }
    if cli.prologue.is_some() {
        config.campaign.prologue = cli.prologue.clone();
    }
    if cli.epilogue.is_some() {
        config.campaign.epilogue = cli.epilogue.clone();
    }
    if cli.workers.is_some() {
        config.pool.workers = cli.workers;
    }
    if cli.connect.is_some() {
        config.net.connect = cli.connect.clone();
    }
    // The port flag always has a value; only a non-default one overrides.
    if cli.listen_port != default_listen_port() {
        config.net.listen_port = cli.listen_port;
    }

    config
}

/// Resolve the effective configuration for a parsed command line.
pub fn load(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Ok(merge_cli_with_config(cli, parse_toml_file(path)?)),
        None => Ok(Config::from_cli(cli)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    const EXAMPLE: &str = r#"
[campaign]
file = "jobs.txt"
prologue = "module load foo"
epilogue = "rm -rf scratch"

[pool]
workers = 8

[net]
listen_port = 9000
"#;

    #[test]
    fn full_document_parses() {
        let config = parse_toml_string(EXAMPLE).unwrap();
        assert_eq!(config.campaign.file, Some(PathBuf::from("jobs.txt")));
        assert_eq!(config.campaign.prologue.as_deref(), Some("module load foo"));
        assert_eq!(config.campaign.epilogue.as_deref(), Some("rm -rf scratch"));
        assert_eq!(config.pool.workers, Some(8));
        assert_eq!(config.net.listen_port, 9000);
    }

    #[test]
    fn empty_document_parses_to_defaults() {
        let config = parse_toml_string("").unwrap();
        assert!(config.campaign.file.is_none());
        assert_eq!(config.net.listen_port, 7070);
    }

    #[test]
    fn cli_wins_over_file_values() {
        let cli = Cli::parse_lenient(
            ["jobherd", "-f", "other.txt", "-w", "2"].map(String::from).to_vec(),
        );
        let config = merge_cli_with_config(&cli, parse_toml_string(EXAMPLE).unwrap());

        assert_eq!(config.campaign.file, Some(PathBuf::from("other.txt")));
        assert_eq!(config.pool.workers, Some(2));
        // Untouched flags keep the file's values.
        assert_eq!(config.campaign.prologue.as_deref(), Some("module load foo"));
        assert_eq!(config.net.listen_port, 9000);
    }

    #[test]
    fn loads_from_a_real_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{EXAMPLE}").unwrap();

        let cli = Cli::parse_lenient(
            ["jobherd", "-c", file.path().to_str().unwrap()].map(String::from).to_vec(),
        );
        let config = load(&cli).unwrap();
        assert_eq!(config.pool.workers, Some(8));
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(parse_toml_string("campaign = 12").is_err());
    }
}

//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Local mode (default) - coordinator and workers are threads of one
    /// process
    Local,
    /// Coordinator mode - rank 0 of a multi-host pool, listens for workers
    Coordinator,
    /// Worker mode - joins a listening coordinator
    Worker,
}

/// jobherd - dynamic master/worker dispatcher for shell job campaigns
#[derive(Parser, Debug)]
#[command(name = "jobherd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: local, coordinator, or worker
    #[arg(long, value_enum, default_value = "local")]
    pub mode: ExecutionMode,

    // === Campaign Options ===
    /// Job list file, one shell command per line
    ///
    /// Required in local and coordinator modes
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Command every worker runs once before the first job
    #[arg(short = 'p', long)]
    pub prologue: Option<String>,

    /// Command every worker runs once after the last job
    #[arg(short = 'e', long)]
    pub epilogue: Option<String>,

    // === Pool Options ===
    /// Worker count: pool threads in local mode (default: CPU count),
    /// remote workers to wait for in coordinator mode
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    // === Network Options ===
    /// Port to listen on for joining workers (coordinator mode)
    #[arg(long, default_value = "7070")]
    pub listen_port: u16,

    /// Coordinator address to join, host:port (worker mode)
    #[arg(long)]
    pub connect: Option<String>,

    // === Configuration File ===
    /// TOML configuration file; CLI flags take precedence
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parse the process arguments, reporting and skipping unknown flags
    /// instead of failing on them.
    pub fn parse_args() -> Self {
        Self::parse_lenient(std::env::args().collect())
    }

    /// Parse `argv`, dropping unknown arguments one at a time with a
    /// diagnostic. Any other parse error is fatal as usual.
    pub fn parse_lenient(mut argv: Vec<String>) -> Self {
        loop {
            match Self::try_parse_from(&argv) {
                Ok(cli) => return cli,
                Err(err) if err.kind() == clap::error::ErrorKind::UnknownArgument => {
                    let unknown = err
                        .context()
                        .find_map(|(kind, value)| {
                            (kind == clap::error::ContextKind::InvalidArg)
                                .then(|| value.to_string())
                        })
                        .and_then(|flag| {
                            argv.iter().position(|arg| {
                                *arg == flag || arg.starts_with(&format!("{flag}="))
                            })
                        });

                    match unknown {
                        Some(index) => {
                            eprintln!("unknown argument: {} (skipping)", argv[index]);
                            argv.remove(index);
                        }
                        // Could not locate the offender; fall back to the
                        // normal fatal path.
                        None => err.exit(),
                    }
                }
                Err(err) => err.exit(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("jobherd")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_lenient(args(&[]));
        assert_eq!(cli.mode, ExecutionMode::Local);
        assert!(cli.file.is_none());
        assert!(cli.prologue.is_none());
        assert!(cli.epilogue.is_none());
        assert!(cli.workers.is_none());
        assert_eq!(cli.listen_port, 7070);
    }

    #[test]
    fn short_and_long_campaign_flags() {
        let cli = Cli::parse_lenient(args(&["-f", "jobs.txt", "-p", "setup", "-e", "cleanup"]));
        assert_eq!(cli.file.as_deref(), Some(std::path::Path::new("jobs.txt")));
        assert_eq!(cli.prologue.as_deref(), Some("setup"));
        assert_eq!(cli.epilogue.as_deref(), Some("cleanup"));

        let cli = Cli::parse_lenient(args(&["--file", "jobs.txt", "--prologue", "setup"]));
        assert_eq!(cli.file.as_deref(), Some(std::path::Path::new("jobs.txt")));
        assert_eq!(cli.prologue.as_deref(), Some("setup"));
    }

    #[test]
    fn mode_selection() {
        let cli = Cli::parse_lenient(args(&["--mode", "coordinator", "-w", "4"]));
        assert_eq!(cli.mode, ExecutionMode::Coordinator);
        assert_eq!(cli.workers, Some(4));

        let cli = Cli::parse_lenient(args(&["--mode", "worker", "--connect", "node0:7070"]));
        assert_eq!(cli.mode, ExecutionMode::Worker);
        assert_eq!(cli.connect.as_deref(), Some("node0:7070"));
    }

    #[test]
    fn unknown_flags_are_skipped_not_fatal() {
        let cli = Cli::parse_lenient(args(&["--bogus", "-f", "jobs.txt"]));
        assert_eq!(cli.file.as_deref(), Some(std::path::Path::new("jobs.txt")));

        let cli = Cli::parse_lenient(args(&["-f", "jobs.txt", "--nonsense=7"]));
        assert_eq!(cli.file.as_deref(), Some(std::path::Path::new("jobs.txt")));
    }
}

//! Command execution
//!
//! Workers run job text through the [`CommandRunner`] trait rather than
//! calling the shell directly, so the dispatch protocol can be exercised
//! with a recording mock (see [`mock::MockRunner`]).

pub mod mock;

use std::process::Command;

use anyhow::{Context, Result};

/// Launches one command and waits for it
///
/// A nonzero exit status is not an error: the campaign keeps going and the
/// status is only reported. `run` fails only when the command cannot be
/// launched at all, which is fatal to the worker that tried.
pub trait CommandRunner: Send + Sync {
    /// Run `command`, blocking until it finishes. Returns its exit code.
    fn run(&self, command: &str) -> Result<i32>;
}

/// Runs commands through `/bin/sh -c`, like `system(3)`.
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self { shell: "/bin/sh".to_string() }
    }

    /// Use a different shell binary.
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<i32> {
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .status()
            .with_context(|| format!("failed to launch {} -c '{}'", self.shell, command))?;

        // A signal death has no code; fold it into the generic failure
        // value since exit codes never drive control flow anyway.
        Ok(status.code().unwrap_or(-1))
    }
}

//! Mock command runner for testing
//!
//! Records every command it is asked to run instead of launching anything,
//! making campaign tests fast and deterministic. Can be configured to
//! simulate a launch failure or a nonzero exit code.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::CommandRunner;

/// Recording runner for tests
///
/// Clones share the same command log, so a test can keep one handle and
/// hand another to a worker thread.
#[derive(Clone)]
pub struct MockRunner {
    /// Every command passed to `run`, in call order.
    commands: Arc<Mutex<Vec<String>>>,

    /// When set, `run` fails as if the command could not be launched.
    fail_launch: Arc<Mutex<bool>>,

    /// Exit code reported for successful launches.
    exit_code: Arc<Mutex<i32>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            commands: Arc::new(Mutex::new(Vec::new())),
            fail_launch: Arc::new(Mutex::new(false)),
            exit_code: Arc::new(Mutex::new(0)),
        }
    }

    /// Make subsequent `run` calls fail at launch.
    pub fn fail_launches(&self) {
        *self.fail_launch.lock().unwrap() = true;
    }

    /// Report `code` as the exit status of subsequent commands.
    pub fn set_exit_code(&self, code: i32) {
        *self.exit_code.lock().unwrap() = code;
    }

    /// Commands run so far, in call order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Number of commands run so far.
    pub fn run_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, command: &str) -> Result<i32> {
        if *self.fail_launch.lock().unwrap() {
            anyhow::bail!("mock launch failure for '{command}'");
        }
        self.commands.lock().unwrap().push(command.to_string());
        Ok(*self.exit_code.lock().unwrap())
    }
}

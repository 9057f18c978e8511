//! jobherd - dynamic master/worker dispatcher for shell job campaigns
//!
//! jobherd streams a line-oriented list of shell commands to a fixed pool of
//! workers. Rank 0 coordinates; every other rank executes one command at a
//! time and reports idle between commands, so fast workers naturally pull
//! more of the list than slow ones.
//!
//! # Architecture
//!
//! - **Rank-addressed transport**: blocking send/receive with a wildcard
//!   receive, in-process (channels) or across hosts (TCP)
//! - **Coordinator dispatcher**: hands each job line to whichever worker
//!   reports idle next, then runs the rank-ordered shutdown sequence
//! - **Worker state machine**: idle/executing loop with an optional prologue
//!   phase and an epilogue-or-halt terminal transition
//! - **Pluggable command execution**: shell by default, recordable mock for
//!   tests

pub mod campaign;
pub mod config;
pub mod exec;
pub mod protocol;
pub mod transport;
pub mod util;

// Re-export commonly used types
pub use campaign::{Coordinator, JobSource, Worker};
pub use config::Config;
pub use transport::Transport;

/// Result type used throughout jobherd
pub type Result<T> = anyhow::Result<T>;

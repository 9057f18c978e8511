//! Operator-facing diagnostics
//!
//! Both sides of a campaign narrate on stderr with a role/rank prefix so
//! interleaved output from a whole pool stays readable. The coordinator is
//! always red; each worker gets a stable color keyed by its rank. Output is
//! plain lines, nothing machine-parseable.

use crate::transport::Rank;

/// ANSI prefix for coordinator messages.
pub fn coordinator_prefix() -> String {
    "\x1b[31m[coordinator]\x1b[39m".to_string()
}

/// ANSI prefix for a worker's messages, colored by rank.
pub fn worker_prefix(rank: Rank) -> String {
    format!("\x1b[{}m[worker {}]\x1b[39m", 31 + rank % 5, rank)
}

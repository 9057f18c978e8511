//! Campaign orchestration
//!
//! A campaign runs in up to three phases, sequenced by the coordinator and
//! mirrored by each worker's local phase awareness:
//!
//! 1. **Prologue** (optional): the coordinator walks workers in ascending
//!    rank order and hands each one the setup command. Nothing is exchanged
//!    when no prologue is configured.
//! 2. **Main dispatch**: job lines stream to whichever worker reports idle
//!    first. Workers of unequal speed balance themselves; there is no
//!    static partitioning.
//! 3. **Shutdown**: one terminal status per worker, ascending rank order -
//!    "run the epilogue then stop" or "stop now".

pub mod coordinator;
pub mod jobs;
pub mod worker;

pub use coordinator::Coordinator;
pub use jobs::JobSource;
pub use worker::Worker;

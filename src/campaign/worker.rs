//! Worker state machine
//!
//! Every rank other than 0 runs this loop: report idle, wait for an
//! instruction, execute or terminate. The loop is iterative over an
//! explicit state value, so arbitrarily long campaigns cost no stack.
//!
//! A worker runs exactly one command at a time and does nothing else while
//! it runs. Exit codes are reported but never inspected for control flow; a
//! command that cannot be launched at all kills the worker.

use anyhow::{Context, Result};

use crate::exec::CommandRunner;
use crate::protocol::{
    encode_i32, framer, recv_status, DispatchStatus, DISPATCH_TAG, PROLOGUE_TAG, READY_TAG,
};
use crate::transport::Transport;
use crate::util::diag;

/// Where a worker is in its lifecycle.
#[derive(Debug)]
enum WorkerState {
    /// Reported idle, waiting for an instruction.
    Idle,
    /// Running a job command.
    Executing(String),
    /// Running the epilogue command; next stop is `Done`.
    RunningEpilogue(String),
    /// Terminal. Exactly one terminal instruction ever arrives.
    Done,
}

/// One worker participant.
pub struct Worker<'a> {
    transport: &'a dyn Transport,
    runner: &'a dyn CommandRunner,
}

impl<'a> Worker<'a> {
    pub fn new(transport: &'a dyn Transport, runner: &'a dyn CommandRunner) -> Self {
        Self { transport, runner }
    }

    /// Run until the coordinator sends a terminal instruction.
    ///
    /// `prologue_configured` must match the coordinator's configuration:
    /// when set, one prologue exchange precedes the first idle report.
    pub fn run(&self, prologue_configured: bool) -> Result<()> {
        let rank = self.transport.rank();

        if prologue_configured {
            self.execute_prologue()?;
        }

        let mut state = WorkerState::Idle;
        loop {
            state = match state {
                WorkerState::Idle => {
                    self.report_idle()?;
                    self.await_instruction()?
                }
                WorkerState::Executing(command) => {
                    eprintln!("{} executing job", diag::worker_prefix(rank));
                    let code = self
                        .runner
                        .run(&command)
                        .with_context(|| format!("worker {rank} could not launch job"))?;
                    if code != 0 {
                        eprintln!(
                            "{} job exited with status {} (continuing)",
                            diag::worker_prefix(rank),
                            code
                        );
                    }
                    WorkerState::Idle
                }
                WorkerState::RunningEpilogue(command) => {
                    eprintln!("{} executing epilogue", diag::worker_prefix(rank));
                    self.runner
                        .run(&command)
                        .with_context(|| format!("worker {rank} could not launch epilogue"))?;
                    WorkerState::Done
                }
                WorkerState::Done => break,
            };
        }

        eprintln!("{} going home", diag::worker_prefix(rank));
        Ok(())
    }

    /// One prologue exchange, strictly before the first idle report.
    fn execute_prologue(&self) -> Result<()> {
        let rank = self.transport.rank();

        let status = recv_status(self.transport, 0, PROLOGUE_TAG)?;
        if status != DispatchStatus::Run {
            anyhow::bail!("prologue carried status {:?} instead of Run", status);
        }

        let command = framer::recv_string(self.transport, 0, PROLOGUE_TAG)?;
        eprintln!("{} executing prologue", diag::worker_prefix(rank));
        self.runner
            .run(&command)
            .with_context(|| format!("worker {rank} could not launch prologue"))?;
        Ok(())
    }

    /// Tell the coordinator this worker wants work. Payload is the
    /// worker's own rank.
    fn report_idle(&self) -> Result<()> {
        let rank = self.transport.rank();
        eprintln!("{} telling the coordinator i am free", diag::worker_prefix(rank));
        self.transport.send(&encode_i32(rank as i32), 0, READY_TAG)?;
        Ok(())
    }

    /// Receive one status/command pair and pick the next state.
    fn await_instruction(&self) -> Result<WorkerState> {
        match recv_status(self.transport, 0, DISPATCH_TAG)? {
            DispatchStatus::Run => {
                let command = framer::recv_string(self.transport, 0, DISPATCH_TAG)?;
                Ok(WorkerState::Executing(command))
            }
            DispatchStatus::Epilogue => {
                let command = framer::recv_string(self.transport, 0, DISPATCH_TAG)?;
                Ok(WorkerState::RunningEpilogue(command))
            }
            DispatchStatus::Halt => Ok(WorkerState::Done),
        }
    }
}

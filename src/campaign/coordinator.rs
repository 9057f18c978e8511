//! Coordinator dispatcher
//!
//! Rank 0 owns the job source, the phase sequence, and the termination
//! protocol; it is the only participant that decides who runs what next.
//! One blocking loop: wait for any worker's idle report, hand it the next
//! job line, repeat until the source is exhausted, then walk the shutdown
//! sequence.
//!
//! The shutdown sequence is strictly sequential by rank, not by readiness:
//! each terminal send blocks until that worker listens, so a worker still
//! chewing on its last job delays the terminal message of every
//! later-ranked worker. That ordering is part of the protocol's contract;
//! keep it.

use std::io::BufRead;

use anyhow::{Context, Result};

use super::jobs::JobSource;
use crate::protocol::{
    decode_i32, framer, send_status, DispatchStatus, DISPATCH_TAG, PROLOGUE_TAG, READY_TAG,
};
use crate::transport::{Rank, Source, Transport};
use crate::util::diag;

/// Campaign coordinator, one per pool, always rank 0.
pub struct Coordinator<'a> {
    transport: &'a dyn Transport,
    prologue: Option<String>,
    epilogue: Option<String>,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        prologue: Option<String>,
        epilogue: Option<String>,
    ) -> Self {
        Self { transport, prologue, epilogue }
    }

    /// Run the whole campaign: prologue broadcast, dispatch loop, shutdown
    /// sequence. Returns the number of jobs dispatched.
    pub fn run<R: BufRead>(&self, jobs: &mut JobSource<R>) -> Result<usize> {
        if let Some(prologue) = self.prologue.clone() {
            self.broadcast_prologue(&prologue)?;
        }

        let dispatched = self.dispatch_all(jobs)?;
        self.shutdown().context("shutdown sequence failed")?;

        eprintln!(
            "{} campaign complete: {} jobs across {} workers",
            diag::coordinator_prefix(),
            dispatched,
            self.transport.size() - 1
        );
        Ok(dispatched)
    }

    /// Send the prologue to every worker, in ascending rank order, before
    /// the first job is dispatched.
    fn broadcast_prologue(&self, command: &str) -> Result<()> {
        for rank in 1..self.transport.size() {
            eprintln!("{} sending prologue to worker {}", diag::coordinator_prefix(), rank);
            send_status(self.transport, DispatchStatus::Run, rank, PROLOGUE_TAG)?;
            framer::send_string(self.transport, command, rank, PROLOGUE_TAG)?;
        }
        Ok(())
    }

    /// Stream job lines to whichever worker reports idle next.
    fn dispatch_all<R: BufRead>(&self, jobs: &mut JobSource<R>) -> Result<usize> {
        let mut dispatched = 0;

        loop {
            let idle = self.await_idle()?;

            let command = match jobs.next_job()? {
                Some(command) => command,
                None => break,
            };

            eprintln!(
                "{} running on worker {} ('{}')",
                diag::coordinator_prefix(),
                idle,
                command
            );
            send_status(self.transport, DispatchStatus::Run, idle, DISPATCH_TAG)?;
            framer::send_string(self.transport, &command, idle, DISPATCH_TAG)?;
            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// Block until any worker reports idle; returns its rank.
    ///
    /// The rank comes from the message payload. An out-of-range value can
    /// only mean a broken participant, so it aborts the coordinator.
    fn await_idle(&self) -> Result<Rank> {
        let delivery = self.transport.recv(Source::Any, READY_TAG)?;
        let reported = decode_i32(&delivery.payload)?;

        if reported < 1 || reported as usize >= self.transport.size() {
            anyhow::bail!(
                "idle report carries out-of-range rank {} (from rank {})",
                reported,
                delivery.source
            );
        }
        Ok(reported as Rank)
    }

    /// Tell every worker, in ascending rank order, that the campaign is
    /// over. Exactly one terminal status per worker.
    fn shutdown(&self) -> Result<()> {
        let status = if self.epilogue.is_some() {
            DispatchStatus::Epilogue
        } else {
            DispatchStatus::Halt
        };

        for rank in 1..self.transport.size() {
            eprintln!(
                "{} telling worker {} the campaign is over",
                diag::coordinator_prefix(),
                rank
            );
            send_status(self.transport, status, rank, DISPATCH_TAG)?;
            if let Some(epilogue) = &self.epilogue {
                framer::send_string(self.transport, epilogue, rank, DISPATCH_TAG)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_i32, recv_status};
    use crate::transport::channel::ChannelTransport;
    use std::io::Cursor;
    use std::thread;
    use std::time::{Duration, Instant};

    fn source(lines: &str) -> JobSource<Cursor<String>> {
        JobSource::from_reader(Cursor::new(lines.to_string()))
    }

    #[test]
    fn out_of_range_idle_report_aborts() {
        let mut group = ChannelTransport::group(2);
        let worker = group.remove(1);
        let coordinator_transport = group.remove(0);

        let rogue = thread::spawn(move || {
            // A payload claiming rank 7 in a pool of 2.
            worker.send(&encode_i32(7), 0, READY_TAG).unwrap();
        });

        let coordinator = Coordinator::new(&coordinator_transport, None, None);
        let err = coordinator.run(&mut source("echo a\n")).unwrap_err();
        assert!(err.to_string().contains("out-of-range"));
        rogue.join().unwrap();
    }

    #[test]
    fn coordinator_rank_zero_is_never_a_worker() {
        let mut group = ChannelTransport::group(2);
        let worker = group.remove(1);
        let coordinator_transport = group.remove(0);

        let rogue = thread::spawn(move || {
            worker.send(&encode_i32(0), 0, READY_TAG).unwrap();
        });

        let coordinator = Coordinator::new(&coordinator_transport, None, None);
        assert!(coordinator.run(&mut source("echo a\n")).is_err());
        rogue.join().unwrap();
    }

    #[test]
    fn shutdown_walks_ranks_in_ascending_order() {
        // Worker 1 stalls before listening for its terminal status. The
        // terminal send to worker 2 cannot start until worker 1 has
        // consumed its own, so worker 2 observes at least the stall.
        let mut group = ChannelTransport::group(3);
        let w2 = group.remove(2);
        let w1 = group.remove(1);
        let coordinator_transport = group.remove(0);

        let stall = Duration::from_millis(100);
        let start = Instant::now();

        thread::scope(|s| {
            s.spawn(|| {
                w1.send(&encode_i32(1), 0, READY_TAG).unwrap();
                thread::sleep(stall);
                let status = recv_status(&w1, 0, DISPATCH_TAG).unwrap();
                assert_eq!(status, DispatchStatus::Halt);
            });

            s.spawn(|| {
                w2.send(&encode_i32(2), 0, READY_TAG).unwrap();
                let status = recv_status(&w2, 0, DISPATCH_TAG).unwrap();
                assert_eq!(status, DispatchStatus::Halt);
                assert!(
                    start.elapsed() >= stall,
                    "worker 2 finished shutdown before worker 1 was listening"
                );
            });

            let coordinator = Coordinator::new(&coordinator_transport, None, None);
            coordinator.run(&mut source("")).unwrap();
        });
    }

    #[test]
    fn empty_campaign_sends_no_assignments() {
        let mut group = ChannelTransport::group(2);
        let worker = group.remove(1);
        let coordinator_transport = group.remove(0);

        thread::scope(|s| {
            s.spawn(|| {
                worker.send(&encode_i32(1), 0, READY_TAG).unwrap();
                // The very next message is terminal.
                let status = recv_status(&worker, 0, DISPATCH_TAG).unwrap();
                assert_eq!(status, DispatchStatus::Halt);
            });

            let coordinator = Coordinator::new(&coordinator_transport, None, None);
            let dispatched = coordinator.run(&mut source("")).unwrap();
            assert_eq!(dispatched, 0);
        });
    }
}

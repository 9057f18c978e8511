//! Rank-addressed message transport
//!
//! Everything the dispatch protocol knows about the outside world goes
//! through the [`Transport`] trait: a fixed group of participants numbered
//! `0..size`, blocking point-to-point send/receive, and a wildcard receive
//! that admits whichever sender arrives first.
//!
//! # Blocking contract
//!
//! A send addressed to any rank other than 0 completes only when the
//! addressed participant's matching receive consumes the message
//! (rendezvous). Sends addressed to rank 0 carry only idle reports and
//! complete as soon as the destination's single-slot mailbox for the sender
//! is free; without that slot a worker's final idle report, which the
//! coordinator never receives, would wedge the whole group at shutdown.
//!
//! Messages between one ordered pair of participants are delivered in send
//! order. Tags are verified on delivery, not used for selection: the
//! protocol strictly alternates exchanges on every pair, so a mismatch can
//! only mean a protocol bug and is surfaced as an error.

pub mod channel;
pub mod tcp;

use thiserror::Error;

/// Participant identity within the group, `0..size`. Rank 0 coordinates.
pub type Rank = usize;

/// Small integer message tag, MPI style.
pub type Tag = i32;

/// Receive addressing: a specific sender, or whoever sends first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Match a message from any participant.
    Any,
    /// Match a message from this rank only.
    Rank(Rank),
}

/// A received message together with the rank that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub source: Rank,
}

/// Transport-level failures
///
/// Everything above the transport treats these as fatal; the dispatch
/// protocol has no retry or recovery path.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("rank {0} is not a member of this group")]
    InvalidRank(Rank),

    #[error("peer {0} disconnected")]
    Disconnected(Rank),

    #[error("tag mismatch from rank {from}: expected {expected}, got {got}")]
    TagMismatch { from: Rank, expected: Tag, got: Tag },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Blocking rank-addressed messaging within a fixed participant group
///
/// Implementations supply the participant's own rank and the group size at
/// construction time; protocol code never consults ambient global state for
/// either.
pub trait Transport: Send + Sync {
    /// This participant's rank, `0..size`.
    fn rank(&self) -> Rank;

    /// Total number of participants, coordinator included.
    fn size(&self) -> usize;

    /// Send `payload` to `dest` on `tag`. Blocks per the module-level
    /// contract.
    fn send(&self, payload: &[u8], dest: Rank, tag: Tag) -> Result<(), TransportError>;

    /// Receive the next message matching `source`, verifying its tag.
    fn recv(&self, source: Source, tag: Tag) -> Result<Delivery, TransportError>;
}

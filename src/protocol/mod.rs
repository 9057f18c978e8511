//! Dispatch protocol: tags, status codes, integer payloads
//!
//! Three message kinds share the transport, told apart by tag:
//!
//! ```text
//! Worker                          Coordinator
//!   |-------- READY (42) ----------->|   payload = own rank
//!   |<------- ASSIGNMENT (99) -------|   status, then framed command
//!   |<------- PROLOGUE (41) ---------|   status, then framed command
//! ```
//!
//! Prologue and main-phase exchanges share a wire shape; the dedicated
//! prologue tag is what lets a worker tell "setup command" from "first
//! job". Integers travel as 4-byte little-endian two's-complement.

pub mod framer;

use anyhow::Result;

use crate::transport::{Rank, Source, Tag, Transport};

/// Worker -> coordinator: "I am idle", payload = the worker's own rank.
pub const READY_TAG: Tag = 42;

/// Coordinator -> worker: status and command exchange of the main phase.
pub const DISPATCH_TAG: Tag = 99;

/// Coordinator -> worker: status and command exchange of the prologue phase.
pub const PROLOGUE_TAG: Tag = 41;

/// Control word carried at the head of every assignment or prologue exchange
///
/// Exactly one of the two terminal words is ever sent to a given worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// A command follows; run it and report idle again.
    Run,
    /// The epilogue command follows; run it, then stop.
    Epilogue,
    /// Stop immediately; nothing follows.
    Halt,
}

impl DispatchStatus {
    /// Wire encoding of the status word.
    pub fn code(self) -> i32 {
        match self {
            DispatchStatus::Run => 0,
            DispatchStatus::Epilogue => -1,
            DispatchStatus::Halt => -2,
        }
    }

    /// Decode a status word. Anything unrecognized is a protocol fault.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(DispatchStatus::Run),
            -1 => Ok(DispatchStatus::Epilogue),
            -2 => Ok(DispatchStatus::Halt),
            other => anyhow::bail!("unrecognized dispatch status {other}"),
        }
    }
}

/// Encode an integer payload.
pub fn encode_i32(value: i32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Decode an integer payload, rejecting anything that is not 4 bytes.
pub fn decode_i32(payload: &[u8]) -> Result<i32> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| anyhow::anyhow!("integer payload has {} bytes, expected 4", payload.len()))?;
    Ok(i32::from_le_bytes(bytes))
}

/// Send a status word to `dest` on `tag`.
pub fn send_status(
    transport: &dyn Transport,
    status: DispatchStatus,
    dest: Rank,
    tag: Tag,
) -> Result<()> {
    transport.send(&encode_i32(status.code()), dest, tag)?;
    Ok(())
}

/// Receive and decode a status word from `src` on `tag`.
pub fn recv_status(transport: &dyn Transport, src: Rank, tag: Tag) -> Result<DispatchStatus> {
    let delivery = transport.recv(Source::Rank(src), tag)?;
    DispatchStatus::from_code(decode_i32(&delivery.payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for status in [DispatchStatus::Run, DispatchStatus::Epilogue, DispatchStatus::Halt] {
            assert_eq!(DispatchStatus::from_code(status.code()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(DispatchStatus::from_code(-3).is_err());
        assert!(DispatchStatus::from_code(1).is_err());
    }

    #[test]
    fn integers_round_trip_including_negatives() {
        for value in [0, 1, -1, -2, i32::MAX, i32::MIN] {
            assert_eq!(decode_i32(&encode_i32(value)).unwrap(), value);
        }
    }

    #[test]
    fn short_integer_payload_is_rejected() {
        assert!(decode_i32(&[1, 2]).is_err());
        assert!(decode_i32(&[]).is_err());
    }
}

//! Variable-length string framing
//!
//! A string crosses the transport as exactly two messages on the same tag:
//! the byte length as an integer, then the raw bytes. The receiver always
//! reads the length before the bytes. The pair is not atomic at the
//! transport level; it never interleaves with another exchange because the
//! protocol keeps at most one pending send per ordered pair of
//! participants.

use anyhow::{Context, Result};

use super::{decode_i32, encode_i32};
use crate::transport::{Rank, Source, Tag, Transport};

/// Send `text` to `dest` as a length message followed by a bytes message.
pub fn send_string(transport: &dyn Transport, text: &str, dest: Rank, tag: Tag) -> Result<()> {
    let bytes = text.as_bytes();
    transport
        .send(&encode_i32(bytes.len() as i32), dest, tag)
        .context("failed to send string length")?;
    transport.send(bytes, dest, tag).context("failed to send string bytes")?;
    Ok(())
}

/// Receive a string from `src`: the announced length, then the bytes.
pub fn recv_string(transport: &dyn Transport, src: Rank, tag: Tag) -> Result<String> {
    let length = transport.recv(Source::Rank(src), tag).context("failed to receive string length")?;
    let announced = decode_i32(&length.payload)?;
    if announced < 0 {
        anyhow::bail!("negative string length {announced} from rank {src}");
    }

    let bytes = transport.recv(Source::Rank(src), tag).context("failed to receive string bytes")?;
    if bytes.payload.len() != announced as usize {
        anyhow::bail!(
            "string length mismatch from rank {src}: announced {announced}, received {}",
            bytes.payload.len()
        );
    }

    String::from_utf8(bytes.payload).context("string payload is not valid UTF-8")
}

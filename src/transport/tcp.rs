//! TCP transport for multi-host pools
//!
//! The coordinator listens and assigns ranks in connection order; each
//! worker connects, introduces itself with a version-checked `Join` frame,
//! and learns its rank and the pool size from the `Welcome` reply. The
//! handshake also tells the worker whether a prologue phase will run, the
//! same way a launcher ships one command line to every rank.
//!
//! # Wire format
//!
//! Every frame is MessagePack preceded by a 4-byte little-endian length:
//!
//! ```text
//! [4 bytes: frame length][N bytes: MessagePack frame]
//! ```
//!
//! # Rendezvous over buffered sockets
//!
//! TCP buffers writes, so the blocking contract is rebuilt with
//! acknowledgement frames. A send returns only once the matching `Ack`
//! arrives. A worker acknowledges a command when its `recv` call consumes
//! it, so the coordinator's send still blocks until that worker is
//! listening; the coordinator acknowledges idle reports on arrival, which
//! is the single-slot mailbox the shutdown sequence depends on.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam::channel::{bounded, Receiver, Select, Sender};
use serde::{Deserialize, Serialize};

use super::{Delivery, Rank, Source, Tag, Transport, TransportError};
use crate::util::diag;

/// Wire version carried in the `Join` frame
///
/// Increment on breaking changes; coordinator and workers must match.
pub const WIRE_VERSION: u32 = 1;

/// Frames larger than this are rejected as corrupt.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Everything that crosses a socket.
#[derive(Debug, Serialize, Deserialize)]
enum Frame {
    /// Worker -> coordinator, first frame on a fresh connection.
    Join { version: u32, hostname: String },
    /// Coordinator -> worker, handshake reply.
    Welcome { rank: u32, size: u32, prologue_configured: bool },
    /// One transport message.
    Data { tag: Tag, payload: Vec<u8> },
    /// Delivery acknowledgement for the peer's oldest unacked `Data`.
    Ack,
}

/// One message routed off a peer's socket by its reader thread.
struct Envelope {
    tag: Tag,
    payload: Vec<u8>,
}

struct Peer {
    writer: Arc<Mutex<TcpStream>>,
    data_rx: Receiver<Envelope>,
    ack_rx: Receiver<()>,
}

/// Transport endpoint over TCP
///
/// Construct with [`TcpTransport::listen`] (coordinator) or
/// [`TcpTransport::connect`] (worker).
pub struct TcpTransport {
    rank: Rank,
    size: usize,
    /// Peers indexed by rank. The coordinator holds one per worker; a
    /// worker holds only rank 0.
    peers: Vec<Option<Peer>>,
}

impl TcpTransport {
    /// Bind `addr` and wait for `workers` remote workers to join.
    ///
    /// Returns the coordinator endpoint (rank 0 of a pool of
    /// `workers + 1`). Blocks until every worker has completed the
    /// handshake.
    pub fn listen<A: ToSocketAddrs>(
        addr: A,
        workers: usize,
        prologue_configured: bool,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)?;
        Self::listen_on(listener, workers, prologue_configured)
    }

    /// Like [`listen`](Self::listen), but over an already-bound listener.
    pub fn listen_on(
        listener: TcpListener,
        workers: usize,
        prologue_configured: bool,
    ) -> Result<Self, TransportError> {
        let size = workers + 1;
        let mut peers: Vec<Option<Peer>> = (0..size).map(|_| None).collect();

        for rank in 1..size {
            let (mut stream, peer_addr) = listener.accept()?;

            let hostname = match read_frame(&mut stream)? {
                Frame::Join { version, hostname } => {
                    if version != WIRE_VERSION {
                        return Err(TransportError::Handshake(format!(
                            "wire version mismatch from {peer_addr}: coordinator={WIRE_VERSION}, worker={version}"
                        )));
                    }
                    hostname
                }
                other => {
                    return Err(TransportError::Handshake(format!(
                        "expected Join from {peer_addr}, got {other:?}"
                    )));
                }
            };

            write_frame(
                &mut stream,
                &Frame::Welcome {
                    rank: rank as u32,
                    size: size as u32,
                    prologue_configured,
                },
            )?;

            eprintln!(
                "{} worker {} joined from {} ({})",
                diag::coordinator_prefix(),
                rank,
                hostname,
                peer_addr
            );

            peers[rank] = Some(spawn_peer(stream, AckPolicy::OnArrival)?);
        }

        Ok(Self { rank: 0, size, peers })
    }

    /// Connect to a listening coordinator and complete the handshake.
    ///
    /// Returns the worker endpoint plus whether a prologue phase will run.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<(Self, bool), TransportError> {
        let mut stream = TcpStream::connect(addr)?;

        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        write_frame(&mut stream, &Frame::Join { version: WIRE_VERSION, hostname: host })?;

        let (rank, size, prologue_configured) = match read_frame(&mut stream)? {
            Frame::Welcome { rank, size, prologue_configured } => {
                (rank as Rank, size as usize, prologue_configured)
            }
            other => {
                return Err(TransportError::Handshake(format!("expected Welcome, got {other:?}")));
            }
        };

        let mut peers: Vec<Option<Peer>> = (0..size).map(|_| None).collect();
        peers[0] = Some(spawn_peer(stream, AckPolicy::OnConsumption)?);

        Ok((Self { rank, size, peers }, prologue_configured))
    }

    fn peer(&self, rank: Rank) -> Result<&Peer, TransportError> {
        self.peers
            .get(rank)
            .and_then(|p| p.as_ref())
            .ok_or(TransportError::InvalidRank(rank))
    }

    /// Pop the next envelope from `src`, verify the tag, and acknowledge
    /// consumption when this side owes the ack.
    fn deliver(&self, env: Envelope, src: Rank, tag: Tag) -> Result<Delivery, TransportError> {
        if self.rank != 0 {
            let peer = self.peer(src)?;
            let mut writer = peer.writer.lock().expect("peer writer poisoned");
            write_frame(&mut writer, &Frame::Ack)?;
        }
        if env.tag != tag {
            return Err(TransportError::TagMismatch { from: src, expected: tag, got: env.tag });
        }
        Ok(Delivery { payload: env.payload, source: src })
    }
}

impl Transport for TcpTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, payload: &[u8], dest: Rank, tag: Tag) -> Result<(), TransportError> {
        if dest == self.rank {
            return Err(TransportError::InvalidRank(dest));
        }
        let peer = self.peer(dest)?;

        {
            let mut writer = peer.writer.lock().expect("peer writer poisoned");
            write_frame(&mut writer, &Frame::Data { tag, payload: payload.to_vec() })?;
        }

        // Block until the peer's side acknowledges delivery.
        peer.ack_rx.recv().map_err(|_| TransportError::Disconnected(dest))
    }

    fn recv(&self, source: Source, tag: Tag) -> Result<Delivery, TransportError> {
        match source {
            Source::Rank(src) => {
                let peer = self.peer(src)?;
                let env =
                    peer.data_rx.recv().map_err(|_| TransportError::Disconnected(src))?;
                self.deliver(env, src, tag)
            }
            Source::Any => {
                let live: Vec<(Rank, &Receiver<Envelope>)> = self
                    .peers
                    .iter()
                    .enumerate()
                    .filter_map(|(rank, p)| p.as_ref().map(|p| (rank, &p.data_rx)))
                    .collect();

                let mut select = Select::new();
                for (_, rx) in &live {
                    select.recv(rx);
                }

                let oper = select.select();
                let index = oper.index();
                let (src, rx) = live[index];
                let env = oper.recv(rx).map_err(|_| TransportError::Disconnected(src))?;
                self.deliver(env, src, tag)
            }
        }
    }
}

/// Who writes the `Ack` for an incoming `Data` frame.
#[derive(Clone, Copy, PartialEq)]
enum AckPolicy {
    /// Reader thread acks as soon as the frame is buffered (idle-report
    /// mailbox on the coordinator side).
    OnArrival,
    /// The `recv` call acks after consuming the message, keeping the
    /// remote send blocked until this participant actually listens.
    OnConsumption,
}

/// Start the reader thread for one peer socket and return its handle.
fn spawn_peer(stream: TcpStream, policy: AckPolicy) -> Result<Peer, TransportError> {
    let mut reader = stream.try_clone()?;
    let writer = Arc::new(Mutex::new(stream));

    let (data_tx, data_rx): (Sender<Envelope>, Receiver<Envelope>) = bounded(1);
    let (ack_tx, ack_rx) = bounded(1);

    let reader_writer = Arc::clone(&writer);
    thread::spawn(move || {
        loop {
            let frame = match read_frame(&mut reader) {
                Ok(frame) => frame,
                // EOF or a torn connection: drop the channels so blocked
                // callers observe Disconnected.
                Err(_) => break,
            };

            match frame {
                Frame::Data { tag, payload } => {
                    if data_tx.send(Envelope { tag, payload }).is_err() {
                        break;
                    }
                    if policy == AckPolicy::OnArrival {
                        let mut w = reader_writer.lock().expect("peer writer poisoned");
                        if write_frame(&mut w, &Frame::Ack).is_err() {
                            break;
                        }
                    }
                }
                Frame::Ack => {
                    if ack_tx.send(()).is_err() {
                        break;
                    }
                }
                // Handshake frames never appear after setup.
                _ => break,
            }
        }
    });

    Ok(Peer { writer, data_rx, ack_rx })
}

fn write_frame(stream: &mut TcpStream, frame: &Frame) -> Result<(), TransportError> {
    let body = rmp_serde::to_vec(frame).map_err(|e| {
        TransportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let len = body.len() as u32;
    stream.write_all(&len.to_le_bytes())?;
    stream.write_all(&body)?;
    stream.flush()?;
    Ok(())
}

fn read_frame(stream: &mut TcpStream) -> Result<Frame, TransportError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes"),
        )));
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body)?;

    rmp_serde::from_slice(&body).map_err(|e| {
        TransportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

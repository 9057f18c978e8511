//! In-process channel transport
//!
//! Backs the local execution mode and the test suite: every participant is a
//! thread of one process and each ordered pair of ranks is wired with a
//! dedicated crossbeam channel. Channels toward rank 0 are bounded at one
//! message (the idle-report mailbox); every other channel has zero capacity,
//! so a send is a true rendezvous that completes only when the receiver
//! takes the message.
//!
//! The wildcard receive is a `crossbeam::channel::Select` over all incoming
//! channels, which admits whichever sender is ready first - the mechanism
//! behind the dispatcher's dynamic load balancing.

use crossbeam::channel::{bounded, Receiver, Select, Sender};

use super::{Delivery, Rank, Source, Tag, Transport, TransportError};

/// One message in flight between a pair of participants.
struct Envelope {
    tag: Tag,
    payload: Vec<u8>,
}

/// Transport endpoint for one participant of an in-process group
///
/// Build the whole group at once with [`ChannelTransport::group`] and hand
/// one endpoint to each participant thread.
pub struct ChannelTransport {
    rank: Rank,
    size: usize,
    /// Senders indexed by destination rank; `None` at our own rank.
    outgoing: Vec<Option<Sender<Envelope>>>,
    /// Receivers indexed by source rank; `None` at our own rank.
    incoming: Vec<Option<Receiver<Envelope>>>,
}

impl ChannelTransport {
    /// Wire up a full group of `size` participants.
    ///
    /// Returns one endpoint per rank, in rank order. Panics if `size` is 0.
    pub fn group(size: usize) -> Vec<ChannelTransport> {
        assert!(size > 0, "a participant group needs at least rank 0");

        // channels[src][dst] holds the src -> dst link
        let mut links: Vec<Vec<Option<(Sender<Envelope>, Receiver<Envelope>)>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for src in 0..size {
            for dst in 0..size {
                if src == dst {
                    continue;
                }
                // Idle reports to rank 0 get one buffered slot; everything
                // else rendezvouses.
                let capacity = if dst == 0 { 1 } else { 0 };
                links[src][dst] = Some(bounded(capacity));
            }
        }

        (0..size)
            .map(|rank| {
                let outgoing = (0..size)
                    .map(|dst| links[rank][dst].as_ref().map(|(tx, _)| tx.clone()))
                    .collect();
                let incoming = (0..size)
                    .map(|src| links[src][rank].as_ref().map(|(_, rx)| rx.clone()))
                    .collect();
                ChannelTransport { rank, size, outgoing, incoming }
            })
            .collect()
    }

    fn check_tag(&self, env: Envelope, source: Rank, tag: Tag) -> Result<Delivery, TransportError> {
        if env.tag != tag {
            return Err(TransportError::TagMismatch {
                from: source,
                expected: tag,
                got: env.tag,
            });
        }
        Ok(Delivery { payload: env.payload, source })
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, payload: &[u8], dest: Rank, tag: Tag) -> Result<(), TransportError> {
        let sender = self
            .outgoing
            .get(dest)
            .and_then(|s| s.as_ref())
            .ok_or(TransportError::InvalidRank(dest))?;

        sender
            .send(Envelope { tag, payload: payload.to_vec() })
            .map_err(|_| TransportError::Disconnected(dest))
    }

    fn recv(&self, source: Source, tag: Tag) -> Result<Delivery, TransportError> {
        match source {
            Source::Rank(src) => {
                let receiver = self
                    .incoming
                    .get(src)
                    .and_then(|r| r.as_ref())
                    .ok_or(TransportError::InvalidRank(src))?;

                let env = receiver.recv().map_err(|_| TransportError::Disconnected(src))?;
                self.check_tag(env, src, tag)
            }
            Source::Any => {
                // Select over every incoming channel; remember which rank
                // each select index belongs to.
                let live: Vec<(Rank, &Receiver<Envelope>)> = self
                    .incoming
                    .iter()
                    .enumerate()
                    .filter_map(|(rank, rx)| rx.as_ref().map(|rx| (rank, rx)))
                    .collect();

                let mut select = Select::new();
                for (_, rx) in &live {
                    select.recv(rx);
                }

                let oper = select.select();
                let index = oper.index();
                let (src, rx) = live[index];
                let env = oper.recv(rx).map_err(|_| TransportError::Disconnected(src))?;
                self.check_tag(env, src, tag)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn group_reports_rank_and_size() {
        let group = ChannelTransport::group(3);
        assert_eq!(group.len(), 3);
        for (i, t) in group.iter().enumerate() {
            assert_eq!(t.rank(), i);
            assert_eq!(t.size(), 3);
        }
    }

    #[test]
    fn directed_send_and_receive() {
        let mut group = ChannelTransport::group(2);
        let worker = group.remove(1);
        let coordinator = group.remove(0);

        let handle = thread::spawn(move || {
            coordinator.send(b"hello", 1, 7).unwrap();
        });

        let delivery = worker.recv(Source::Rank(0), 7).unwrap();
        assert_eq!(delivery.payload, b"hello");
        assert_eq!(delivery.source, 0);
        handle.join().unwrap();
    }

    #[test]
    fn wildcard_receive_reports_the_sender() {
        let mut group = ChannelTransport::group(3);
        let w2 = group.remove(2);
        let _w1 = group.remove(1);
        let coordinator = group.remove(0);

        let handle = thread::spawn(move || {
            w2.send(b"from two", 0, 42).unwrap();
        });

        let delivery = coordinator.recv(Source::Any, 42).unwrap();
        assert_eq!(delivery.source, 2);
        assert_eq!(delivery.payload, b"from two");
        handle.join().unwrap();
    }

    #[test]
    fn send_to_worker_blocks_until_received() {
        let mut group = ChannelTransport::group(2);
        let worker = group.remove(1);
        let coordinator = group.remove(0);

        let received = std::sync::Arc::new(AtomicBool::new(false));
        let received_sender_side = received.clone();

        let sender = thread::spawn(move || {
            coordinator.send(b"job", 1, 99).unwrap();
            // The worker must already have consumed the message.
            assert!(received_sender_side.load(Ordering::SeqCst));
        });

        // Give the sender time to park in the rendezvous.
        thread::sleep(Duration::from_millis(50));
        received.store(true, Ordering::SeqCst);
        worker.recv(Source::Rank(0), 99).unwrap();
        sender.join().unwrap();
    }

    #[test]
    fn send_to_coordinator_completes_unreceived() {
        let mut group = ChannelTransport::group(2);
        let _coordinator = group.remove(0);
        let worker = group.pop().unwrap();

        // One idle report parks in the mailbox without a matching receive.
        worker.send(b"ready", 0, 42).unwrap();
    }

    #[test]
    fn tag_mismatch_is_an_error() {
        let mut group = ChannelTransport::group(2);
        let worker = group.remove(1);
        let coordinator = group.remove(0);

        let handle = thread::spawn(move || {
            coordinator.send(b"x", 1, 99).unwrap();
        });

        let err = worker.recv(Source::Rank(0), 41).unwrap_err();
        assert!(matches!(err, TransportError::TagMismatch { expected: 41, got: 99, .. }));
        handle.join().unwrap();
    }

    #[test]
    fn send_to_unknown_rank_is_rejected() {
        let mut group = ChannelTransport::group(2);
        let coordinator = group.remove(0);

        let err = coordinator.send(b"x", 5, 1).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRank(5)));
    }

    #[test]
    fn dropped_peer_surfaces_as_disconnected() {
        let mut group = ChannelTransport::group(2);
        let worker = group.remove(1);
        drop(group); // drops the coordinator endpoint

        let err = worker.recv(Source::Rank(0), 99).unwrap_err();
        assert!(matches!(err, TransportError::Disconnected(0)));
    }
}

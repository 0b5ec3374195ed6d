//! Channel-backed transport connecting ranks inside one process.
//!
//! Sends are eager: the payload is copied into the destination's inbox
//! when the send is posted, and the send request completes on its first
//! test. Receives are matched lazily when tested. Arrived messages are
//! moved from the channel into an unexpected-message queue and matched by
//! `(source, tag)` in arrival order; among several posted receives for the
//! same `(source, tag)`, the earliest posted is served first.

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use indexmap::IndexMap;
use tracing::trace;

use ferry_core::{Rank, Request, Status, Tag, Transport, TransportError};

/// A message in flight between two endpoints.
#[derive(Debug)]
struct Envelope {
    source: Rank,
    tag: Tag,
    payload: Vec<f64>,
}

/// An operation posted but not yet reported complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    Send { dest: Rank, tag: Tag, count: usize },
    Recv { source: Rank, tag: Tag, count: usize },
}

/// Factory for a set of connected [`LocalComm`] endpoints.
pub struct LocalWorld;

impl LocalWorld {
    /// Create `size` endpoints; element `i` is rank `i`.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(size: usize) -> Vec<LocalComm> {
        assert!(size > 0, "a world needs at least one rank");
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| crossbeam_channel::unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(i, inbox)| LocalComm {
                rank: Rank(i),
                peers: senders.clone(),
                inbox,
                unexpected: VecDeque::new(),
                pending: IndexMap::new(),
                next_request: 1,
            })
            .collect()
    }

    /// A single-rank world, for drivers that never leave the process.
    pub fn single() -> LocalComm {
        let mut world = Self::new(1);
        world.remove(0)
    }
}

/// One rank's endpoint of a [`LocalWorld`].
pub struct LocalComm {
    rank: Rank,
    peers: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    unexpected: VecDeque<Envelope>,
    pending: IndexMap<u64, Pending>,
    next_request: u64,
}

impl LocalComm {
    /// Number of posted operations not yet reported complete.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Number of arrived messages not yet matched by a receive.
    pub fn unmatched(&mut self) -> usize {
        self.pump();
        self.unexpected.len()
    }

    fn check_rank(&self, rank: Rank) -> Result<(), TransportError> {
        if rank.0 >= self.peers.len() {
            return Err(TransportError::InvalidRank {
                rank,
                size: self.peers.len(),
            });
        }
        Ok(())
    }

    fn post(&mut self, op: Pending) -> Request {
        let id = self.next_request;
        self.next_request += 1;
        self.pending.insert(id, op);
        Request::new(id)
    }

    fn pump(&mut self) {
        loop {
            match self.inbox.try_recv() {
                Ok(envelope) => self.unexpected.push_back(envelope),
                // Every endpoint holds a sender to itself, so the channel
                // never disconnects while `self` is alive.
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Whether `id` is the earliest posted receive for `(source, tag)`.
    fn first_in_line(&self, id: u64, source: Rank, tag: Tag) -> bool {
        self.pending
            .iter()
            .find(|(_, op)| matches!(op, Pending::Recv { source: s, tag: t, .. } if *s == source && *t == tag))
            .is_some_and(|(&first, _)| first == id)
    }
}

impl Transport for LocalComm {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn isend(&mut self, dest: Rank, tag: Tag, data: &[f64]) -> Result<Request, TransportError> {
        self.check_rank(dest)?;
        let envelope = Envelope {
            source: self.rank,
            tag,
            payload: data.to_vec(),
        };
        self.peers[dest.0]
            .send(envelope)
            .map_err(|_| TransportError::Disconnected { peer: dest })?;
        trace!(from = %self.rank, to = %dest, %tag, count = data.len(), "posted send");
        Ok(self.post(Pending::Send {
            dest,
            tag,
            count: data.len(),
        }))
    }

    fn irecv(&mut self, source: Rank, tag: Tag, count: usize) -> Result<Request, TransportError> {
        self.check_rank(source)?;
        trace!(at = %self.rank, from = %source, %tag, count, "posted receive");
        Ok(self.post(Pending::Recv { source, tag, count }))
    }

    fn test(&mut self, request: Request, buf: &mut [f64]) -> Result<Option<Status>, TransportError> {
        let op = *self
            .pending
            .get(&request.id())
            .ok_or(TransportError::UnknownRequest { id: request.id() })?;
        match op {
            Pending::Send { dest, tag, count } => {
                self.pending.shift_remove(&request.id());
                Ok(Some(Status {
                    peer: dest,
                    tag,
                    count,
                }))
            }
            Pending::Recv { source, tag, count } => {
                if buf.len() != count {
                    return Err(TransportError::BufferSize {
                        posted: count,
                        actual: buf.len(),
                    });
                }
                self.pump();
                if !self.first_in_line(request.id(), source, tag) {
                    return Ok(None);
                }
                let Some(pos) = self
                    .unexpected
                    .iter()
                    .position(|e| e.source == source && e.tag == tag)
                else {
                    return Ok(None);
                };
                let received = self.unexpected[pos].payload.len();
                if received > count {
                    return Err(TransportError::Truncated {
                        peer: source,
                        tag,
                        posted: count,
                        received,
                    });
                }
                let envelope = self
                    .unexpected
                    .remove(pos)
                    .ok_or(TransportError::UnknownRequest { id: request.id() })?;
                buf[..received].copy_from_slice(&envelope.payload);
                self.pending.shift_remove(&request.id());
                trace!(at = %self.rank, from = %source, %tag, count = received, "matched receive");
                Ok(Some(Status {
                    peer: source,
                    tag,
                    count: received,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn poll(comm: &mut LocalComm, req: Request, buf: &mut [f64]) -> Status {
        for _ in 0..1000 {
            if let Some(status) = comm.test(req, buf).unwrap() {
                return status;
            }
        }
        panic!("request {req:?} never completed");
    }

    #[test]
    fn send_then_receive_between_ranks() {
        let mut world = LocalWorld::new(2);
        let mut r1 = world.pop().unwrap();
        let mut r0 = world.pop().unwrap();

        let send = r0.isend(Rank(1), Tag(7), &[1.0, 2.0, 3.0]).unwrap();
        let status = poll(&mut r0, send, &mut []);
        assert_eq!(status.peer, Rank(1));
        assert_eq!(status.count, 3);

        let recv = r1.irecv(Rank(0), Tag(7), 3).unwrap();
        let mut buf = [0.0; 3];
        let status = poll(&mut r1, recv, &mut buf);
        assert_eq!(status, Status { peer: Rank(0), tag: Tag(7), count: 3 });
        assert_eq!(buf, [1.0, 2.0, 3.0]);
        assert_eq!(r1.outstanding(), 0);
    }

    #[test]
    fn receive_waits_for_matching_tag() {
        let mut world = LocalWorld::new(2);
        let mut r1 = world.pop().unwrap();
        let mut r0 = world.pop().unwrap();

        let recv = r1.irecv(Rank(0), Tag(2), 1).unwrap();
        let mut buf = [0.0; 1];
        r0.isend(Rank(1), Tag(1), &[10.0]).unwrap();
        assert_eq!(r1.test(recv, &mut buf).unwrap(), None);
        assert_eq!(r1.unmatched(), 1);

        r0.isend(Rank(1), Tag(2), &[20.0]).unwrap();
        let status = r1.test(recv, &mut buf).unwrap().unwrap();
        assert_eq!(status.tag, Tag(2));
        assert_eq!(buf, [20.0]);
        assert_eq!(r1.unmatched(), 1);
    }

    #[test]
    fn earlier_receive_is_served_first() {
        let mut comm = LocalWorld::single();
        let first = comm.irecv(Rank(0), Tag(5), 1).unwrap();
        let second = comm.irecv(Rank(0), Tag(5), 1).unwrap();
        comm.isend(Rank(0), Tag(5), &[1.0]).unwrap();
        comm.isend(Rank(0), Tag(5), &[2.0]).unwrap();

        let mut buf = [0.0; 1];
        assert_eq!(comm.test(second, &mut buf).unwrap(), None);
        comm.test(first, &mut buf).unwrap().unwrap();
        assert_eq!(buf, [1.0]);
        comm.test(second, &mut buf).unwrap().unwrap();
        assert_eq!(buf, [2.0]);
    }

    #[test]
    fn errors_are_reported() {
        let mut comm = LocalWorld::single();
        assert_eq!(
            comm.isend(Rank(3), Tag(1), &[]),
            Err(TransportError::InvalidRank { rank: Rank(3), size: 1 })
        );
        assert_eq!(
            comm.test(Request::new(99), &mut []),
            Err(TransportError::UnknownRequest { id: 99 })
        );

        let recv = comm.irecv(Rank(0), Tag(1), 1).unwrap();
        comm.isend(Rank(0), Tag(1), &[1.0, 2.0]).unwrap();
        let mut wrong = [0.0; 2];
        assert_eq!(
            comm.test(recv, &mut wrong),
            Err(TransportError::BufferSize { posted: 1, actual: 2 })
        );
        let mut buf = [0.0; 1];
        assert_eq!(
            comm.test(recv, &mut buf),
            Err(TransportError::Truncated {
                peer: Rank(0),
                tag: Tag(1),
                posted: 1,
                received: 2
            })
        );
    }

    #[test]
    fn disconnected_peer_is_an_error() {
        let mut world = LocalWorld::new(2);
        let r1 = world.pop().unwrap();
        let mut r0 = world.pop().unwrap();
        drop(r1);
        // r0 still holds a sender to rank 1, but rank 1's inbox is gone.
        assert_eq!(
            r0.isend(Rank(1), Tag(1), &[1.0]),
            Err(TransportError::Disconnected { peer: Rank(1) })
        );
    }

    #[test]
    fn retired_request_is_unknown() {
        let mut comm = LocalWorld::single();
        let send = comm.isend(Rank(0), Tag(1), &[1.0]).unwrap();
        comm.test(send, &mut []).unwrap().unwrap();
        assert!(comm.test(send, &mut []).is_err());
    }

    proptest! {
        /// Whatever order receives are posted in across tags, the k-th
        /// receive posted for a tag gets the k-th message sent with it.
        #[test]
        fn matching_is_fifo_per_tag(
            (tags, order) in prop::collection::vec(0u64..3, 1..16)
                .prop_flat_map(|tags| (Just(tags.clone()), Just(tags).prop_shuffle())),
            post_first in any::<bool>(),
        ) {
            let mut world = LocalWorld::new(2);
            let mut r1 = world.pop().unwrap();
            let mut r0 = world.pop().unwrap();
            let send_all = |r0: &mut LocalComm| {
                for (i, &tag) in tags.iter().enumerate() {
                    r0.isend(Rank(1), Tag(tag), &[i as f64]).unwrap();
                }
            };

            if !post_first {
                send_all(&mut r0);
            }
            let requests: Vec<(u64, Request)> = order
                .iter()
                .map(|&tag| (tag, r1.irecv(Rank(0), Tag(tag), 1).unwrap()))
                .collect();
            if post_first {
                send_all(&mut r0);
            }

            let mut sent: Vec<VecDeque<f64>> = vec![VecDeque::new(); 3];
            for (i, &tag) in tags.iter().enumerate() {
                sent[tag as usize].push_back(i as f64);
            }
            for (tag, request) in requests {
                let mut buf = [0.0];
                let status = poll(&mut r1, request, &mut buf);
                prop_assert_eq!(status.tag, Tag(tag));
                prop_assert_eq!(Some(buf[0]), sent[tag as usize].pop_front());
            }
            prop_assert_eq!(r1.unmatched(), 0);
        }
    }
}

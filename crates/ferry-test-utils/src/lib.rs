//! Test utilities and instrumented transports for Ferry development.
//!
//! - [`LaggyTransport`] delays every completion by a fixed number of polls
//!   and records how many operations were outstanding at once.
//! - [`MiscountingTransport`] reports every completion one element longer
//!   than what was transferred.
//! - [`LiveProbe`] hands out [`ProbeJob`]s that count how many of them are
//!   started but not finished.
//! - [`FailingJob`] fails on its first poll.
//! - [`run_ranks`] runs one closure per rank of a [`LocalWorld`] on its own
//!   thread.
//! - [`fixtures`] builds layouts and deterministically filled arrays.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use ferry_core::{Rank, Request, SeqNo, Status, Tag, Transport, TransportError};
use ferry_engine::{ExecError, Job};
use ferry_transport::{LocalComm, LocalWorld};

// ── LaggyTransport ──────────────────────────────────────────────

/// Wraps a transport so that each operation reports "in flight" for `lag`
/// polls before the inner transport is consulted.
pub struct LaggyTransport<T> {
    inner: T,
    lag: u32,
    waits: HashMap<u64, u32>,
    posted: usize,
    max_outstanding: usize,
}

impl<T: Transport> LaggyTransport<T> {
    pub fn new(inner: T, lag: u32) -> Self {
        Self {
            inner,
            lag,
            waits: HashMap::new(),
            posted: 0,
            max_outstanding: 0,
        }
    }

    /// Operations posted but not yet reported complete.
    pub fn outstanding(&self) -> usize {
        self.waits.len()
    }

    /// Highest value [`outstanding`](Self::outstanding) has reached.
    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding
    }

    /// Total operations posted.
    pub fn posted(&self) -> usize {
        self.posted
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn track(&mut self, request: Request) -> Request {
        self.waits.insert(request.id(), self.lag);
        self.posted += 1;
        self.max_outstanding = self.max_outstanding.max(self.waits.len());
        request
    }
}

impl<T: Transport> Transport for LaggyTransport<T> {
    fn rank(&self) -> Rank {
        self.inner.rank()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn isend(&mut self, dest: Rank, tag: Tag, data: &[f64]) -> Result<Request, TransportError> {
        let request = self.inner.isend(dest, tag, data)?;
        Ok(self.track(request))
    }

    fn irecv(&mut self, source: Rank, tag: Tag, count: usize) -> Result<Request, TransportError> {
        let request = self.inner.irecv(source, tag, count)?;
        Ok(self.track(request))
    }

    fn test(&mut self, request: Request, buf: &mut [f64]) -> Result<Option<Status>, TransportError> {
        if let Some(remaining) = self.waits.get_mut(&request.id()) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }
        let status = self.inner.test(request, buf)?;
        if status.is_some() {
            self.waits.remove(&request.id());
        }
        Ok(status)
    }
}

// ── MiscountingTransport ────────────────────────────────────────

/// Wraps a transport and inflates the count of every completion by one,
/// leaving the data untouched.
pub struct MiscountingTransport<T> {
    inner: T,
}

impl<T: Transport> MiscountingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: Transport> Transport for MiscountingTransport<T> {
    fn rank(&self) -> Rank {
        self.inner.rank()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn isend(&mut self, dest: Rank, tag: Tag, data: &[f64]) -> Result<Request, TransportError> {
        self.inner.isend(dest, tag, data)
    }

    fn irecv(&mut self, source: Rank, tag: Tag, count: usize) -> Result<Request, TransportError> {
        self.inner.irecv(source, tag, count)
    }

    fn test(&mut self, request: Request, buf: &mut [f64]) -> Result<Option<Status>, TransportError> {
        Ok(self.inner.test(request, buf)?.map(|status| Status {
            count: status.count + 1,
            ..status
        }))
    }
}

// ── LiveProbe ───────────────────────────────────────────────────

#[derive(Default)]
struct ProbeState {
    live: Cell<usize>,
    peak: Cell<usize>,
    started: Cell<usize>,
}

/// Shared counters for a family of [`ProbeJob`]s.
#[derive(Clone, Default)]
pub struct LiveProbe {
    state: Rc<ProbeState>,
}

impl LiveProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// A job that stays live for `polls` idle polls.
    pub fn job(&self, polls: u32) -> ProbeJob {
        ProbeJob {
            probe: self.clone(),
            polls,
        }
    }

    /// Jobs currently started and not finished.
    pub fn live(&self) -> usize {
        self.state.live.get()
    }

    /// Highest value [`live`](Self::live) has reached.
    pub fn peak(&self) -> usize {
        self.state.peak.get()
    }

    /// Jobs started so far.
    pub fn started(&self) -> usize {
        self.state.started.get()
    }
}

/// A job registered with a [`LiveProbe`].
pub struct ProbeJob {
    probe: LiveProbe,
    polls: u32,
}

impl Job for ProbeJob {
    fn name(&self) -> &str {
        "probe"
    }

    fn startup(&mut self, _: SeqNo, _: &mut dyn Transport) -> Result<bool, ExecError> {
        let state = &self.probe.state;
        state.live.set(state.live.get() + 1);
        state.peak.set(state.peak.get().max(state.live.get()));
        state.started.set(state.started.get() + 1);
        Ok(true)
    }

    fn ready(&mut self, _: SeqNo, _: &mut dyn Transport) -> Result<bool, ExecError> {
        if self.polls > 0 {
            self.polls -= 1;
            return Ok(false);
        }
        let state = &self.probe.state;
        state.live.set(state.live.get() - 1);
        Ok(true)
    }
}

/// A job whose first poll fails.
pub struct FailingJob {
    pub reason: String,
}

impl FailingJob {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Job for FailingJob {
    fn name(&self) -> &str {
        "failing"
    }

    fn ready(&mut self, seq: SeqNo, _: &mut dyn Transport) -> Result<bool, ExecError> {
        Err(ExecError::JobFailed {
            seq,
            name: self.name().to_string(),
            reason: self.reason.clone(),
        })
    }
}

// ── run_ranks ───────────────────────────────────────────────────

/// Run `f` once per rank of a fresh `n`-rank [`LocalWorld`], each on its
/// own thread, and collect the results in rank order. A panic on any rank
/// is re-raised on the caller.
pub fn run_ranks<R: Send>(n: usize, f: impl Fn(LocalComm) -> R + Sync) -> Vec<R> {
    let world = LocalWorld::new(n);
    let f = &f;
    std::thread::scope(|scope| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| scope.spawn(move || f(comm)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laggy_transport_delays_completion() {
        let mut comm = LaggyTransport::new(LocalWorld::single(), 2);
        let send = comm.isend(Rank(0), Tag(1), &[1.0]).unwrap();
        let recv = comm.irecv(Rank(0), Tag(1), 1).unwrap();
        assert_eq!(comm.outstanding(), 2);
        let mut buf = [0.0];
        assert_eq!(comm.test(send, &mut []).unwrap(), None);
        assert_eq!(comm.test(send, &mut []).unwrap(), None);
        assert!(comm.test(send, &mut []).unwrap().is_some());
        comm.test(recv, &mut buf).unwrap();
        comm.test(recv, &mut buf).unwrap();
        assert!(comm.test(recv, &mut buf).unwrap().is_some());
        assert_eq!(buf, [1.0]);
        assert_eq!(comm.outstanding(), 0);
        assert_eq!(comm.max_outstanding(), 2);
        assert_eq!(comm.posted(), 2);
    }

    #[test]
    fn miscounting_transport_inflates_counts() {
        let mut comm = MiscountingTransport::new(LocalWorld::single());
        let send = comm.isend(Rank(0), Tag(3), &[1.0, 2.0]).unwrap();
        assert_eq!(comm.test(send, &mut []).unwrap().map(|s| s.count), Some(3));
        let recv = comm.irecv(Rank(0), Tag(3), 2).unwrap();
        let mut buf = [0.0; 2];
        assert_eq!(comm.test(recv, &mut buf).unwrap().map(|s| s.count), Some(3));
        assert_eq!(buf, [1.0, 2.0]);
    }

    #[test]
    fn run_ranks_returns_in_rank_order() {
        let ranks = run_ranks(3, |comm| comm.rank().0);
        assert_eq!(ranks, vec![0, 1, 2]);
    }
}

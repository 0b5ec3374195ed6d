//! Collaborator traits consumed by the task engine.
//!
//! [`Ownership`] answers which process holds each grid of a distributed
//! array. [`Transport`] is the non-blocking point-to-point substrate used
//! for cross-process data movement: post a send or receive, then poll it
//! with [`Transport::test`] until it reports completion.

use crate::error::TransportError;
use crate::id::{GridIndex, Rank, Tag};

/// Grid-to-process ownership queries for a distributed array.
pub trait Ownership {
    /// Number of grids in the array.
    fn n_grids(&self) -> usize;

    /// The process owning `grid`.
    fn owner(&self, grid: GridIndex) -> Rank;

    /// Whether `grid` is owned by the calling process.
    fn is_local(&self, grid: GridIndex) -> bool;
}

/// Opaque handle for an outstanding transport operation.
///
/// Returned by [`Transport::isend`] and [`Transport::irecv`]. A request is
/// retired by the transport the first time [`Transport::test`] reports it
/// complete; testing it again afterwards is an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Request(u64);

impl Request {
    /// Wrap a transport-specific identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The transport-specific identifier.
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Completion record of a transport operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status {
    /// For receives, the matched sender; for sends, the destination.
    pub peer: Rank,
    /// Tag of the matched message.
    pub tag: Tag,
    /// Number of `f64` elements transferred.
    pub count: usize,
}

/// Non-blocking point-to-point message transport.
///
/// Implementations must never block in any method. Messages between one
/// pair of ranks with the same tag are matched in the order they were sent.
pub trait Transport {
    /// Rank of the calling process.
    fn rank(&self) -> Rank;

    /// Number of processes in the world.
    fn size(&self) -> usize;

    /// Post a send of `data` to `dest`.
    ///
    /// The transport copies `data` before returning; the caller may keep
    /// or drop its buffer.
    fn isend(&mut self, dest: Rank, tag: Tag, data: &[f64]) -> Result<Request, TransportError>;

    /// Post a receive of `count` elements from `source` with `tag`.
    fn irecv(&mut self, source: Rank, tag: Tag, count: usize) -> Result<Request, TransportError>;

    /// Poll `request` without blocking.
    ///
    /// Returns `Ok(None)` while the operation is in flight. On completion
    /// of a receive, the message is written into `buf`, which must hold
    /// exactly the posted count; sends ignore `buf`.
    fn test(&mut self, request: Request, buf: &mut [f64]) -> Result<Option<Status>, TransportError>;
}

//! Error types shared across the Ferry workspace.
//!
//! Region construction errors are recoverable and returned to the caller.
//! Transport errors are fatal to a scheduling run: the task engine
//! surfaces them from `TaskList::execute` and does not retry.

use thiserror::Error;

use crate::id::{Rank, Tag};

/// Errors arising from [`Region`](crate::Region) construction.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegionError {
    /// The low and high corners have different dimensionality.
    #[error("corner dimensions differ: lo has {lo} axes, hi has {hi}")]
    DimensionMismatch {
        /// Number of axes in the low corner.
        lo: usize,
        /// Number of axes in the high corner.
        hi: usize,
    },
    /// A region needs at least one axis.
    #[error("region must have at least one axis")]
    ZeroDimensional,
}

/// Errors reported by a [`Transport`](crate::Transport) implementation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A peer rank outside `0..size` was addressed.
    #[error("rank {rank} is outside a world of size {size}")]
    InvalidRank {
        /// The offending rank.
        rank: Rank,
        /// Number of ranks in the world.
        size: usize,
    },
    /// The peer's endpoint has been dropped.
    #[error("peer {peer} disconnected")]
    Disconnected {
        /// The unreachable peer.
        peer: Rank,
    },
    /// A matched message is longer than the posted receive buffer.
    #[error("message from {peer} with tag {tag} truncated: posted {posted} elements, received {received}")]
    Truncated {
        /// Sender of the message.
        peer: Rank,
        /// Tag of the message.
        tag: Tag,
        /// Elements the receive was posted for.
        posted: usize,
        /// Elements actually carried by the message.
        received: usize,
    },
    /// The supplied receive buffer does not match the posted count.
    #[error("receive buffer holds {actual} elements, receive was posted for {posted}")]
    BufferSize {
        /// Elements the receive was posted for.
        posted: usize,
        /// Length of the buffer supplied to `test`.
        actual: usize,
    },
    /// `test` was called with a request the transport does not know.
    #[error("unknown request {id}")]
    UnknownRequest {
        /// Raw request identifier.
        id: u64,
    },
}

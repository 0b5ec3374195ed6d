//! Strongly-typed identifiers and the [`Coord`] type alias.

use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sequence number of a task within a task list.
///
/// Issued from a per-list counter starting at [`SeqNo::FIRST`]. Zero is
/// reserved and never issued. The sequence number doubles as the message
/// tag for the transport operations the task posts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeqNo(u64);

impl SeqNo {
    /// The first sequence number issued after construction or a full drain.
    pub const FIRST: SeqNo = SeqNo(1);

    /// Wrap a raw value.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is zero.
    pub fn new(raw: u64) -> Self {
        assert!(raw != 0, "sequence number 0 is reserved");
        Self(raw)
    }

    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// The sequence number following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The transport tag carried by messages belonging to this task.
    pub fn tag(self) -> Tag {
        Tag(self.0)
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message tag used to match sends with receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u64);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SeqNo> for Tag {
    fn from(seq: SeqNo) -> Self {
        seq.tag()
    }
}

/// Identifies one grid (partition) of a distributed array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridIndex(pub usize);

impl fmt::Display for GridIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for GridIndex {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Identifies a process (rank) participating in the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rank(pub usize);

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for Rank {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Counter for unique [`ArrayId`] allocation.
static ARRAY_INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for a distributed array.
///
/// Allocated from a monotonic atomic counter via [`ArrayId::next`]. Two
/// separately constructed arrays always have different IDs, even when
/// their layouts are identical. Hazard detection compares arrays by this
/// identity only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(u64);

impl ArrayId {
    /// Allocate a fresh, unique array ID. Thread-safe.
    pub fn next() -> Self {
        Self(ARRAY_INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An integer point in index space.
///
/// Uses `SmallVec<[i32; 4]>` so that 1D through 4D points stay on the
/// stack; higher dimensions spill to the heap transparently.
pub type Coord = SmallVec<[i32; 4]>;

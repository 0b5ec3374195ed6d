//! Task handles and the finished-flag side table.
//!
//! A [`TaskHandle`] names a task by `(list, generation, sequence)`. It owns
//! nothing: the task record lives in its [`TaskList`](crate::TaskList)
//! until it finishes, and the finished flag lives in a side table owned by
//! the list. A handle therefore stays valid after its task is destroyed and
//! keeps reporting it finished.
//!
//! The generation counts completed drains. Sequence numbers restart at 1
//! after every drain, so the generation keeps handles from different
//! drains apart; every task of an older generation is finished.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ferry_core::SeqNo;

/// Counter for unique [`ListId`] allocation.
static LIST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a task list instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ListId(u64);

impl ListId {
    pub(crate) fn next() -> Self {
        Self(LIST_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Copyable reference to a task queued on a [`TaskList`](crate::TaskList).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    list: ListId,
    generation: u32,
    seq: SeqNo,
}

impl TaskHandle {
    /// Sequence number of the task.
    pub fn seq(&self) -> SeqNo {
        self.seq
    }

    /// Drain generation the task was issued in.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn list(&self) -> ListId {
        self.list
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.seq, self.generation)
    }
}

/// Finished flags for every task issued in the current generation.
///
/// Flags are indexed by `seq - 1`. Each flag is written once, false to
/// true, by the scheduler; every handle reads the same flag.
#[derive(Debug)]
pub(crate) struct FinishedTable {
    list: ListId,
    generation: u32,
    flags: Vec<bool>,
}

impl FinishedTable {
    pub(crate) fn new(list: ListId) -> Self {
        Self {
            list,
            generation: 0,
            flags: Vec::new(),
        }
    }

    /// Record a freshly issued sequence number and return its handle.
    pub(crate) fn issue(&mut self, seq: SeqNo) -> TaskHandle {
        debug_assert_eq!(seq.get() as usize, self.flags.len() + 1);
        self.flags.push(false);
        TaskHandle {
            list: self.list,
            generation: self.generation,
            seq,
        }
    }

    /// Whether `handle` belongs to this table's list.
    pub(crate) fn owns(&self, handle: TaskHandle) -> bool {
        handle.list == self.list
    }

    /// Set the finished flag of `handle`.
    ///
    /// # Panics
    ///
    /// Panics if the handle belongs to another list or an older
    /// generation, or if it is already finished.
    pub(crate) fn mark(&mut self, handle: TaskHandle) {
        assert!(self.owns(handle), "task {handle} belongs to another list");
        assert_eq!(
            handle.generation, self.generation,
            "task {handle} belongs to a drained generation"
        );
        let flag = &mut self.flags[handle.seq.get() as usize - 1];
        assert!(!*flag, "task {handle} finished twice");
        *flag = true;
    }

    /// Whether the task behind `handle` has finished.
    ///
    /// # Panics
    ///
    /// Panics if the handle belongs to another list.
    pub(crate) fn is_finished(&self, handle: TaskHandle) -> bool {
        assert!(self.owns(handle), "task {handle} belongs to another list");
        if handle.generation < self.generation {
            return true;
        }
        self.flags[handle.seq.get() as usize - 1]
    }

    /// Start a new generation after a full drain.
    pub(crate) fn advance_generation(&mut self) {
        self.generation += 1;
        self.flags.clear();
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }
}

//! Errors that abort a scheduling run.
//!
//! Every variant is fatal: [`TaskList::execute`](crate::TaskList::execute)
//! stops at the first one and returns it. Contract violations (starting a
//! task twice, polling before startup, reading an unpopulated fetch) are
//! not errors but panics, since they indicate a scheduling bug.

use thiserror::Error;

use ferry_core::{SeqNo, TransportError};

/// Fatal failure of a [`TaskList::execute`](crate::TaskList::execute) run.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The transport reported an error for an operation of task `seq`.
    #[error("task {seq}: transport failure: {source}")]
    Transport {
        /// The task whose operation failed.
        seq: SeqNo,
        /// The underlying transport error.
        #[source]
        source: TransportError,
    },
    /// A completed transport operation does not match what the task posted.
    #[error("task {seq}: completion {field} is {actual}, expected {expected}")]
    StatusMismatch {
        /// The task whose operation completed.
        seq: SeqNo,
        /// Which status field disagreed (`peer`, `tag`, or `count`).
        field: &'static str,
        /// The value the task expected.
        expected: u64,
        /// The value the transport reported.
        actual: u64,
    },
    /// A user [`Job`](crate::Job) failed.
    #[error("task {seq}: job '{name}' failed: {reason}")]
    JobFailed {
        /// The failing task.
        seq: SeqNo,
        /// Name reported by the job.
        name: String,
        /// Human-readable failure description.
        reason: String,
    },
    /// No queued task can ever become ready: the remaining tasks wait on
    /// each other.
    #[error("dependency cycle among tasks {pending:?}")]
    DependencyCycle {
        /// Sequence numbers of the tasks still queued.
        pending: Vec<SeqNo>,
    },
}

impl ExecError {
    /// Adapter for `map_err` on transport calls made on behalf of `seq`.
    pub fn transport(seq: SeqNo) -> impl FnOnce(TransportError) -> ExecError {
        move |source| ExecError::Transport { seq, source }
    }
}

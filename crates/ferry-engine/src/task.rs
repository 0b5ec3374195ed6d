//! The task record and its kinds.
//!
//! A [`Task`] pairs a [`TaskKind`] (what to do) with the bookkeeping the
//! scheduler needs: its handle, the handles it waits on, and whether
//! `startup` has run. Kinds are a closed sum type; footprints for hazard
//! detection come from matching on the kind, so no runtime type queries
//! are involved.

use std::fmt;

use smallvec::SmallVec;

use ferry_core::{Rank, SeqNo, Status, Transport};

use crate::copy::{RegionCopy, RegionCopyToLocal};
use crate::error::ExecError;
use crate::fetch::{FetchAggregate, RemoteFetch};
use crate::handle::{FinishedTable, TaskHandle};
use crate::hazard::{conflicts, Footprint};

// ── Job ─────────────────────────────────────────────────────────

/// Application-defined work driven by the scheduler.
///
/// A job follows the same protocol as the built-in kinds: `startup` once
/// after every dependency has finished, then `ready` until it returns
/// true. Neither method may block.
pub trait Job {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Begin work. Return `Ok(false)` if there is nothing to do; the task
    /// then finishes without being polled.
    fn startup(&mut self, seq: SeqNo, comm: &mut dyn Transport) -> Result<bool, ExecError> {
        let _ = (seq, comm);
        Ok(true)
    }

    /// Poll for completion. Must return `Ok(true)` exactly once.
    fn ready(&mut self, seq: SeqNo, comm: &mut dyn Transport) -> Result<bool, ExecError>;
}

// ── TaskKind ────────────────────────────────────────────────────

/// The work a task performs.
pub enum TaskKind {
    /// No work; finishes on its first poll. Useful as a join point.
    Marker,
    /// Copy between grids of two distributed arrays.
    Copy(RegionCopy),
    /// Copy from a distributed array into a private buffer.
    CopyToLocal(RegionCopyToLocal),
    /// Materialize a remote region on the requesting rank.
    Fetch(RemoteFetch),
    /// Join over a set of fetches targeting one grid.
    Aggregate(FetchAggregate),
    /// Application-defined work.
    Custom(Box<dyn Job>),
}

impl TaskKind {
    /// Short name of the kind.
    pub fn label(&self) -> &str {
        match self {
            Self::Marker => "marker",
            Self::Copy(_) => "copy",
            Self::CopyToLocal(_) => "copy-to-local",
            Self::Fetch(_) => "fetch",
            Self::Aggregate(_) => "aggregate",
            Self::Custom(job) => job.name(),
        }
    }

    /// The array regions this kind reads or writes.
    pub fn footprint(&self) -> Footprint<'_> {
        match self {
            Self::Copy(copy) => copy.footprint(),
            Self::CopyToLocal(copy) => copy.footprint(),
            Self::Marker | Self::Fetch(_) | Self::Aggregate(_) | Self::Custom(_) => {
                Footprint::new()
            }
        }
    }

    /// How the calling rank takes part in this kind of work.
    pub fn locality(&self) -> Locality {
        match self {
            Self::Marker | Self::Custom(_) => Locality::Local,
            Self::Copy(copy) => copy.locality(),
            Self::CopyToLocal(copy) => copy.locality(),
            Self::Fetch(fetch) => fetch.locality(),
            Self::Aggregate(agg) => {
                if agg.is_local_target() {
                    Locality::Local
                } else {
                    Locality::Uninvolved
                }
            }
        }
    }
}

/// How the calling rank takes part in a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Locality {
    /// All data is local; no transport.
    Local,
    /// The rank sends data to a peer.
    Send,
    /// The rank receives data from a peer.
    Receive,
    /// The rank has nothing to do.
    Uninvolved,
}

impl Locality {
    pub(crate) fn classify(dst_local: bool, src_local: bool) -> Self {
        match (dst_local, src_local) {
            (true, true) => Self::Local,
            (true, false) => Self::Receive,
            (false, true) => Self::Send,
            (false, false) => Self::Uninvolved,
        }
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Self::Local => 'L',
            Self::Send => 'S',
            Self::Receive => 'R',
            Self::Uninvolved => '?',
        };
        write!(f, "{c}")
    }
}

// ── Task ────────────────────────────────────────────────────────

/// A queued unit of work with its dependency set.
pub struct Task {
    handle: TaskHandle,
    kind: TaskKind,
    dependencies: SmallVec<[TaskHandle; 4]>,
    started: bool,
}

impl Task {
    pub(crate) fn new(handle: TaskHandle, kind: TaskKind) -> Self {
        Self {
            handle,
            kind,
            dependencies: SmallVec::new(),
            started: false,
        }
    }

    /// Handle naming this task.
    pub fn handle(&self) -> TaskHandle {
        self.handle
    }

    /// Sequence number, also the tag of every message the task posts.
    pub fn seq(&self) -> SeqNo {
        self.handle.seq()
    }

    /// The work this task performs.
    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut TaskKind {
        &mut self.kind
    }

    /// Whether `startup` has been called.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Dependencies not yet pruned as finished.
    pub fn dependencies(&self) -> &[TaskHandle] {
        &self.dependencies
    }

    /// The array regions this task reads or writes.
    pub fn footprint(&self) -> Footprint<'_> {
        self.kind.footprint()
    }

    /// Add `dep` to the set of tasks that must finish first.
    ///
    /// # Panics
    ///
    /// Panics if the task has already started.
    pub(crate) fn attach_dependency(&mut self, dep: TaskHandle) {
        assert!(
            !self.started,
            "dependency {dep} attached to task {} after startup",
            self.handle
        );
        self.dependencies.push(dep);
    }

    /// Drop finished dependencies; true once none remain.
    pub(crate) fn dependencies_satisfied(&mut self, finished: &FinishedTable) -> bool {
        self.dependencies.retain(|dep| !finished.is_finished(*dep));
        self.dependencies.is_empty()
    }

    /// Attach a dependency on every queued task whose footprint overlaps
    /// this task's footprint. `queued` holds tasks submitted earlier.
    pub(crate) fn derive_hazard_dependencies(&mut self, queued: &[Task]) {
        let hazards: SmallVec<[TaskHandle; 4]> = {
            let mine = self.footprint();
            if mine.is_empty() {
                return;
            }
            queued
                .iter()
                .filter(|other| conflicts(&mine, &other.footprint()))
                .map(Task::handle)
                .collect()
        };
        for dep in hazards {
            self.attach_dependency(dep);
        }
    }

    /// Run `startup` on the kind.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    pub(crate) fn startup(&mut self, comm: &mut dyn Transport) -> Result<bool, ExecError> {
        assert!(!self.started, "task {} started twice", self.handle);
        self.started = true;
        let seq = self.seq();
        match &mut self.kind {
            TaskKind::Marker | TaskKind::Aggregate(_) => Ok(true),
            TaskKind::Copy(copy) => copy.startup(seq, comm),
            TaskKind::CopyToLocal(copy) => copy.startup(seq, comm),
            TaskKind::Fetch(fetch) => fetch.startup(seq, comm),
            TaskKind::Custom(job) => job.startup(seq, comm),
        }
    }

    /// Poll the kind for completion.
    ///
    /// # Panics
    ///
    /// Panics if `startup` has not been called.
    pub(crate) fn ready(&mut self, comm: &mut dyn Transport) -> Result<bool, ExecError> {
        assert!(self.started, "task {} polled before startup", self.handle);
        let seq = self.seq();
        match &mut self.kind {
            TaskKind::Marker => Ok(true),
            TaskKind::Copy(copy) => copy.ready(seq, comm),
            TaskKind::CopyToLocal(copy) => copy.ready(seq, comm),
            TaskKind::Fetch(fetch) => fetch.ready(seq, comm),
            TaskKind::Aggregate(agg) => agg.ready(),
            TaskKind::Custom(job) => job.ready(seq, comm),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}{}]",
            self.kind.label(),
            self.seq(),
            self.kind.locality(),
            if self.started { " started" } else { "" }
        )?;
        match &self.kind {
            TaskKind::Copy(copy) => write!(f, " {copy}"),
            TaskKind::CopyToLocal(copy) => write!(f, " {copy}"),
            TaskKind::Fetch(fetch) => write!(f, " {fetch}"),
            TaskKind::Aggregate(agg) => write!(f, " {agg}"),
            TaskKind::Marker | TaskKind::Custom(_) => Ok(()),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("hint", &format_args!("{self}"))
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

// ── Completion checks ───────────────────────────────────────────

/// Verify a transport completion against what task `seq` posted.
pub(crate) fn check_completion(
    seq: SeqNo,
    status: &Status,
    peer: Rank,
    count: usize,
) -> Result<(), ExecError> {
    let checks = [
        ("peer", peer.0 as u64, status.peer.0 as u64),
        ("tag", seq.tag().0, status.tag.0),
        ("count", count as u64, status.count as u64),
    ];
    for (field, expected, actual) in checks {
        if expected != actual {
            return Err(ExecError::StatusMismatch {
                seq,
                field,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ListId;
    use ferry_core::Tag;

    #[test]
    fn locality_classes_render_as_letters() {
        assert_eq!(Locality::classify(true, true).to_string(), "L");
        assert_eq!(Locality::classify(false, true).to_string(), "S");
        assert_eq!(Locality::classify(true, false).to_string(), "R");
        assert_eq!(Locality::classify(false, false).to_string(), "?");
    }

    #[test]
    fn dependencies_prune_as_they_finish() {
        let mut table = FinishedTable::new(ListId::next());
        let a = table.issue(SeqNo::FIRST);
        let b = table.issue(SeqNo::new(2));
        let c = table.issue(SeqNo::new(3));
        let mut task = Task::new(c, TaskKind::Marker);
        task.attach_dependency(a);
        task.attach_dependency(b);

        assert!(!task.dependencies_satisfied(&table));
        table.mark(b);
        assert!(!task.dependencies_satisfied(&table));
        assert_eq!(task.dependencies(), &[a]);
        table.mark(a);
        assert!(task.dependencies_satisfied(&table));
        assert!(task.dependencies_satisfied(&table));
    }

    #[test]
    #[should_panic(expected = "after startup")]
    fn attach_after_startup_panics() {
        let mut table = FinishedTable::new(ListId::next());
        let a = table.issue(SeqNo::FIRST);
        let b = table.issue(SeqNo::new(2));
        let mut task = Task::new(b, TaskKind::Marker);
        let mut comm = NullComm;
        task.startup(&mut comm).unwrap();
        task.attach_dependency(a);
    }

    #[test]
    #[should_panic(expected = "started twice")]
    fn double_startup_panics() {
        let mut table = FinishedTable::new(ListId::next());
        let mut task = Task::new(table.issue(SeqNo::FIRST), TaskKind::Marker);
        let mut comm = NullComm;
        let _ = task.startup(&mut comm);
        let _ = task.startup(&mut comm);
    }

    #[test]
    #[should_panic(expected = "polled before startup")]
    fn ready_before_startup_panics() {
        let mut table = FinishedTable::new(ListId::next());
        let mut task = Task::new(table.issue(SeqNo::FIRST), TaskKind::Marker);
        let _ = task.ready(&mut NullComm);
    }

    #[test]
    fn completion_mismatch_names_the_field() {
        let seq = SeqNo::new(4);
        let ok = Status { peer: Rank(1), tag: Tag(4), count: 8 };
        assert!(check_completion(seq, &ok, Rank(1), 8).is_ok());

        let short = Status { count: 6, ..ok };
        assert_eq!(
            check_completion(seq, &short, Rank(1), 8),
            Err(ExecError::StatusMismatch { seq, field: "count", expected: 8, actual: 6 })
        );
        let wrong_tag = Status { tag: Tag(5), ..ok };
        assert!(matches!(
            check_completion(seq, &wrong_tag, Rank(1), 8),
            Err(ExecError::StatusMismatch { field: "tag", .. })
        ));
    }

    /// Transport for tests that never touch the wire.
    struct NullComm;

    impl Transport for NullComm {
        fn rank(&self) -> Rank {
            Rank(0)
        }
        fn size(&self) -> usize {
            1
        }
        fn isend(
            &mut self,
            _: Rank,
            _: Tag,
            _: &[f64],
        ) -> Result<ferry_core::Request, ferry_core::TransportError> {
            unreachable!("no transport in this test")
        }
        fn irecv(
            &mut self,
            _: Rank,
            _: Tag,
            _: usize,
        ) -> Result<ferry_core::Request, ferry_core::TransportError> {
            unreachable!("no transport in this test")
        }
        fn test(
            &mut self,
            _: ferry_core::Request,
            _: &mut [f64],
        ) -> Result<Option<Status>, ferry_core::TransportError> {
            unreachable!("no transport in this test")
        }
    }
}

//! The task list scheduler.
//!
//! [`TaskList`] stamps every submitted task with the next sequence number,
//! derives hazard dependencies against the tasks already queued, and
//! drains the queue in [`execute`](TaskList::execute).
//!
//! # Scan loop
//!
//! Each pass walks the queue front to back. A task whose dependencies are
//! unfinished is skipped. A started task is polled and removed once
//! `ready` reports completion. An unstarted task is started unless the
//! live-task limit is reached; once it is, admission stops for the rest of
//! the pass while started tasks keep draining, and the next pass begins
//! again from the front. A pass that makes no progress yields the thread;
//! a pass that makes no progress with nothing live is a dependency cycle.

use std::fmt;
use std::time::Instant;

use tracing::{debug, trace};

use ferry_array::ArrayRef;
use ferry_core::{GridIndex, Rank, Region, SeqNo, Transport};

use crate::config::{ConfigError, SchedulerConfig};
use crate::copy::{RegionCopy, RegionCopyToLocal};
use crate::error::ExecError;
use crate::fetch::{FetchAggregate, FetchResult, RemoteFetch};
use crate::handle::{FinishedTable, ListId, TaskHandle};
use crate::metrics::{ExecMetrics, ExecReport, TaskEvent};
use crate::task::{Job, Task, TaskKind};

/// Queue of tasks driven to completion over one transport endpoint.
///
/// A task list is used by a single thread. In a multi-rank program every
/// rank builds the same list in the same order, so that matching sends and
/// receives carry the same sequence number as their tag.
pub struct TaskList<T: Transport> {
    config: SchedulerConfig,
    comm: T,
    finished: FinishedTable,
    next_seq: SeqNo,
    tasks: Vec<Task>,
    poisoned: bool,
}

impl<T: Transport> TaskList<T> {
    /// Create an empty list.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchedulerConfig::validate`] failure.
    pub fn new(config: SchedulerConfig, comm: T) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            comm,
            finished: FinishedTable::new(ListId::next()),
            next_seq: SeqNo::FIRST,
            tasks: Vec::new(),
            poisoned: false,
        })
    }

    /// Create an empty list with the default configuration.
    pub fn with_transport(comm: T) -> Self {
        Self {
            config: SchedulerConfig::default(),
            comm,
            finished: FinishedTable::new(ListId::next()),
            next_seq: SeqNo::FIRST,
            tasks: Vec::new(),
            poisoned: false,
        }
    }

    // ── Introspection ──────────────────────────────────────────

    /// The configuration in effect.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Rank of the transport endpoint.
    pub fn rank(&self) -> Rank {
        self.comm.rank()
    }

    /// The transport endpoint.
    pub fn transport(&self) -> &T {
        &self.comm
    }

    /// The transport endpoint, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.comm
    }

    /// Consume the list and return its transport endpoint.
    pub fn into_transport(self) -> T {
        self.comm
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is queued.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether a previous [`execute`](Self::execute) returned an error.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// The sequence number the next submitted task will receive.
    pub fn next_sequence(&self) -> SeqNo {
        self.next_seq
    }

    /// Queued tasks in submission order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// The queued task behind `handle`, if it has not finished.
    pub fn task(&self, handle: TaskHandle) -> Option<&Task> {
        self.position(handle).map(|i| &self.tasks[i])
    }

    /// Whether the task behind `handle` has finished.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was issued by another list.
    pub fn is_finished(&self, handle: TaskHandle) -> bool {
        self.finished.is_finished(handle)
    }

    /// Prune finished dependencies of `handle`; true once none remain.
    /// A finished task reports true.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was issued by another list.
    pub fn dependencies_satisfied(&mut self, handle: TaskHandle) -> bool {
        match self.position(handle) {
            Some(i) => self.tasks[i].dependencies_satisfied(&self.finished),
            None => true,
        }
    }

    // ── Submission ─────────────────────────────────────────────

    /// Queue a task, deriving hazard dependencies on earlier queued tasks.
    pub fn add_task(&mut self, kind: TaskKind) -> TaskHandle {
        let seq = self.next_seq;
        self.next_seq = seq.next();
        let handle = self.finished.issue(seq);
        let mut task = Task::new(handle, kind);
        task.derive_hazard_dependencies(&self.tasks);
        trace!(%seq, task = %task, deps = task.dependencies().len(), "queued");
        self.tasks.push(task);
        handle
    }

    /// Queue a region copy between two grids.
    ///
    /// # Panics
    ///
    /// As [`RegionCopy::new`].
    pub fn add_copy(
        &mut self,
        dst: ArrayRef,
        dst_grid: GridIndex,
        dst_region: Region,
        src: ArrayRef,
        src_grid: GridIndex,
        src_region: Region,
    ) -> TaskHandle {
        self.add_task(TaskKind::Copy(RegionCopy::new(
            dst, dst_grid, dst_region, src, src_grid, src_region,
        )))
    }

    /// Queue a copy into a private buffer.
    pub fn add_copy_to_local(&mut self, copy: RegionCopyToLocal) -> TaskHandle {
        self.add_task(TaskKind::CopyToLocal(copy))
    }

    /// Queue a remote fetch.
    pub fn add_fetch(&mut self, fetch: RemoteFetch) -> TaskHandle {
        self.add_task(TaskKind::Fetch(fetch))
    }

    /// Queue a fetch aggregate. Add fetches with
    /// [`push_fetch`](Self::push_fetch).
    pub fn add_aggregate(&mut self, aggregate: FetchAggregate) -> TaskHandle {
        self.add_task(TaskKind::Aggregate(aggregate))
    }

    /// Queue a marker task.
    pub fn add_marker(&mut self) -> TaskHandle {
        self.add_task(TaskKind::Marker)
    }

    /// Queue an application-defined job.
    pub fn add_job(&mut self, job: impl Job + 'static) -> TaskHandle {
        self.add_task(TaskKind::Custom(Box::new(job)))
    }

    /// Queue a fetch of `region` of `src_grid` delivered to the owner of
    /// the aggregate's target grid, and make the aggregate depend on it.
    ///
    /// # Panics
    ///
    /// Panics if `aggregate` is not a queued, unstarted fetch aggregate of
    /// this list, or as [`RemoteFetch::new`].
    pub fn push_fetch(
        &mut self,
        aggregate: TaskHandle,
        src: ArrayRef,
        src_grid: GridIndex,
        region: Region,
        n_comp: usize,
    ) -> TaskHandle {
        let target_rank = self.aggregate_mut(aggregate).target_rank();
        let fetch = RemoteFetch::new(target_rank, src, src_grid, region, n_comp);
        let result = fetch.result();
        let handle = self.add_fetch(fetch);
        self.aggregate_mut(aggregate).record(handle, result);
        self.attach_dependency(aggregate, handle);
        handle
    }

    /// Result slots of the fetches pushed to a queued aggregate.
    ///
    /// # Panics
    ///
    /// Panics if `aggregate` is not a queued fetch aggregate of this list.
    pub fn aggregate_results(&self, aggregate: TaskHandle) -> Vec<FetchResult> {
        let Some(i) = self.position(aggregate) else {
            panic!("aggregate {aggregate} is not queued");
        };
        match self.tasks[i].kind() {
            TaskKind::Aggregate(agg) => agg.results().to_vec(),
            _ => panic!("task {aggregate} is not a fetch aggregate"),
        }
    }

    /// Make `task` wait for `dep` in addition to its derived dependencies.
    ///
    /// No cycle check is made; a cycle surfaces from
    /// [`execute`](Self::execute) as [`ExecError::DependencyCycle`].
    ///
    /// # Panics
    ///
    /// Panics if either handle was issued by another list, or if `task`
    /// is not queued or has already started.
    pub fn attach_dependency(&mut self, task: TaskHandle, dep: TaskHandle) {
        assert!(self.finished.owns(dep), "dependency {dep} belongs to another list");
        let Some(i) = self.position(task) else {
            panic!("task {task} is not queued");
        };
        self.tasks[i].attach_dependency(dep);
    }

    fn position(&self, handle: TaskHandle) -> Option<usize> {
        assert!(
            self.finished.owns(handle),
            "task {handle} belongs to another list"
        );
        if handle.generation() != self.finished.generation() {
            return None;
        }
        self.tasks.binary_search_by_key(&handle.seq(), Task::seq).ok()
    }

    fn aggregate_mut(&mut self, handle: TaskHandle) -> &mut FetchAggregate {
        let Some(i) = self.position(handle) else {
            panic!("aggregate {handle} is not queued");
        };
        let task = &mut self.tasks[i];
        assert!(!task.is_started(), "aggregate {handle} has already started");
        match task.kind_mut() {
            TaskKind::Aggregate(agg) => agg,
            _ => panic!("task {handle} is not a fetch aggregate"),
        }
    }

    /// One line per queued task listing its unfinished dependencies.
    pub fn describe_dependencies(&self) -> String {
        let mut out = String::from("Task list (\n");
        for task in &self.tasks {
            out.push_str(&format!("  Task {} depends on (", task.seq()));
            for dep in task.dependencies() {
                if !self.finished.is_finished(*dep) {
                    out.push_str(&format!(" {}", dep.seq()));
                }
            }
            out.push_str(" )\n");
        }
        out.push(')');
        out
    }

    // ── Execution ──────────────────────────────────────────────

    /// Drive every queued task to completion.
    ///
    /// Returns once the queue is empty. The sequence counter then restarts
    /// at [`SeqNo::FIRST`] and handles issued so far all report finished.
    ///
    /// When the live-task limit is reached, admission stops for the rest
    /// of the pass but started tasks further down the queue are still
    /// polled. Restarting the scan from the front instead can starve a
    /// live task queued behind the throttle point, since an aggregate
    /// waits on fetches submitted after it.
    ///
    /// # Errors
    ///
    /// Stops at the first transport failure, completion mismatch or job
    /// failure, and returns [`ExecError::DependencyCycle`] if the remaining
    /// tasks wait on each other. The list is then poisoned: its tasks stay
    /// queued and the sequence counter is left alone.
    ///
    /// # Panics
    ///
    /// Panics if the list is poisoned.
    pub fn execute(&mut self) -> Result<ExecReport, ExecError> {
        assert!(
            !self.poisoned,
            "task list executed again after a failed run ({} tasks queued)",
            self.tasks.len()
        );
        self.drain().inspect_err(|_| self.poisoned = true)
    }

    fn drain(&mut self) -> Result<ExecReport, ExecError> {
        let start = Instant::now();
        let limit = self.config.max_live_tasks;
        let record = self.config.record_events;
        let mut metrics = ExecMetrics {
            submitted: self.tasks.len(),
            ..ExecMetrics::default()
        };
        let mut events = Vec::new();
        debug!(rank = %self.comm.rank(), tasks = self.tasks.len(), limit, "draining task list");
        if self.config.verbose {
            debug!("{}", self.describe_dependencies());
        }

        let mut live = 0usize;
        while !self.tasks.is_empty() {
            metrics.passes += 1;
            let mut progressed = false;
            let mut admitting = true;
            let mut i = 0;
            while i < self.tasks.len() {
                let task = &mut self.tasks[i];
                if !task.dependencies_satisfied(&self.finished) {
                    i += 1;
                    continue;
                }
                let done = if task.is_started() {
                    if task.ready(&mut self.comm)? {
                        live -= 1;
                        metrics.completed += 1;
                        if record {
                            events.push(TaskEvent::Finished(task.seq()));
                        }
                        true
                    } else {
                        metrics.idle_polls += 1;
                        false
                    }
                } else if !admitting || live >= limit {
                    if admitting {
                        admitting = false;
                        metrics.throttled_passes += 1;
                        trace!(live, limit, "admission throttled");
                    }
                    false
                } else if task.startup(&mut self.comm)? {
                    live += 1;
                    progressed = true;
                    metrics.started += 1;
                    metrics.peak_live = metrics.peak_live.max(live);
                    trace!(task = %task, live, "started");
                    if record {
                        events.push(TaskEvent::Started(task.seq()));
                    }
                    false
                } else {
                    metrics.declined += 1;
                    if record {
                        events.push(TaskEvent::Declined(task.seq()));
                    }
                    true
                };
                if done {
                    progressed = true;
                    let task = self.tasks.remove(i);
                    self.finished.mark(task.handle());
                    trace!(seq = %task.seq(), "finished");
                } else {
                    i += 1;
                }
            }
            if !progressed {
                if live == 0 {
                    let pending: Vec<SeqNo> = self.tasks.iter().map(Task::seq).collect();
                    debug!("{}", self.describe_dependencies());
                    return Err(ExecError::DependencyCycle { pending });
                }
                std::thread::yield_now();
            }
        }

        assert_eq!(live, 0, "task list drained with {live} live tasks");
        self.next_seq = SeqNo::FIRST;
        self.finished.advance_generation();
        metrics.elapsed_us = start.elapsed().as_micros() as u64;
        debug!(
            passes = metrics.passes,
            started = metrics.started,
            declined = metrics.declined,
            peak_live = metrics.peak_live,
            elapsed_us = metrics.elapsed_us,
            "task list drained"
        );
        Ok(ExecReport { metrics, events })
    }
}

impl<T: Transport> fmt::Display for TaskList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rank {}: {} queued", self.comm.rank(), self.tasks.len())?;
        for task in &self.tasks {
            writeln!(f, "  {task}")?;
        }
        Ok(())
    }
}

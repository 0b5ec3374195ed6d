//! Per-execution report for the task list scheduler.
//!
//! [`ExecReport`] is returned by every successful
//! [`TaskList::execute`](crate::TaskList::execute). It carries counters
//! describing how the drain went and, when
//! [`SchedulerConfig::record_events`](crate::SchedulerConfig::record_events)
//! is set, the ordered log of task transitions.

use ferry_core::SeqNo;

/// Counters collected during one drain of a task list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecMetrics {
    /// Tasks queued when the drain began.
    pub submitted: usize,
    /// Tasks whose `startup` returned true.
    pub started: usize,
    /// Tasks whose `startup` returned false and finished without polling.
    pub declined: usize,
    /// Started tasks that finished through `ready`.
    pub completed: usize,
    /// Highest number of simultaneously live tasks.
    pub peak_live: usize,
    /// Scan passes over the queue.
    pub passes: u64,
    /// Passes in which admission stopped at the live-task limit.
    pub throttled_passes: u64,
    /// `ready` polls that returned false.
    pub idle_polls: u64,
    /// Wall-clock duration of the drain, in microseconds.
    pub elapsed_us: u64,
}

/// A task state transition observed by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskEvent {
    /// `startup` returned true; the task is live.
    Started(SeqNo),
    /// `startup` returned false; the task finished without work.
    Declined(SeqNo),
    /// `ready` returned true; the task finished.
    Finished(SeqNo),
}

impl TaskEvent {
    /// Sequence number of the task the event belongs to.
    pub fn seq(&self) -> SeqNo {
        match *self {
            Self::Started(seq) | Self::Declined(seq) | Self::Finished(seq) => seq,
        }
    }

    /// Whether the event marks the task as finished.
    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Declined(_) | Self::Finished(_))
    }
}

/// Outcome of a successful drain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecReport {
    /// Counters for the drain.
    pub metrics: ExecMetrics,
    /// Ordered transitions; empty unless event recording is enabled.
    pub events: Vec<TaskEvent>,
}

impl ExecReport {
    /// Position in [`events`](Self::events) where `seq` started work or
    /// declined.
    pub fn start_index(&self, seq: SeqNo) -> Option<usize> {
        self.events
            .iter()
            .position(|e| matches!(e, TaskEvent::Started(s) | TaskEvent::Declined(s) if *s == seq))
    }

    /// Position in [`events`](Self::events) where `seq` finished.
    pub fn finish_index(&self, seq: SeqNo) -> Option<usize> {
        self.events
            .iter()
            .position(|e| e.is_finish() && e.seq() == seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = ExecMetrics::default();
        assert_eq!(m.submitted, 0);
        assert_eq!(m.started, 0);
        assert_eq!(m.declined, 0);
        assert_eq!(m.completed, 0);
        assert_eq!(m.peak_live, 0);
        assert_eq!(m.passes, 0);
        assert_eq!(m.throttled_passes, 0);
        assert_eq!(m.idle_polls, 0);
    }

    #[test]
    fn event_positions() {
        let one = SeqNo::FIRST;
        let two = one.next();
        let report = ExecReport {
            metrics: ExecMetrics::default(),
            events: vec![
                TaskEvent::Started(one),
                TaskEvent::Declined(two),
                TaskEvent::Finished(one),
            ],
        };
        assert_eq!(report.start_index(one), Some(0));
        assert_eq!(report.start_index(two), Some(1));
        assert_eq!(report.finish_index(two), Some(1));
        assert_eq!(report.finish_index(one), Some(2));
        assert_eq!(report.finish_index(two.next()), None);
    }
}

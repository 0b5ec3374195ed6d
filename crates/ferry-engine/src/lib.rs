//! Dependency-aware task list scheduling region copies and remote fetches.
//!
//! Client code queues tasks on a [`TaskList`]: region copies between grids
//! of distributed arrays, copies into private buffers, remote fetches and
//! fetch aggregates, plus plain markers and user [`Job`]s. Copy tasks
//! derive dependencies on earlier queued tasks whose regions overlap on the
//! same array, so conflicting copies run in submission order.
//! [`TaskList::execute`] then drives every task through
//! `Pending → Started → Finished`, polling outstanding transport operations
//! without blocking and never holding more than
//! [`SchedulerConfig::max_live_tasks`] tasks in the started state.
//!
//! # Modules
//!
//! - [`config`]: scheduler configuration and validation
//! - [`handle`]: task handles and the finished-flag table
//! - [`task`]: the task record and its kinds
//! - [`copy`]: `RegionCopy` and `RegionCopyToLocal`
//! - [`fetch`]: `RemoteFetch` and `FetchAggregate`
//! - [`hazard`]: overlap-based dependency derivation
//! - [`list`]: the `TaskList` scheduler
//! - [`metrics`]: per-execution report

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod copy;
pub mod error;
pub mod fetch;
pub mod handle;
pub mod hazard;
pub mod list;
pub mod metrics;
pub mod task;

pub use config::{ConfigError, SchedulerConfig};
pub use copy::{LocalBuffer, RegionCopy, RegionCopyToLocal};
pub use error::ExecError;
pub use fetch::{AggregateView, FetchAggregate, FetchResult, RemoteFetch};
pub use handle::TaskHandle;
pub use list::TaskList;
pub use metrics::{ExecMetrics, ExecReport, TaskEvent};
pub use task::{Job, Locality, Task, TaskKind};

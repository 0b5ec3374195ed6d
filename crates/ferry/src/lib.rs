//! Ferry: cooperative, dependency-aware scheduling of region copies on
//! distributed arrays.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Ferry sub-crates. For most users, adding `ferry` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use ferry::prelude::*;
//!
//! // Two 4×4 grids side by side on one rank, each with one ghost layer.
//! let grids = vec![
//!     Region::new(&[0, 0], &[3, 3])?,
//!     Region::new(&[4, 0], &[7, 3])?,
//! ];
//! let layout = Arc::new(BoxLayout::round_robin(grids, 1)?);
//! let phi = MultiFab::shared(layout, Rank(0), 1, 1)?;
//! phi.fill_with(|grid, _, _| grid.0 as f64 + 1.0);
//!
//! // Fill grid 0's east ghost column from grid 1's interior.
//! let mut list = TaskList::new(SchedulerConfig::default(), LocalWorld::single())?;
//! let ghost = Region::new(&[4, 0], &[4, 3])?;
//! list.add_copy(phi.clone(), GridIndex(0), ghost.clone(), phi.clone(), GridIndex(1), ghost);
//! let report = list.execute()?;
//!
//! assert_eq!(report.metrics.completed, 1);
//! assert_eq!(phi.fab(GridIndex(0)).get(&[4, 0], 0), 2.0);
//! assert_eq!(phi.fab(GridIndex(0)).get(&[3, 0], 0), 1.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `ferry-core` | IDs, regions, `Fab` buffers, `Ownership` and `Transport` traits |
//! | [`array`] | `ferry-array` | Box layouts and distributed `MultiFab` arrays |
//! | [`transport`] | `ferry-transport` | In-process transport for threaded ranks |
//! | [`engine`] | `ferry-engine` | Task list, copies, remote fetches and aggregates |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`ferry-core`).
///
/// Contains [`types::Region`], [`types::Fab`], the identifier newtypes,
/// and the [`types::Ownership`] and [`types::Transport`] traits that the
/// engine is generic over.
pub use ferry_core as types;

/// Distributed arrays (`ferry-array`).
///
/// [`array::BoxLayout`] assigns grids to ranks; [`array::MultiFab`] holds
/// the local buffers of one array.
pub use ferry_array as array;

/// In-process transport (`ferry-transport`).
///
/// [`transport::LocalWorld`] hands out one [`transport::LocalComm`] per
/// rank, connected by channels.
pub use ferry_transport as transport;

/// The task engine (`ferry-engine`).
///
/// [`engine::TaskList`] queues tasks, derives dependencies from
/// overlapping footprints, and drains them cooperatively.
pub use ferry_engine as engine;

/// Common imports for typical Ferry usage.
///
/// ```rust
/// use ferry::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use ferry_core::{Fab, GridIndex, Ownership, Rank, Region, SeqNo, Transport};

    // Errors
    pub use ferry_core::{RegionError, TransportError};
    pub use ferry_array::ArrayError;
    pub use ferry_engine::{ConfigError, ExecError};

    // Arrays
    pub use ferry_array::{ArrayRef, BoxLayout, MultiFab};

    // Transport
    pub use ferry_transport::{LocalComm, LocalWorld};

    // Engine
    pub use ferry_engine::{
        ExecReport, FetchAggregate, FetchResult, Job, RegionCopy, RegionCopyToLocal, RemoteFetch,
        SchedulerConfig, TaskHandle, TaskList,
    };
}

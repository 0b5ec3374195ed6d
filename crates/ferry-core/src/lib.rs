//! Core types and traits for the Ferry region-copy scheduler.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the rest of the workspace: identifiers,
//! integer [`Region`]s, the dense [`Fab`] buffer, error types, and the
//! [`Ownership`] and [`Transport`] traits that the task engine consumes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod fab;
pub mod id;
pub mod region;
pub mod traits;

pub use error::{RegionError, TransportError};
pub use fab::Fab;
pub use id::{ArrayId, Coord, GridIndex, Rank, SeqNo, Tag};
pub use region::Region;
pub use traits::{Ownership, Request, Status, Transport};

//! Distributed grid arrays for the Ferry region-copy scheduler.
//!
//! A [`BoxLayout`] partitions index space into grids and assigns each grid
//! to an owning rank. A [`MultiFab`] stores one [`Fab`](ferry_core::Fab)
//! per grid owned by the calling rank and answers ownership queries for
//! every grid. Arrays are shared with tasks through [`ArrayRef`]; clones
//! of the same `ArrayRef` share an [`ArrayId`](ferry_core::ArrayId), which
//! is the identity hazard detection compares.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod layout;
pub mod multifab;

pub use error::ArrayError;
pub use layout::BoxLayout;
pub use multifab::{ArrayRef, MultiFab};

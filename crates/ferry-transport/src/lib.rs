//! In-process message transport for the Ferry region-copy scheduler.
//!
//! [`LocalWorld`] wires `n` [`LocalComm`] endpoints together with
//! crossbeam channels. Each endpoint implements
//! [`Transport`](ferry_core::Transport) and is `Send`, so a test or a
//! shared-memory driver can run one rank per thread and exercise the same
//! send/receive/poll protocol a networked transport would.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod local;

pub use local::{LocalComm, LocalWorld};

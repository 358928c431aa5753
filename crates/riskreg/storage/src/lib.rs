//! Risk register storage contracts.
//!
//! The core talks to persistence only through these traits:
//! - [`EntityStore`]: rows (with their embedded controls), hub controls
//!   and control links
//! - [`PendingChangeStore`]: submitted edits awaiting review
//! - [`RegisterStore`]: both of the above plus atomic approval
//!
//! Backends are chosen once at composition time. [`memory`] is the
//! deterministic reference adapter; `postgres` (feature `postgres`) is the
//! transactional one. Callers must not be able to tell them apart.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
mod filter;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use filter::{LinkFilter, PendingFilter, QueryWindow, RowFilter};
pub use memory::InMemoryRegisterStore;
pub use traits::{
    AppliedChange, EntityStore, LocatedControl, PendingChangeStore, RegisterStore, Snapshot,
};

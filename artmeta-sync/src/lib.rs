//! # artmeta-sync
//!
//! Change-aware synchronization of document headers into storage attributes.
//!
//! Build a [`SyncEngine`] over any [`artmeta_storage::StorageClient`] and call
//! [`SyncEngine::run`]. Every listed document ends the run in exactly one
//! [`ItemOutcome`]; only a listing failure aborts the run.

pub mod engine;
pub mod error;
pub mod report;

pub use engine::{SyncEngine, SyncOptions};
pub use error::SyncError;
pub use report::{DocumentReport, FailureStage, ItemOutcome, SyncReport};

//! # artmeta-storage
//!
//! The storage capability consumed by the sync engine, the attribute schema
//! written onto documents, and the concrete backends.
//!
//! Backends are selected from [`artmeta_core::StorageConfig`] by [`connect`];
//! adding a backend means adding a config variant and a module, never touching
//! the engine.

pub mod attributes;
pub mod b2;
pub mod client;
pub mod error;
pub mod local;
mod registry;

pub use attributes::{ensure_unchanged, fingerprint, MetadataAttributes};
pub use client::{DocumentReader, DocumentStream, StorageClient, DOCUMENT_EXTENSION};
pub use error::{Result, StorageError};
pub use registry::connect;

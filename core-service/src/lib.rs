//! Service façade for the audiobook curation core.
//!
//! Wires the tag codec, metadata providers, cache, and sync client into
//! one [`CuratorService`] exposing the boundary operations a shell
//! (GUI or CLI) drives: scan, write, rename, push, and config/cache
//! maintenance. Each operation is an independent, replayable batch:
//! callers pass explicit identifiers and receive explicit per-item
//! results, with no hidden state between calls.

pub mod error;
pub mod pool;
pub mod service;

pub use error::{Result, ServiceError};
pub use pool::WorkerPool;
pub use service::{
    CuratorService, RenameResult, ScanReport, ScannedGroup, ServiceDependencies,
    WriteAndRenameReport, WriteAndRenameRequest, WriteReport, WriteRequest,
};

//! odbackup Sync - remote-to-local mirror engine
//!
//! Provides:
//! - Full-listing reconciliation (remote snapshot is ground truth)
//! - Incremental reconciliation from the delta feed, correlated by Id
//! - Bounded-concurrency downloads
//! - Checkpoint persistence
//! - Per-job runs and interval scheduling
//!
//! ## Modules
//!
//! - [`checkpoint`] - Checkpoint load/save inside the target directory
//! - [`filesystem`] - Local mirror tree operations
//! - [`download`] - Download executor with a per-job permit pool
//! - [`full_listing`] - Snapshot reconciler
//! - [`delta`] - Update batch reconciler
//! - [`runner`] - One run of one job
//! - [`scheduler`] - Run guard and interval loops

pub mod checkpoint;
pub mod delta;
pub mod download;
pub mod filesystem;
pub mod full_listing;
pub mod runner;
pub mod scheduler;

pub use checkpoint::CheckpointStore;
pub use runner::BackupJobRunner;
pub use scheduler::{JobOutcome, JobScheduler, RunGuard};

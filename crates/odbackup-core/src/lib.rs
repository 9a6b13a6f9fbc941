//! odbackup Core - Domain logic for one-way OneDrive mirroring
//!
//! This crate contains the pieces shared by every adapter:
//! - **Domain entities** - `RemoteFile`, `RemoteFolder`, `SyncCheckpoint`, `UpdateBatch`
//! - **Exclusion rules** - `ExclusionFilter`
//! - **Run lifecycle** - `JobState` machine and `RunStats`
//! - **Port definitions** - `IAuthProvider`, `IRemoteDrive`
//! - **Configuration** - YAML job configuration with validation
//!
//! # Architecture
//!
//! Same hexagonal split as the adapters expect: the domain module has no I/O,
//! ports define the traits the Graph adapter implements, and the sync crate
//! drives both.

pub mod config;
pub mod domain;
pub mod ports;

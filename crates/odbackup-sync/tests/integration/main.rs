//! Integration tests for odbackup-sync
//!
//! Drives [`BackupJobRunner`](odbackup_sync::BackupJobRunner) and
//! [`JobScheduler`](odbackup_sync::JobScheduler) against an in-memory remote
//! drive and a real temporary directory, and checks the local mirror and the
//! persisted checkpoint after each run.


mod test_full_listing;
mod test_scheduler;

//! Domain entities and business logic
//!
//! - Remote entities as last observed (`RemoteFile`, `RemoteFolder`)
//! - The persisted checkpoint with its Id index
//! - Incremental change feed types
//! - Exclusion filter
//! - Job run state machine
//! - Error taxonomy

pub mod checkpoint;
pub mod delta;
pub mod errors;
pub mod exclusion;
pub mod remote_item;
pub mod run;

// Re-export commonly used types
pub use checkpoint::{SyncCheckpoint, CHECKPOINT_FILE_NAME};
pub use delta::{DeltaChange, DeltaRound, UpdateBatch};
pub use errors::BackupError;
pub use exclusion::ExclusionFilter;
pub use remote_item::{RemoteFile, RemoteFolder, RemoteSnapshot};
pub use run::{JobRun, JobState, RunStats};

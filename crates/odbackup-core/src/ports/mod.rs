//! Port definitions (hexagonal architecture interfaces)
//!
//! The sync engine depends on these traits; `odbackup-graph` implements them
//! for Microsoft Graph, and the engine's tests implement them in memory.
//!
//! ## Ports Overview
//!
//! - [`IAuthProvider`] - Exchanges a refresh credential for a bearer token
//! - [`IRemoteDrive`] - Listing, delta feed and content download

pub mod auth_provider;
pub mod remote_drive;

pub use auth_provider::{ClientCredentials, IAuthProvider, Tokens};
pub use remote_drive::{IRemoteDrive, PARTIAL_DOWNLOAD_SUFFIX};

//! GitHub REST API access: identifier resolution, the raw HTTP client and
//! the repository payload types.

pub mod client;
pub mod identifier;
pub mod types;

pub use client::{GitHubClient, RawResponse, TransportFailure};
pub use identifier::SyncTarget;
pub use types::GhRepo;

//! `texapi-core`: domain foundation for build jobs.
//!
//! This crate contains **pure domain** primitives (no filesystem, no HTTP):
//! job identifiers, the status state machine, and the persisted job record.

pub mod error;
pub mod id;
pub mod job;

pub use error::{DomainError, DomainResult};
pub use id::JobId;
pub use job::{JobRecord, JobStatus};

//! Build job lifecycle.
//!
//! ## Components
//!
//! - `JobStore`: durable status records, committed via staging file + rename
//! - `JobRunner`: runs the build executable and drives the status machine
//! - `TaskSpawner`: detached background tasks whose failures get logged
//! - `WaitPolicy`: exponential server-side backoff for polling clients

pub mod runner;
pub mod spawner;
pub mod store;
pub mod wait;

pub use runner::{JobRunner, RunnerConfig, RunnerError};
pub use spawner::TaskSpawner;
pub use store::{FsJobStore, JobStore, JobStoreError};
pub use wait::{DEFAULT_WAIT_BASE, WaitDecision, WaitPolicy};

//! Infrastructure layer: job storage, input materialization, build execution,
//! and output packaging. Everything here talks to the filesystem or to child
//! processes; the HTTP surface lives in `texapi-api`.

pub mod assets;
pub mod jobs;
pub mod materialize;
pub mod storage;

pub use storage::{StorageLayout, create_private_dir_all};

//! Input materialization: turn an uploaded payload into a job directory.
//!
//! A payload is either a zip archive or a single document. Both are exposed
//! as a [`FileTree`] and written onto the job directory with [`overlay`].
//! When a default template directory is configured it is laid down first, so
//! uploaded files win on path collisions.

pub mod overlay;
pub mod tree;

use std::io;
use std::path::{Path, PathBuf};

use zip::result::ZipError;

use crate::storage::create_private_dir_all;

pub use overlay::overlay;
pub use tree::{DirTree, FileTree, SingleFileTree, ZipTree};

/// Name given to a payload that is not an archive.
pub const DEFAULT_DOCUMENT_NAME: &str = "main.tex";

const ZIP_HEADER_LENGTH: usize = 4;

// Local file header, end of central directory, spanned archive marker.
const ZIP_MAGICS: [&[u8; ZIP_HEADER_LENGTH]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];

/// Materialization error.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("invalid archive: {0}")]
    Archive(#[from] ZipError),
    #[error("unsafe path in input: {0:?}")]
    UnsafePath(String),
    #[error("path used as both file and directory: {0:?}")]
    PathConflict(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("reading template {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl MaterializeError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// How an uploaded payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Archive,
    Document,
}

impl PayloadKind {
    /// Classify a payload by its first four bytes.
    pub fn classify(data: &[u8]) -> Self {
        match data.get(..ZIP_HEADER_LENGTH) {
            Some(head) if ZIP_MAGICS.iter().any(|magic| head == magic.as_slice()) => {
                PayloadKind::Archive
            }
            _ => PayloadKind::Document,
        }
    }
}

/// Populates job directories from uploads and the optional default template.
#[derive(Debug, Clone, Default)]
pub struct Materializer {
    default_env: Option<PathBuf>,
}

impl Materializer {
    pub fn new(default_env: Option<PathBuf>) -> Self {
        Self { default_env }
    }

    /// Write the template (if any) and then `payload` into `target`.
    ///
    /// Returns the number of files written by the upload itself.
    pub fn materialize(
        &self,
        payload: impl Into<Vec<u8>>,
        target: &Path,
    ) -> Result<usize, MaterializeError> {
        let payload = payload.into();
        let mut source: Box<dyn FileTree> = match PayloadKind::classify(&payload) {
            PayloadKind::Archive => Box::new(ZipTree::new(payload)?),
            PayloadKind::Document => Box::new(SingleFileTree::new(DEFAULT_DOCUMENT_NAME, payload)),
        };

        create_private_dir_all(target).map_err(|e| MaterializeError::io(target, e))?;

        if let Some(env) = &self.default_env {
            let copied = overlay(&mut DirTree::new(env), target)?;
            tracing::debug!(template = %env.display(), files = copied, "default environment applied");
        }

        overlay(source.as_mut(), target)
    }
}

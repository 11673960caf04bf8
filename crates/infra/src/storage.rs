//! On-disk layout of job directories.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use texapi_core::JobId;

/// Canonical status record file inside a job directory.
pub const FILENAME_STATUS: &str = "status.json";
/// Staging file renamed over [`FILENAME_STATUS`] on commit.
pub const FILENAME_STATUS_TEMP: &str = "status.tmp.json";
/// Directory the build executable is expected to populate.
pub const DIRNAME_OUTPUT: &str = "output";

/// Permissions of directories created for jobs (owner only).
pub const CREATE_MODE_DIR: u32 = 0o700;
/// Permissions of files created for jobs (owner only).
pub const CREATE_MODE_FILE: u32 = 0o600;

/// `create_dir_all` with [`CREATE_MODE_DIR`] for every directory it creates.
pub fn create_private_dir_all(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(CREATE_MODE_DIR);
    }
    builder.create(path)
}

/// Create or truncate `path` for writing; new files get [`CREATE_MODE_FILE`].
pub fn create_private_file(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(CREATE_MODE_FILE);
    }
    options.open(path)
}

/// Resolves per-job paths below a storage root.
///
/// Layout: `<root>/<job-id>/{status.json, status.tmp.json, output/, ...input}`.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, id: JobId) -> PathBuf {
        self.root.join(id.to_string())
    }

    pub fn status_file(&self, id: JobId) -> PathBuf {
        self.job_dir(id).join(FILENAME_STATUS)
    }

    pub fn status_temp_file(&self, id: JobId) -> PathBuf {
        self.job_dir(id).join(FILENAME_STATUS_TEMP)
    }

    pub fn output_dir(&self, id: JobId) -> PathBuf {
        self.job_dir(id).join(DIRNAME_OUTPUT)
    }
}

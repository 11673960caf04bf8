//! Job status persistence.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use texapi_core::{JobId, JobRecord};

use crate::storage::{StorageLayout, create_private_dir_all, create_private_file};

/// Job store abstraction.
pub trait JobStore: Send + Sync {
    /// Load the current status record of a job.
    fn load(&self, id: JobId) -> Result<JobRecord, JobStoreError>;

    /// Persist a record, replacing the previous one atomically.
    fn save(&self, record: &JobRecord) -> Result<(), JobStoreError>;

    /// Persist the first record of a job whose directory may not exist yet.
    fn create(&self, record: &JobRecord) -> Result<(), JobStoreError>;
}

/// Job store error.
#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed status record {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("encoding status record: {0}")]
    Encode(#[source] serde_json::Error),
}

impl JobStoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Filesystem-backed store: one `status.json` per job directory.
///
/// Writes go to `status.tmp.json` first and are renamed over the canonical
/// file, so readers only ever see complete records. Only a job's own runner
/// writes its record after creation, so the staging file has a single writer.
#[derive(Debug, Clone)]
pub struct FsJobStore {
    layout: StorageLayout,
}

impl FsJobStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }
}

impl JobStore for FsJobStore {
    fn load(&self, id: JobId) -> Result<JobRecord, JobStoreError> {
        let path = self.layout.status_file(id);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(JobStoreError::NotFound(id));
            }
            Err(e) => return Err(JobStoreError::io(&path, e)),
        };

        serde_json::from_reader(BufReader::new(file))
            .map_err(|source| JobStoreError::Decode { path, source })
    }

    fn save(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        let id = record.uuid;
        let temp = self.layout.status_temp_file(id);
        let canonical = self.layout.status_file(id);

        let file = create_private_file(&temp).map_err(|e| JobStoreError::io(&temp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, record).map_err(JobStoreError::Encode)?;
        writer
            .write_all(b"\n")
            .map_err(|e| JobStoreError::io(&temp, e))?;
        let file = writer
            .into_inner()
            .map_err(|e| JobStoreError::io(&temp, e.into_error()))?;
        file.sync_all().map_err(|e| JobStoreError::io(&temp, e))?;
        drop(file);

        fs::rename(&temp, &canonical).map_err(|e| JobStoreError::io(&canonical, e))?;

        tracing::debug!(job_id = %id, status = %record.status, "status record committed");
        Ok(())
    }

    fn create(&self, record: &JobRecord) -> Result<(), JobStoreError> {
        let dir = self.layout.job_dir(record.uuid);
        create_private_dir_all(&dir).map_err(|e| JobStoreError::io(&dir, e))?;
        self.save(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use texapi_core::JobStatus;

    fn test_store() -> (tempfile::TempDir, FsJobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsJobStore::new(StorageLayout::new(dir.path()));
        (dir, store)
    }

    #[test]
    fn save_and_load_round_trip() {
        let (_dir, store) = test_store();
        let mut record = JobRecord::new(JobId::new());
        store.create(&record).unwrap();
        assert_eq!(store.load(record.uuid).unwrap(), record);

        record.mark_started().unwrap();
        store.save(&record).unwrap();
        let loaded = store.load(record.uuid).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.status, JobStatus::Started);
    }

    #[test]
    fn staging_file_is_consumed_by_commit() {
        let (_dir, store) = test_store();
        let record = JobRecord::new(JobId::new());
        store.create(&record).unwrap();

        assert!(store.layout().status_file(record.uuid).exists());
        assert!(!store.layout().status_temp_file(record.uuid).exists());
    }

    #[test]
    fn unknown_job_is_not_found() {
        let (_dir, store) = test_store();
        let id = JobId::new();
        assert!(matches!(store.load(id), Err(JobStoreError::NotFound(got)) if got == id));
    }

    #[test]
    fn save_without_job_dir_fails() {
        let (_dir, store) = test_store();
        let record = JobRecord::new(JobId::new());
        assert!(matches!(store.save(&record), Err(JobStoreError::Io { .. })));
    }

    #[test]
    fn corrupt_record_is_reported() {
        let (_dir, store) = test_store();
        let record = JobRecord::new(JobId::new());
        store.create(&record).unwrap();
        fs::write(store.layout().status_file(record.uuid), b"{\"uuid\":").unwrap();

        assert!(matches!(
            store.load(record.uuid),
            Err(JobStoreError::Decode { .. })
        ));
    }

    #[test]
    fn concurrent_reader_never_sees_partial_record() {
        let (_dir, store) = test_store();
        let store = Arc::new(store);

        let mut first = JobRecord::new(JobId::new());
        store.create(&first).unwrap();
        let id = first.uuid;
        first.mark_started().unwrap();
        let mut second = first.clone();
        second.mark_finished().unwrap();

        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = store.clone();
            let done = done.clone();
            let (a, b) = (first.clone(), second.clone());
            thread::spawn(move || {
                for i in 0..500 {
                    let record = if i % 2 == 0 { &a } else { &b };
                    store.save(record).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        while !done.load(Ordering::SeqCst) {
            let loaded = store.load(id).expect("reader observed a partial record");
            assert!(
                loaded.status == JobStatus::Created || loaded == first || loaded == second,
                "unexpected record: {loaded:?}"
            );
        }

        writer.join().unwrap();
        assert_eq!(store.load(id).unwrap(), second);
    }

    #[cfg(unix)]
    #[test]
    fn status_record_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = test_store();
        let mut record = JobRecord::new(JobId::new());
        store.create(&record).unwrap();
        record.mark_started().unwrap();
        store.save(&record).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&store.layout().job_dir(record.uuid)), 0o700);
        assert_eq!(mode(&store.layout().status_file(record.uuid)), 0o600);
    }
}

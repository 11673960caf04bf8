//! Drives a job through its lifecycle by running the build executable.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{Level, debug, error, info, warn};

use texapi_core::{DomainError, JobId, JobStatus};

use super::store::{JobStore, JobStoreError};
use crate::storage::StorageLayout;

/// How the build executable is launched.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Program used to run the script (e.g. `/bin/bash`)
    pub interpreter: PathBuf,
    /// Build script, passed as the only argument
    pub script: PathBuf,
    /// Maximum number of builds running at once (unbounded when `None`)
    pub max_concurrent: Option<usize>,
}

impl RunnerConfig {
    pub fn new(interpreter: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            max_concurrent: None,
        }
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = Some(max);
        self
    }
}

/// Runner error. Build failures are not errors; they end in
/// [`JobStatus::Error`].
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Store(#[from] JobStoreError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("build slots closed")]
    SlotsClosed,
}

/// Launches the build executable for a job and persists every status change.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    layout: StorageLayout,
    config: RunnerConfig,
    slots: Option<Arc<Semaphore>>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>, layout: StorageLayout, config: RunnerConfig) -> Self {
        let slots = config
            .max_concurrent
            .map(|max| Arc::new(Semaphore::new(max.max(1))));
        Self {
            store,
            layout,
            config,
            slots,
        }
    }

    /// Run the build for `id` and return the terminal status.
    ///
    /// `created -> started` is committed before the process is spawned;
    /// the exit status then decides between `finished` and `error`.
    pub async fn run(&self, id: JobId) -> Result<JobStatus, RunnerError> {
        let mut record = self.store.load(id)?;

        let _slot = match &self.slots {
            Some(slots) => Some(
                slots
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| RunnerError::SlotsClosed)?,
            ),
            None => None,
        };

        record.mark_started()?;
        self.store.save(&record)?;
        info!(job_id = %id, "started processing");

        match self.execute(id).await {
            Ok(status) if status.success() => {
                record.mark_finished()?;
                info!(job_id = %id, "finished processing");
            }
            Ok(status) => {
                record.mark_error()?;
                error!(job_id = %id, %status, "processing failed");
            }
            Err(e) => {
                record.mark_error()?;
                error!(job_id = %id, error = %e, "unable to launch build executable");
            }
        }

        self.store.save(&record)?;
        Ok(record.status)
    }

    async fn execute(&self, id: JobId) -> std::io::Result<ExitStatus> {
        let mut child = Command::new(&self.config.interpreter)
            .arg(&self.config.script)
            .current_dir(self.layout.job_dir(id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stderr carries the script's trace output (`bash -x`), not just errors.
        let stderr = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(forward_lines(pipe, id, Level::INFO)));
        let stdout = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(forward_lines(pipe, id, Level::DEBUG)));

        let status = child.wait().await?;

        for forwarder in [stderr, stdout].into_iter().flatten() {
            if let Err(e) = forwarder.await {
                warn!(job_id = %id, error = %e, "output forwarder aborted");
            }
        }

        Ok(status)
    }
}

async fn forward_lines<R>(pipe: R, id: JobId, level: Level)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(pipe).split(b'\n');
    loop {
        match lines.next_segment().await {
            Ok(Some(raw)) => {
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim_end_matches('\r');
                if level == Level::INFO {
                    info!(job_id = %id, "{line}");
                } else {
                    debug!(job_id = %id, "{line}");
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(job_id = %id, error = %e, "reading build output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use texapi_core::JobRecord;

    use crate::jobs::store::FsJobStore;

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: StorageLayout,
        store: Arc<FsJobStore>,
        script: PathBuf,
    }

    fn fixture(script_body: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("storage"));
        fs::create_dir_all(layout.root()).unwrap();
        let script = dir.path().join("build.sh");
        fs::write(&script, script_body).unwrap();
        let store = Arc::new(FsJobStore::new(layout.clone()));
        Fixture {
            _dir: dir,
            layout,
            store,
            script,
        }
    }

    fn runner(fx: &Fixture, config: RunnerConfig) -> JobRunner {
        JobRunner::new(fx.store.clone(), fx.layout.clone(), config)
    }

    fn new_job(fx: &Fixture) -> JobId {
        let record = JobRecord::new(JobId::new());
        fx.store.create(&record).unwrap();
        record.uuid
    }

    #[tokio::test]
    async fn successful_build_finishes_in_job_dir() {
        let fx = fixture("echo tracing >&2\nmkdir -p output\necho pdf > output/main.pdf\n");
        let runner = runner(&fx, RunnerConfig::new("/bin/sh", &fx.script));
        let id = new_job(&fx);

        let status = runner.run(id).await.unwrap();

        assert_eq!(status, JobStatus::Finished);
        assert_eq!(fx.store.load(id).unwrap().status, JobStatus::Finished);
        assert!(fx.layout.output_dir(id).join("main.pdf").exists());
    }

    #[tokio::test]
    async fn failing_build_ends_in_error() {
        let fx = fixture("echo failing >&2\nexit 3\n");
        let runner = runner(&fx, RunnerConfig::new("/bin/sh", &fx.script));
        let id = new_job(&fx);

        assert_eq!(runner.run(id).await.unwrap(), JobStatus::Error);
        assert_eq!(fx.store.load(id).unwrap().status, JobStatus::Error);
    }

    #[tokio::test]
    async fn spawn_failure_ends_in_error() {
        let fx = fixture("true\n");
        let runner = runner(
            &fx,
            RunnerConfig::new("/nonexistent/interpreter", &fx.script),
        );
        let id = new_job(&fx);

        assert_eq!(runner.run(id).await.unwrap(), JobStatus::Error);
        assert_eq!(fx.store.load(id).unwrap().status, JobStatus::Error);
    }

    #[tokio::test]
    async fn started_is_persisted_while_running() {
        let fx = fixture("sleep 1\n");
        let runner = runner(&fx, RunnerConfig::new("/bin/sh", &fx.script));
        let id = new_job(&fx);

        let task = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run(id).await }
        });

        let mut saw_started = false;
        for _ in 0..50 {
            if fx.store.load(id).unwrap().status == JobStatus::Started {
                saw_started = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(saw_started);
        assert_eq!(task.await.unwrap().unwrap(), JobStatus::Finished);
    }

    #[tokio::test]
    async fn rerunning_a_terminal_job_is_rejected() {
        let fx = fixture("true\n");
        let runner = runner(&fx, RunnerConfig::new("/bin/sh", &fx.script));
        let id = new_job(&fx);

        runner.run(id).await.unwrap();
        assert!(matches!(runner.run(id).await, Err(RunnerError::Domain(_))));
        assert_eq!(fx.store.load(id).unwrap().status, JobStatus::Finished);
    }

    #[tokio::test]
    async fn unknown_job_is_reported() {
        let fx = fixture("true\n");
        let runner = runner(&fx, RunnerConfig::new("/bin/sh", &fx.script));

        assert!(matches!(
            runner.run(JobId::new()).await,
            Err(RunnerError::Store(JobStoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn concurrency_cap_holds_jobs_in_created() {
        let fx = fixture("sleep 1\n");
        let runner = runner(
            &fx,
            RunnerConfig::new("/bin/sh", &fx.script).with_max_concurrent(1),
        );
        let first = new_job(&fx);
        let second = new_job(&fx);

        let a = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run(first).await }
        });
        for _ in 0..50 {
            if fx.store.load(first).unwrap().status == JobStatus::Started {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let b = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run(second).await }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fx.store.load(first).unwrap().status, JobStatus::Started);
        assert_eq!(fx.store.load(second).unwrap().status, JobStatus::Created);

        assert_eq!(a.await.unwrap().unwrap(), JobStatus::Finished);
        assert_eq!(b.await.unwrap().unwrap(), JobStatus::Finished);
    }
}

//! Fire-and-forget background tasks with failure reporting.

use std::fmt::Display;
use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Spawns detached tasks whose outcome nobody awaits.
///
/// Every task is paired with a supervisor that logs its error or panic, since
/// the request that started it has already been answered.
#[derive(Debug, Clone)]
pub struct TaskSpawner {
    handle: Handle,
}

impl TaskSpawner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawner bound to the runtime of the calling context.
    ///
    /// Panics outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Spawn `fut` and log its outcome under `name`.
    ///
    /// The returned handle resolves once the outcome has been logged.
    pub fn spawn<Fut, T, E>(&self, name: impl Into<String>, fut: Fut) -> JoinHandle<()>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let name = name.into();
        let task = self.handle.spawn(fut);

        self.handle.spawn(async move {
            match task.await {
                Ok(Ok(_)) => debug!(task = %name, "background task completed"),
                Ok(Err(e)) => error!(task = %name, error = %e, "background task failed"),
                Err(e) if e.is_panic() => error!(task = %name, "background task panicked"),
                Err(_) => warn!(task = %name, "background task cancelled"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn runs_task_to_completion() {
        let spawner = TaskSpawner::current();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = ran.clone();
        let supervisor = spawner.spawn("flag", async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, String>(())
        });

        supervisor.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn supervisor_survives_failing_and_panicking_tasks() {
        let spawner = TaskSpawner::current();

        let failed = spawner.spawn("fails", async { Err::<(), _>("boom") });
        failed.await.unwrap();

        let panicked = spawner.spawn("panics", async {
            if true {
                panic!("task panic");
            }
            Ok::<(), String>(())
        });
        panicked.await.unwrap();
    }
}

use std::sync::Arc;

use anyhow::Context;

use texapi_core::{JobId, JobRecord};
use texapi_infra::{
    StorageLayout,
    assets::AssetPackager,
    create_private_dir_all,
    jobs::{FsJobStore, JobRunner, JobStore, JobStoreError, TaskSpawner, WaitPolicy},
    materialize::Materializer,
};

use crate::config::Config;

/// Everything the handlers need, built once at startup from [`Config`].
pub struct AppServices {
    pub layout: StorageLayout,
    pub store: Arc<FsJobStore>,
    pub materializer: Materializer,
    pub runner: JobRunner,
    pub packager: AssetPackager,
    pub wait_policy: WaitPolicy,
    pub spawner: TaskSpawner,
}

impl AppServices {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let layout = StorageLayout::new(&config.storage_dir);
        create_private_dir_all(layout.root())
            .with_context(|| format!("creating storage dir {}", layout.root().display()))?;

        let store = Arc::new(FsJobStore::new(layout.clone()));
        let runner = JobRunner::new(store.clone(), layout.clone(), config.runner_config());

        Ok(Self {
            materializer: Materializer::new(config.default_env.clone()),
            packager: AssetPackager::new(layout.clone()),
            wait_policy: config.wait_policy(),
            spawner: TaskSpawner::current(),
            layout,
            store,
            runner,
        })
    }

    /// Commit the initial record and start the build in the background.
    ///
    /// The caller gets control back immediately; the runner's outcome is only
    /// visible through the status record.
    pub fn start_job(&self, id: JobId) -> Result<(), JobStoreError> {
        self.store.create(&JobRecord::new(id))?;

        let runner = self.runner.clone();
        self.spawner
            .spawn(format!("build {id}"), async move { runner.run(id).await });
        Ok(())
    }
}

//! Service configuration (command-line flags, each also read from the
//! environment).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, ensure};
use clap::Parser;

use texapi_infra::jobs::{DEFAULT_WAIT_BASE, RunnerConfig, WaitPolicy};
use texapi_observability::LogFormat;

/// Default cap on uploaded payloads: 64 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Parser)]
#[command(name = "texapi", version, about = "Build TeX documents over HTTP")]
pub struct Config {
    /// IP/port to listen on (`:3000` listens on all interfaces)
    #[arg(long, env = "LISTEN", default_value = ":3000")]
    pub listen: String,

    /// Where job directories (inputs, status, outputs) are stored
    #[arg(long, env = "STORAGE_DIR", default_value = "/storage")]
    pub storage_dir: PathBuf,

    /// Build script to execute (needs to populate `output/`)
    #[arg(long, env = "SCRIPT", default_value = "/usr/local/bin/tex-build.sh")]
    pub script: PathBuf,

    /// Interpreter the build script is run with
    #[arg(long, env = "INTERPRETER", default_value = "/bin/bash")]
    pub interpreter: PathBuf,

    /// Directory merged into every job before the upload
    #[arg(long, env = "DEFAULT_ENV")]
    pub default_env: Option<PathBuf>,

    /// Largest accepted upload, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Maximum number of builds running at once (unbounded if unset)
    #[arg(long, env = "MAX_CONCURRENT_BUILDS")]
    pub max_concurrent_builds: Option<usize>,

    /// Base of the exponential wait delay, in seconds
    #[arg(long, env = "WAIT_BASE", default_value_t = DEFAULT_WAIT_BASE)]
    pub wait_base: f64,

    /// Cap on a single wait delay, in milliseconds (unbounded if unset)
    #[arg(long, env = "MAX_WAIT_DELAY_MS")]
    pub max_wait_delay_ms: Option<u64>,

    /// Log output format: text or json
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

impl Config {
    /// Socket address to bind; a bare `:port` binds all interfaces.
    pub fn listen_addr(&self) -> String {
        if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        let config = RunnerConfig::new(&self.interpreter, &self.script);
        match self.max_concurrent_builds {
            Some(max) => config.with_max_concurrent(max),
            None => config,
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(
            self.wait_base,
            self.max_wait_delay_ms.map(Duration::from_millis),
        )
    }

    /// Reject values that would make the service misbehave at runtime.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.wait_base.is_finite() && self.wait_base >= 1.0,
            "wait base must be a finite number >= 1, got {}",
            self.wait_base
        );
        ensure!(self.max_upload_bytes > 0, "max upload bytes must be positive");
        ensure!(
            self.max_concurrent_builds != Some(0),
            "max concurrent builds must be positive"
        );

        if let Some(env) = &self.default_env {
            let meta = std::fs::metadata(env)
                .with_context(|| format!("default env {}", env.display()))?;
            ensure!(meta.is_dir(), "default env {} is not a directory", env.display());
        }
        Ok(())
    }
}

//! Polling backoff for clients waiting on a job.

use std::time::Duration;

use texapi_core::JobStatus;

/// Default base of the exponential poll delay, in seconds.
pub const DEFAULT_WAIT_BASE: f64 = 1.5;

/// What a wait request should do for the job's current status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitDecision {
    /// Job still running: sleep `delay`, then send the client back with
    /// `next_loop`.
    Retry { delay: Duration, next_loop: u32 },
    /// Send the client to the download endpoint.
    Download,
    /// Report the failure to the client.
    Failed,
}

/// Server-side exponential backoff: the n-th poll waits `base^n` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    /// Base of the exponent, in seconds
    pub base: f64,
    /// Optional cap on a single delay (unbounded when `None`)
    pub max_delay: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_WAIT_BASE,
            max_delay: None,
        }
    }
}

impl WaitPolicy {
    pub fn new(base: f64, max_delay: Option<Duration>) -> Self {
        Self { base, max_delay }
    }

    /// Delay before answering poll number `loop_count` (1-indexed).
    pub fn delay_for_loop(&self, loop_count: u32) -> Duration {
        let exp = i32::try_from(loop_count).unwrap_or(i32::MAX);
        let secs = self.base.powi(exp);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Decide the response for a poll that arrived with `loop_count`.
    pub fn decide(&self, status: JobStatus, loop_count: u32, log_on_error: bool) -> WaitDecision {
        match status {
            JobStatus::Created | JobStatus::Started => {
                let next_loop = loop_count.saturating_add(1);
                WaitDecision::Retry {
                    delay: self.delay_for_loop(next_loop),
                    next_loop,
                }
            }
            JobStatus::Finished => WaitDecision::Download,
            JobStatus::Error if log_on_error => WaitDecision::Download,
            JobStatus::Error => WaitDecision::Failed,
        }
    }
}

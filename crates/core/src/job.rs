//! Job status state machine and the persisted job record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::JobId;

/// Lifecycle status of a build job.
///
/// The only legal path is `created -> started -> {error | finished}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Input materialized, build not launched yet
    Created,
    /// Build executable launched
    Started,
    /// Build executable failed or could not be launched
    Error,
    /// Build executable exited successfully
    Finished,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Started => "started",
            JobStatus::Error => "error",
            JobStatus::Finished => "finished",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Error | JobStatus::Finished)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (*self, next),
            (JobStatus::Created, JobStatus::Started)
                | (JobStatus::Started, JobStatus::Error)
                | (JobStatus::Started, JobStatus::Finished)
        )
    }

    /// Validate a transition, returning the new status.
    pub fn transition(self, next: JobStatus) -> DomainResult<JobStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::invalid_transition(self, next))
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable status record of a job (`status.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub uuid: JobId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: JobStatus,
}

impl JobRecord {
    /// Create the initial record for a freshly submitted job.
    pub fn new(uuid: JobId) -> Self {
        let now = Utc::now();
        Self {
            uuid,
            created_at: now,
            updated_at: now,
            status: JobStatus::Created,
        }
    }

    /// Move to `next`, bumping `updated_at`. Illegal transitions leave the
    /// record untouched.
    pub fn advance(&mut self, next: JobStatus) -> DomainResult<()> {
        self.status = self.status.transition(next)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_started(&mut self) -> DomainResult<()> {
        self.advance(JobStatus::Started)
    }

    pub fn mark_finished(&mut self) -> DomainResult<()> {
        self.advance(JobStatus::Finished)
    }

    pub fn mark_error(&mut self) -> DomainResult<()> {
        self.advance(JobStatus::Error)
    }
}

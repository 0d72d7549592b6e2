use crate::metrics::TrackerMetrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::task::AbortHandle;
use uuid::Uuid;
use verdict_common::types::{BoilerplateStats, Job, JobId, JobKind, SubjectKey, SubmissionStatus};

/// Identity of one polling session. A subject key can be reused by a later
/// session, so liveness is checked against this, never against the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a session is polling
#[derive(Debug, Clone, PartialEq)]
pub enum PollTarget {
    Submission(Job),
    Boilerplates {
        problem_id: u64,
        expected_languages: u32,
        last_seen: Option<BoilerplateStats>,
    },
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionExit {
    Terminal,
    CapExceeded,
    Cancelled,
}

/// Timer guard - owns the polling task and stops it exactly once.
/// Released explicitly on cancel, or on drop when the session leaves the registry.
pub struct TimerHandle {
    task: Option<AbortHandle>,
    metrics: TrackerMetrics,
}

impl TimerHandle {
    pub fn new(task: AbortHandle, metrics: &TrackerMetrics) -> Self {
        metrics.sessions_started.inc();
        metrics.sessions_active.inc();
        Self {
            task: Some(task),
            metrics: metrics.clone(),
        }
    }

    /// Returns true only on the call that actually released the timer
    pub fn release(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                self.metrics.sessions_released.inc();
                self.metrics.sessions_active.dec();
                true
            }
            None => false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Live tracking record for one non-terminal job
pub struct PollingSession {
    pub id: SessionId,
    pub subject: SubjectKey,
    pub target: PollTarget,
    pub attempt_count: u32,
    pub max_attempts: Option<u32>,
    pub started_at: DateTime<Utc>,
    timer: TimerHandle,
}

impl PollingSession {
    pub fn new(
        id: SessionId,
        subject: SubjectKey,
        target: PollTarget,
        max_attempts: Option<u32>,
        timer: TimerHandle,
    ) -> Self {
        Self {
            id,
            subject,
            target,
            attempt_count: 0,
            max_attempts,
            started_at: Utc::now(),
            timer,
        }
    }

    pub fn cap_reached(&self) -> bool {
        self.max_attempts
            .is_some_and(|max| self.attempt_count >= max)
    }

    pub fn release(&mut self) -> bool {
        self.timer.release()
    }

    pub fn is_released(&self) -> bool {
        self.timer.is_released()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let (job_id, kind, status) = match &self.target {
            PollTarget::Submission(job) => {
                (Some(job.id.clone()), Some(job.kind), Some(job.status.clone()))
            }
            PollTarget::Boilerplates { .. } => (None, None, None),
        };
        SessionSnapshot {
            subject: self.subject.clone(),
            job_id,
            kind,
            status,
            attempt_count: self.attempt_count,
            max_attempts: self.max_attempts,
            started_at: self.started_at,
        }
    }
}

/// Read-only view of a session for the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub subject: SubjectKey,
    pub job_id: Option<JobId>,
    pub kind: Option<JobKind>,
    pub status: Option<SubmissionStatus>,
    pub attempt_count: u32,
    pub max_attempts: Option<u32>,
    pub started_at: DateTime<Utc>,
}

//! Seams between the tracker and the judge.
//!
//! The submitter starts work and hands back a handle; the fetcher reads
//! status for a handle. Neither one polls. Scheduling belongs to the tracker.

use crate::error::{FetchError, SubmissionError};
use async_trait::async_trait;
use serde_json::Value;
use verdict_common::types::{
    BoilerplateStats, Job, JobKind, SubjectKey, SubmissionStatus, SubmitPayload,
};

/// One observation of a job: its status plus the raw body it came with.
/// The body stays untyped so a malformed result can be degraded instead of
/// failing the fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub status: SubmissionStatus,
    pub payload: Value,
}

impl JobSnapshot {
    pub fn new(status: SubmissionStatus, payload: Value) -> Self {
        Self { status, payload }
    }

    /// Read `status` out of a response body
    pub fn from_body(payload: Value) -> Result<Self, FetchError> {
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .map(SubmissionStatus::from)
            .ok_or_else(|| FetchError::Decode("response has no status field".to_string()))?;
        Ok(Self { status, payload })
    }
}

/// What a successful submission returns: the job and the body it came with.
/// Inline run results arrive here already terminal.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub job: Job,
    pub initial: JobSnapshot,
}

#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(
        &self,
        kind: JobKind,
        subject: &SubjectKey,
        payload: &SubmitPayload,
    ) -> Result<SubmitReceipt, SubmissionError>;
}

#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_status(&self, job: &Job) -> Result<JobSnapshot, FetchError>;

    async fn fetch_boilerplates(&self, problem_id: u64) -> Result<BoilerplateStats, FetchError>;
}

/// Everything the tracker needs from the judge
pub trait JudgeApi: JobSubmitter + StatusFetcher {}

impl<T: JobSubmitter + StatusFetcher> JudgeApi for T {}

/// Reject payloads the judge would refuse anyway, before any network call
pub fn check_payload(kind: JobKind, payload: &SubmitPayload) -> Result<(), SubmissionError> {
    if matches!(kind, JobKind::Run | JobKind::Submit) && payload.code.trim().is_empty() {
        return Err(SubmissionError::InvalidPayload(
            "code must not be empty".to_string(),
        ));
    }
    Ok(())
}

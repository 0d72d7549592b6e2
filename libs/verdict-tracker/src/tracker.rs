use crate::api::{check_payload, JudgeApi};
use crate::error::SubmissionError;
use crate::metrics::TrackerMetrics;
use crate::reconciler::{Reconciler, UiEvent, ViewState};
use crate::registry::JobRegistry;
use crate::scheduler;
use crate::session::{PollTarget, PollingSession, SessionId, SessionSnapshot, TimerHandle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info};
use verdict_common::config::ClientConfig;
use verdict_common::types::{JobId, JobKind, SubjectKey, SubmitPayload};

pub(crate) struct TrackerState {
    pub(crate) registry: JobRegistry,
    pub(crate) reconciler: Reconciler,
}

pub(crate) struct TrackerInner {
    pub(crate) api: Arc<dyn JudgeApi>,
    pub(crate) config: ClientConfig,
    pub(crate) metrics: TrackerMetrics,
    state: Mutex<TrackerState>,
}

impl TrackerInner {
    /// Registry and reconciler share one lock; it is never held across an await
    pub(crate) fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Submission tracking for one logical scope (a page, a CLI invocation).
///
/// Submits jobs, polls each one on its own timer until it settles, and
/// reconciles results into a `ViewState`. Side effects are delivered on the
/// event channel returned by `new`. Dropping the tracker cancels every
/// session it owns.
pub struct JobTracker {
    inner: Arc<TrackerInner>,
}

impl JobTracker {
    pub fn new(
        api: Arc<dyn JudgeApi>,
        config: ClientConfig,
        metrics: TrackerMetrics,
    ) -> (Self, UnboundedReceiver<UiEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = TrackerInner {
            api,
            config,
            metrics,
            state: Mutex::new(TrackerState {
                registry: JobRegistry::new(),
                reconciler: Reconciler::new(events_tx),
            }),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            events_rx,
        )
    }

    pub fn metrics(&self) -> &TrackerMetrics {
        &self.inner.metrics
    }

    /// Submit a job and start tracking it under `subject`.
    ///
    /// Any session already tracking `subject` is superseded. A job that comes
    /// back already terminal is reconciled on the spot and never polled.
    pub async fn submit(
        &self,
        kind: JobKind,
        subject: SubjectKey,
        payload: SubmitPayload,
    ) -> Result<JobId, SubmissionError> {
        check_payload(kind, &payload)?;

        let receipt = self.inner.api.submit(kind, &subject, &payload).await?;
        let job = receipt.job;
        let job_id = job.id.clone();

        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.reconciler.job_started(&job);

        if job.status.is_terminal() {
            if state.registry.cancel(&subject).is_some() {
                debug!(subject = %subject, "Inline result superseded a running session");
            }
            state.reconciler.reconcile(&job, &receipt.initial);
            return Ok(job_id);
        }

        let period = self.inner.config.poll_interval;
        let max_attempts = self.inner.config.submission_max_attempts;
        info!(job_id = %job_id, kind = %kind, subject = %subject, "Tracking job");
        self.start_session(state, subject, PollTarget::Submission(job), period, max_attempts);
        Ok(job_id)
    }

    /// Fire-and-forget polling for boilerplate generation. Stops once the
    /// judge reports `expected_languages` generated, or after the attempt cap.
    /// Must be called from within a Tokio runtime.
    pub fn track_boilerplates(&self, problem_id: u64, expected_languages: u32) -> SubjectKey {
        let subject = SubjectKey::boilerplates(problem_id);
        let period = self.inner.config.boilerplate_poll_interval;
        let max_attempts = Some(self.inner.config.boilerplate_max_attempts);

        let mut state = self.inner.lock();
        info!(problem_id, expected_languages, "Tracking boilerplate generation");
        self.start_session(
            &mut state,
            subject.clone(),
            PollTarget::Boilerplates {
                problem_id,
                expected_languages,
                last_seen: None,
            },
            period,
            max_attempts,
        );
        subject
    }

    /// Must be called with the state lock held, so the new task cannot tick
    /// before its session is registered.
    fn start_session(
        &self,
        state: &mut TrackerState,
        subject: SubjectKey,
        target: PollTarget,
        period: Duration,
        max_attempts: Option<u32>,
    ) {
        let session_id = SessionId::new();
        let task = tokio::spawn(scheduler::run_session(
            Arc::clone(&self.inner),
            subject.clone(),
            session_id,
            period,
            max_attempts,
        ));
        let timer = TimerHandle::new(task.abort_handle(), &self.inner.metrics);
        let session = PollingSession::new(session_id, subject, target, max_attempts, timer);

        if let Some(previous) = state.registry.register(session) {
            debug!(previous = %previous, current = %session_id, "Replaced running session");
        }
    }

    /// Stop tracking `subject`. Idempotent; returns whether a session was running.
    pub fn cancel(&self, subject: &SubjectKey) -> bool {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        match state.registry.cancel(subject) {
            Some(_) => {
                state.reconciler.job_abandoned(subject);
                info!(subject = %subject, "Tracking cancelled");
                true
            }
            None => false,
        }
    }

    /// Scope teardown: release every session
    pub fn cancel_all(&self) -> usize {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let cancelled = state.registry.cancel_all();
        for session in &cancelled {
            state.reconciler.job_abandoned(&session.subject);
        }
        if !cancelled.is_empty() {
            info!(count = cancelled.len(), "Cancelled all tracking");
        }
        cancelled.len()
    }

    pub fn is_tracking(&self, subject: &SubjectKey) -> bool {
        self.inner.lock().registry.is_tracking(subject)
    }

    pub fn status_of(&self, subject: &SubjectKey) -> Option<SessionSnapshot> {
        self.inner
            .lock()
            .registry
            .get(subject)
            .map(PollingSession::snapshot)
    }

    pub fn active_sessions(&self) -> Vec<SessionSnapshot> {
        self.inner.lock().registry.snapshots()
    }

    pub fn view(&self) -> ViewState {
        self.inner.lock().reconciler.view().clone()
    }

    pub fn publish_enabled(&self) -> bool {
        self.inner.lock().reconciler.view().publish_enabled()
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<TrackerInner> {
        &self.inner
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

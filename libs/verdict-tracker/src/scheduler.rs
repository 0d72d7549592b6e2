/// Polling Scheduler
///
/// One task per session, one fetch per tick, strictly sequential: the next
/// tick is not awaited until the previous fetch has returned. Every tick
/// re-checks that its session is still registered, both before fetching and
/// before applying the result, under the same lock the registry is mutated
/// with. A result fetched for a cancelled or superseded session is dropped.

use crate::api::JobSnapshot;
use crate::error::FetchError;
use crate::session::{PollTarget, SessionExit, SessionId};
use crate::tracker::TrackerInner;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};
use verdict_common::config::MIN_POLL_INTERVAL;
use verdict_common::types::{BoilerplateStats, SubjectKey};

/// What one status check produced
#[derive(Debug)]
pub(crate) enum Probe {
    Submission(JobSnapshot),
    Boilerplates(BoilerplateStats),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Exit(SessionExit),
}

#[instrument(skip_all, fields(subject = %subject, session = %session_id))]
pub(crate) async fn run_session(
    inner: Arc<TrackerInner>,
    subject: SubjectKey,
    session_id: SessionId,
    period: Duration,
    max_attempts: Option<u32>,
) -> SessionExit {
    // the config fields are public and can bypass with_poll_interval
    if period < MIN_POLL_INTERVAL {
        warn!(interval_ms = period.as_millis() as u64, "Poll interval below floor, raising it");
    }
    let period = period.max(MIN_POLL_INTERVAL);

    // first check one period after submission, like a UI interval would
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(interval_ms = period.as_millis() as u64, ?max_attempts, "Polling started");

    loop {
        ticker.tick().await;

        let Some((attempt, target)) = begin_tick(&inner, &subject, session_id) else {
            debug!("Session no longer registered, stopping");
            return SessionExit::Cancelled;
        };

        inner.metrics.polls.inc();
        let fetched = match &target {
            PollTarget::Submission(job) => inner.api.fetch_status(job).await.map(Probe::Submission),
            PollTarget::Boilerplates { problem_id, .. } => inner
                .api
                .fetch_boilerplates(*problem_id)
                .await
                .map(Probe::Boilerplates),
        };

        match settle(&inner, &subject, session_id, attempt, fetched) {
            Step::Continue => continue,
            Step::Exit(exit) => return exit,
        }
    }
}

/// Liveness check plus attempt bookkeeping, before the fetch goes out
fn begin_tick(
    inner: &TrackerInner,
    subject: &SubjectKey,
    session_id: SessionId,
) -> Option<(u32, PollTarget)> {
    let mut state = inner.lock();
    let session = state.registry.current_mut(subject, session_id)?;
    session.attempt_count += 1;
    Some((session.attempt_count, session.target.clone()))
}

/// Apply one fetch result to the registry and, when the job is done, to the
/// reconciler. Both happen under one lock so a concurrent cancel lands either
/// entirely before (result dropped) or entirely after (nothing left to cancel).
pub(crate) fn settle(
    inner: &TrackerInner,
    subject: &SubjectKey,
    session_id: SessionId,
    attempt: u32,
    fetched: Result<Probe, FetchError>,
) -> Step {
    let mut guard = inner.lock();
    let state = &mut *guard;

    let Some(session) = state.registry.current_mut(subject, session_id) else {
        inner.metrics.stale_discarded.inc();
        debug!(attempt, "Discarding result for a session that is gone");
        return Step::Exit(SessionExit::Cancelled);
    };

    match fetched {
        Err(e) => {
            inner.metrics.fetch_errors.inc();
            warn!(attempt, error = %e, "Status check failed, retrying next tick");
        }
        Ok(Probe::Submission(snapshot)) => {
            if let PollTarget::Submission(job) = &mut session.target {
                if !job.advance(snapshot.status.clone()) {
                    debug!(attempt, current = %job.status, observed = %snapshot.status, "Ignoring backwards status");
                }

                if job.status.is_terminal() {
                    let job = job.clone();
                    state.registry.remove_current(subject, session_id);
                    state.reconciler.reconcile(&job, &snapshot);
                    return Step::Exit(SessionExit::Terminal);
                }
                debug!(attempt, job_id = %job.id, status = %job.status, "Job still running");
            }
        }
        Ok(Probe::Boilerplates(stats)) => {
            if let PollTarget::Boilerplates {
                problem_id,
                expected_languages,
                last_seen,
            } = &mut session.target
            {
                let problem_id = *problem_id;
                let done = stats.total_languages >= *expected_languages;
                debug!(attempt, generated = stats.total_languages, expected = *expected_languages, "Boilerplate progress");
                *last_seen = Some(stats.clone());

                if done {
                    state.registry.remove_current(subject, session_id);
                    state.reconciler.boilerplates_settled(problem_id, Some(stats), true);
                    return Step::Exit(SessionExit::Terminal);
                }
            }
        }
    }

    // a session only reaches here when it is still registered and not terminal
    let Some(session) = state.registry.current_mut(subject, session_id) else {
        return Step::Exit(SessionExit::Cancelled);
    };
    if !session.cap_reached() {
        return Step::Continue;
    }

    info!(attempt, "Attempt budget spent, stopping without a terminal status");
    let Some(session) = state.registry.remove_current(subject, session_id) else {
        return Step::Exit(SessionExit::Cancelled);
    };
    match session.target {
        PollTarget::Submission(job) => state.reconciler.submission_gave_up(&job),
        // partial counts are still reported; generation may finish after we stop looking
        PollTarget::Boilerplates {
            problem_id,
            last_seen,
            ..
        } => state.reconciler.boilerplates_settled(problem_id, last_seen, false),
    }
    Step::Exit(SessionExit::CapExceeded)
}

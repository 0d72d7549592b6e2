//! Result Reconciler - terminal job outcomes into UI-facing state.
//!
//! Classification is a pure function of the job and its final snapshot.
//! Side effects depend on the job kind: runs replace the transient "last run",
//! submissions append to history, validations flip a per-language flag that
//! gates publishing.

use crate::api::JobSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use verdict_common::types::{
    BoilerplateStats, Job, JobId, JobKind, SubjectKey, SubmissionResult, SubmissionStatus,
    TestCaseResult,
};

pub const PROBLEM_LANGUAGES_QUERY: &str = "problem-languages";
pub const USER_SUBMISSIONS_QUERY: &str = "user-submissions";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure { reason: String },
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub job_id: JobId,
    pub kind: JobKind,
    pub subject: SubjectKey,
    pub status: SubmissionStatus,
    pub verdict: Verdict,
    /// None when the result body could not be read
    pub passed: Option<u32>,
    pub total: Option<u32>,
    pub cases: Vec<TestCaseResult>,
    pub error_message: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl Outcome {
    /// `" (3/5 passed)"`, or empty when there is nothing to count
    pub fn pass_rate(&self) -> String {
        match (self.passed, self.total) {
            (Some(passed), Some(total)) if total > 0 => format!(" ({}/{} passed)", passed, total),
            _ => String::new(),
        }
    }

    /// Text shown next to a failed result: the judge's message, else the status
    pub fn failure_text(&self) -> String {
        self.error_message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.status.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ValidationState {
    InProgress,
    Passed,
    Failed { reason: String },
    /// Tracking stopped before a verdict arrived; still blocks publishing
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Success,
    Error,
}

/// Side effects for the UI layer to act on
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    Notify { level: NotifyLevel, message: String },
    Invalidate { query: String },
    Navigate { route: String },
    Settled { outcome: Outcome },
    PublishReadiness { enabled: bool },
    BoilerplatesReady { problem_id: u64, languages: Vec<String>, confirmed: bool },
}

/// Reconciled state the UI renders from
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub last_run: Option<Outcome>,
    pub history: Vec<Outcome>,
    pub validations: BTreeMap<SubjectKey, ValidationState>,
    pub boilerplates: BTreeMap<u64, BoilerplateStats>,
}

impl ViewState {
    /// Publishing unlocks only once every tracked language has passed
    pub fn publish_enabled(&self) -> bool {
        !self.validations.is_empty()
            && self
                .validations
                .values()
                .all(|state| *state == ValidationState::Passed)
    }

    pub fn validation(&self, subject: &SubjectKey) -> Option<&ValidationState> {
        self.validations.get(subject)
    }
}

/// Map a terminal job onto an outcome without touching any state.
/// A result body that cannot be read degrades to the bare status.
pub fn classify(job: &Job, snapshot: &JobSnapshot) -> Outcome {
    let status = snapshot.status.clone();
    let verdict = if status.is_success() {
        Verdict::Success
    } else {
        Verdict::Failure {
            reason: status.to_string(),
        }
    };

    let result = match serde_json::from_value::<SubmissionResult>(snapshot.payload.clone()) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(job_id = %job.id, status = %status, error = %e, "Unreadable result body, showing status only");
            None
        }
    };

    let (passed, total, cases, error_message) = match result {
        Some(r) => (
            Some(r.passed_test_cases),
            Some(r.total_test_cases),
            r.test_case_results,
            r.error_message,
        ),
        None => (None, None, Vec::new(), None),
    };

    Outcome {
        job_id: job.id.clone(),
        kind: job.kind,
        subject: job.subject.clone(),
        status,
        verdict,
        passed,
        total,
        cases,
        error_message,
        finished_at: Utc::now(),
    }
}

pub struct Reconciler {
    view: ViewState,
    events: UnboundedSender<UiEvent>,
    /// Verdicts replaced by an in-progress re-validation, restored if it is abandoned
    replaced: HashMap<SubjectKey, ValidationState>,
}

impl Reconciler {
    pub fn new(events: UnboundedSender<UiEvent>) -> Self {
        Self {
            view: ViewState::default(),
            events,
            replaced: HashMap::new(),
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    fn emit(&self, event: UiEvent) {
        // a closed receiver means the UI is gone; nothing left to update
        let _ = self.events.send(event);
    }

    fn notify(&self, level: NotifyLevel, message: String) {
        self.emit(UiEvent::Notify { level, message });
    }

    /// A job was accepted by the judge and is about to be tracked
    pub fn job_started(&mut self, job: &Job) {
        match job.kind {
            JobKind::Run | JobKind::Submit => {
                self.view.last_run = None;
            }
            JobKind::Validate => {
                let previous = self
                    .view
                    .validations
                    .insert(job.subject.clone(), ValidationState::InProgress);
                if let Some(verdict @ (ValidationState::Passed | ValidationState::Failed { .. })) =
                    previous
                {
                    self.replaced.insert(job.subject.clone(), verdict);
                }
                self.emit(UiEvent::PublishReadiness { enabled: false });
            }
        }
    }

    /// Tracking stopped without a result. An in-progress language falls back
    /// to its previous verdict, or to `Abandoned`, and keeps gating publish.
    pub fn job_abandoned(&mut self, subject: &SubjectKey) {
        if self.view.validations.get(subject) != Some(&ValidationState::InProgress) {
            return;
        }
        let restored = self
            .replaced
            .remove(subject)
            .unwrap_or(ValidationState::Abandoned);
        self.view.validations.insert(subject.clone(), restored);
        self.emit(UiEvent::PublishReadiness {
            enabled: self.view.publish_enabled(),
        });
    }

    /// Apply a terminal result
    pub fn reconcile(&mut self, job: &Job, snapshot: &JobSnapshot) -> Outcome {
        let outcome = classify(job, snapshot);
        info!(
            job_id = %outcome.job_id,
            kind = %outcome.kind,
            subject = %outcome.subject,
            status = %outcome.status,
            passed = ?outcome.passed,
            total = ?outcome.total,
            "Job settled"
        );

        match job.kind {
            JobKind::Run => self.settle_run(&outcome),
            JobKind::Submit => self.settle_submit(&outcome),
            JobKind::Validate => self.settle_validate(&outcome),
        }

        self.emit(UiEvent::Settled {
            outcome: outcome.clone(),
        });
        outcome
    }

    fn settle_run(&mut self, outcome: &Outcome) {
        if outcome.verdict.is_success() {
            self.notify(NotifyLevel::Success, "All test cases passed!".to_string());
        } else {
            self.notify(NotifyLevel::Error, format!("Failed: {}", outcome.status));
        }
        self.view.last_run = Some(outcome.clone());
    }

    fn settle_submit(&mut self, outcome: &Outcome) {
        if outcome.verdict.is_success() {
            self.notify(NotifyLevel::Success, "Accepted!".to_string());
        } else {
            self.notify(
                NotifyLevel::Error,
                format!("Failed: {}{}", outcome.status, outcome.pass_rate()),
            );
        }
        self.view.history.push(outcome.clone());
        self.emit(UiEvent::Invalidate {
            query: USER_SUBMISSIONS_QUERY.to_string(),
        });
        self.emit(UiEvent::Navigate {
            route: format!("/submissions/{}", outcome.job_id),
        });
    }

    fn settle_validate(&mut self, outcome: &Outcome) {
        self.replaced.remove(&outcome.subject);
        let state = if outcome.verdict.is_success() {
            self.notify(
                NotifyLevel::Success,
                format!("{}: Validation passed!{}", outcome.subject, outcome.pass_rate()),
            );
            ValidationState::Passed
        } else {
            self.notify(
                NotifyLevel::Error,
                format!(
                    "{}: Validation failed: {}{}",
                    outcome.subject,
                    outcome.status,
                    outcome.pass_rate()
                ),
            );
            ValidationState::Failed {
                reason: outcome.failure_text(),
            }
        };

        self.view.validations.insert(outcome.subject.clone(), state);
        self.emit(UiEvent::Invalidate {
            query: PROBLEM_LANGUAGES_QUERY.to_string(),
        });
        self.emit(UiEvent::PublishReadiness {
            enabled: self.view.publish_enabled(),
        });
    }

    /// A capped submission session ran out of attempts. Not a failure:
    /// the job may still finish on the server.
    pub fn submission_gave_up(&mut self, job: &Job) {
        self.job_abandoned(&job.subject);
        self.notify(
            NotifyLevel::Info,
            format!("Job {} is still {}; stopped waiting", job.id, job.status),
        );
    }

    /// Boilerplate generation either reached its target or ran out of attempts
    pub fn boilerplates_settled(
        &mut self,
        problem_id: u64,
        stats: Option<BoilerplateStats>,
        confirmed: bool,
    ) {
        let languages = stats
            .as_ref()
            .map(|s| s.languages.clone())
            .unwrap_or_default();
        if let Some(stats) = stats {
            self.view.boilerplates.insert(problem_id, stats);
        }
        if confirmed {
            self.notify(
                NotifyLevel::Success,
                format!("Boilerplates generated for problem {}", problem_id),
            );
        } else {
            self.notify(
                NotifyLevel::Info,
                format!(
                    "Stopped waiting for boilerplates on problem {}; {} language(s) ready so far",
                    problem_id,
                    languages.len()
                ),
            );
        }
        self.emit(UiEvent::BoilerplatesReady {
            problem_id,
            languages,
            confirmed,
        });
    }
}

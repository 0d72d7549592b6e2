/// Scheduler and registry behaviour against a scripted judge.
///
/// All tests run on a paused clock: the runtime jumps straight to the next
/// timer whenever every task is idle, so a 2s cadence costs nothing.

#[cfg(test)]
mod polling_tests {
    use crate::api::{JobSnapshot, JobSubmitter, StatusFetcher, SubmitReceipt};
    use crate::error::{FetchError, SubmissionError};
    use crate::metrics::TrackerMetrics;
    use crate::reconciler::{NotifyLevel, Outcome, UiEvent, ValidationState, Verdict};
    use crate::scheduler::{settle, Probe, Step};
    use crate::session::{SessionExit, SessionId};
    use crate::tracker::JobTracker;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::Notify;
    use verdict_common::config::ClientConfig;
    use verdict_common::types::{
        BoilerplateStats, Job, JobId, JobKind, SubjectKey, SubmissionStatus, SubmitPayload,
    };

    #[derive(Clone)]
    enum Reply {
        Status(Value),
        Fail,
    }

    fn pending() -> Reply {
        Reply::Status(json!({ "status": "Pending" }))
    }

    fn finished(status: &str, passed: u32, total: u32) -> Reply {
        Reply::Status(json!({
            "status": status,
            "passed_test_cases": passed,
            "total_test_cases": total,
        }))
    }

    enum SubmitReply {
        Queued,
        Inline(Value),
        Reject(u16, &'static str),
    }

    /// Judge whose answers are scripted per job id. Ids are handed out 1, 2, 3...
    /// An exhausted script keeps answering Pending.
    #[derive(Default)]
    struct ScriptedJudge {
        next_id: AtomicI64,
        submit_replies: Mutex<VecDeque<SubmitReply>>,
        scripts: Mutex<HashMap<i64, VecDeque<Reply>>>,
        fetches: Mutex<HashMap<i64, usize>>,
        boilerplate_script: Mutex<VecDeque<u32>>,
        boilerplate_fetches: Mutex<usize>,
        gated: Mutex<Option<i64>>,
        entered: Notify,
        release: Notify,
    }

    impl ScriptedJudge {
        fn script(&self, job: i64, replies: Vec<Reply>) {
            self.scripts.lock().unwrap().insert(job, replies.into());
        }

        fn on_submit(&self, reply: SubmitReply) {
            self.submit_replies.lock().unwrap().push_back(reply);
        }

        fn fetches(&self, job: i64) -> usize {
            self.fetches.lock().unwrap().get(&job).copied().unwrap_or(0)
        }

        fn gate(&self, job: i64) {
            *self.gated.lock().unwrap() = Some(job);
        }
    }

    #[async_trait]
    impl JobSubmitter for ScriptedJudge {
        async fn submit(
            &self,
            kind: JobKind,
            subject: &SubjectKey,
            payload: &SubmitPayload,
        ) -> Result<SubmitReceipt, SubmissionError> {
            let reply = self
                .submit_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(SubmitReply::Queued);

            let body = match reply {
                SubmitReply::Queued => json!({ "status": "Pending" }),
                SubmitReply::Inline(body) => body,
                SubmitReply::Reject(status, message) => {
                    return Err(SubmissionError::Rejected {
                        status,
                        message: message.to_string(),
                    })
                }
            };

            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let snapshot = JobSnapshot::from_body(body).unwrap();
            let mut job = Job::new(JobId::Numeric(id), kind, subject.clone(), payload.problem_id);
            job.advance(snapshot.status.clone());
            Ok(SubmitReceipt { job, initial: snapshot })
        }
    }

    #[async_trait]
    impl StatusFetcher for ScriptedJudge {
        async fn fetch_status(&self, job: &Job) -> Result<JobSnapshot, FetchError> {
            let JobId::Numeric(id) = job.id else {
                return Err(FetchError::Status(404));
            };
            *self.fetches.lock().unwrap().entry(id).or_default() += 1;

            let gated = *self.gated.lock().unwrap() == Some(id);
            if gated {
                self.entered.notify_one();
                self.release.notified().await;
            }

            let reply = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&id)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(pending);

            match reply {
                Reply::Status(body) => JobSnapshot::from_body(body),
                Reply::Fail => Err(FetchError::Transport("connection reset".to_string())),
            }
        }

        async fn fetch_boilerplates(&self, _problem_id: u64) -> Result<BoilerplateStats, FetchError> {
            *self.boilerplate_fetches.lock().unwrap() += 1;
            let total = self
                .boilerplate_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(1);
            Ok(BoilerplateStats {
                total_languages: total,
                languages: vec!["python".to_string(); total as usize],
            })
        }
    }

    fn tracker(judge: &Arc<ScriptedJudge>) -> (JobTracker, UnboundedReceiver<UiEvent>) {
        tracker_with(judge, ClientConfig::default())
    }

    fn tracker_with(
        judge: &Arc<ScriptedJudge>,
        config: ClientConfig,
    ) -> (JobTracker, UnboundedReceiver<UiEvent>) {
        JobTracker::new(judge.clone(), config, TrackerMetrics::new().unwrap())
    }

    fn validate(language_id: u64) -> SubmitPayload {
        SubmitPayload {
            problem_id: 42,
            language_id,
            code: String::new(),
        }
    }

    fn code(source: &str) -> SubmitPayload {
        SubmitPayload {
            problem_id: 42,
            language_id: 1,
            code: source.to_string(),
        }
    }

    async fn next_settled(rx: &mut UnboundedReceiver<UiEvent>) -> Outcome {
        settled_with_events(rx).await.0
    }

    /// Waits for the next `Settled`, returning the events that preceded it
    async fn settled_with_events(rx: &mut UnboundedReceiver<UiEvent>) -> (Outcome, Vec<UiEvent>) {
        let mut seen = Vec::new();
        loop {
            match rx.recv().await {
                Some(UiEvent::Settled { outcome }) => return (outcome, seen),
                Some(event) => seen.push(event),
                None => panic!("event channel closed"),
            }
        }
    }

    fn drain(rx: &mut UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_settles_after_two_pending_polls() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.script(1, vec![pending(), pending(), finished("Accepted", 5, 5)]);
        let (tracker, mut rx) = tracker(&judge);
        let python = SubjectKey::from("python");

        let id = tracker.submit(JobKind::Validate, python.clone(), validate(1)).await.unwrap();
        assert_eq!(id, JobId::Numeric(1));
        assert!(tracker.is_tracking(&python));

        let outcome = next_settled(&mut rx).await;
        assert_eq!(outcome.verdict, Verdict::Success);
        assert_eq!(outcome.passed, Some(5));
        assert_eq!(outcome.total, Some(5));

        // nothing polls after the terminal status
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(judge.fetches(1), 3);
        assert!(!tracker.is_tracking(&python));
        assert_eq!(tracker.view().validation(&python), Some(&ValidationState::Passed));
        assert_eq!(tracker.metrics().sessions_released.get(), 1);
        assert_eq!(tracker.metrics().sessions_active.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_languages_settle_independently() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.script(1, vec![pending(), finished("Accepted", 4, 4)]);
        judge.script(2, vec![pending(), pending(), finished("Wrong Answer", 2, 4)]);
        let (tracker, mut rx) = tracker(&judge);
        let python = SubjectKey::from("python");
        let cpp = SubjectKey::from("cpp");

        tracker.submit(JobKind::Validate, python.clone(), validate(1)).await.unwrap();
        tracker.submit(JobKind::Validate, cpp.clone(), validate(2)).await.unwrap();
        assert_eq!(tracker.active_sessions().len(), 2);

        let (first, _) = settled_with_events(&mut rx).await;
        let (second, events) = settled_with_events(&mut rx).await;
        assert_eq!(first.subject, python);
        assert_eq!(second.subject, cpp);

        let view = tracker.view();
        assert_eq!(view.validation(&python), Some(&ValidationState::Passed));
        assert_eq!(
            view.validation(&cpp),
            Some(&ValidationState::Failed {
                reason: "Wrong Answer".to_string()
            })
        );
        assert!(!view.publish_enabled());
        assert!(tracker.active_sessions().is_empty());
        assert!(events.contains(&UiEvent::PublishReadiness { enabled: false }));
        assert!(events.contains(&UiEvent::Invalidate {
            query: "problem-languages".to_string()
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_unlocks_when_all_languages_pass() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.script(1, vec![finished("Accepted", 3, 3)]);
        judge.script(2, vec![pending(), finished("Accepted", 3, 3)]);
        let (tracker, mut rx) = tracker(&judge);

        tracker.submit(JobKind::Validate, "python".into(), validate(1)).await.unwrap();
        tracker.submit(JobKind::Validate, "cpp".into(), validate(2)).await.unwrap();

        let (_, events) = settled_with_events(&mut rx).await;
        assert!(!tracker.publish_enabled());
        assert!(events.contains(&UiEvent::PublishReadiness { enabled: false }));

        let (_, events) = settled_with_events(&mut rx).await;
        assert!(tracker.publish_enabled());
        assert_eq!(events.last(), Some(&UiEvent::PublishReadiness { enabled: true }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_job_supersedes_session_for_same_subject() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.script(2, vec![finished("Accepted", 1, 1)]);
        let (tracker, mut rx) = tracker(&judge);
        let python = SubjectKey::from("python");

        tracker.submit(JobKind::Validate, python.clone(), validate(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(4500)).await;
        let polled_before = judge.fetches(1);
        assert_eq!(polled_before, 2);

        tracker.submit(JobKind::Validate, python.clone(), validate(1)).await.unwrap();
        assert_eq!(tracker.active_sessions().len(), 1);
        assert_eq!(tracker.metrics().sessions_released.get(), 1);
        assert_eq!(tracker.status_of(&python).unwrap().job_id, Some(JobId::Numeric(2)));

        let outcome = next_settled(&mut rx).await;
        assert_eq!(outcome.job_id, JobId::Numeric(2));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(judge.fetches(1), polled_before);
        assert_eq!(tracker.metrics().sessions_released.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_arriving_after_cancel_is_ignored() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.script(1, vec![finished("Accepted", 5, 5)]);
        judge.gate(1);
        let (tracker, mut rx) = tracker(&judge);
        let python = SubjectKey::from("python");

        tracker.submit(JobKind::Validate, python.clone(), validate(1)).await.unwrap();
        judge.entered.notified().await;

        assert!(tracker.cancel(&python));
        judge.release.notify_one();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(!drain(&mut rx).iter().any(|e| matches!(e, UiEvent::Settled { .. })));
        assert_eq!(tracker.view().validation(&python), Some(&ValidationState::Abandoned));
        assert!(tracker.view().history.is_empty());
        assert_eq!(judge.fetches(1), 1);
        assert_eq!(tracker.metrics().sessions_active.get(), 0);
    }

    #[tokio::test]
    async fn test_stale_tick_does_not_touch_state() {
        let judge = Arc::new(ScriptedJudge::default());
        let (tracker, mut rx) = tracker(&judge);
        let python = SubjectKey::from("python");
        tracker.submit(JobKind::Validate, python.clone(), validate(1)).await.unwrap();
        drain(&mut rx);

        let accepted = JobSnapshot::new(
            SubmissionStatus::Accepted,
            json!({ "status": "Accepted", "passed_test_cases": 1, "total_test_cases": 1 }),
        );
        let step = settle(
            tracker.inner(),
            &python,
            SessionId::new(),
            1,
            Ok(Probe::Submission(accepted)),
        );

        assert_eq!(step, Step::Exit(SessionExit::Cancelled));
        assert_eq!(tracker.metrics().stale_discarded.get(), 1);
        assert!(tracker.is_tracking(&python));
        assert_eq!(tracker.view().validation(&python), Some(&ValidationState::InProgress));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_language_keeps_publish_locked() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.script(1, vec![finished("Accepted", 5, 5)]);
        let (tracker, mut rx) = tracker(&judge);
        let python = SubjectKey::from("python");
        let cpp = SubjectKey::from("cpp");

        tracker.submit(JobKind::Validate, python.clone(), validate(1)).await.unwrap();
        tracker.submit(JobKind::Validate, cpp.clone(), validate(2)).await.unwrap();
        let (settled, _) = settled_with_events(&mut rx).await;
        assert_eq!(settled.subject, python);
        assert!(!tracker.publish_enabled());

        assert!(tracker.cancel(&cpp));

        let view = tracker.view();
        assert_eq!(view.validation(&python), Some(&ValidationState::Passed));
        assert_eq!(view.validation(&cpp), Some(&ValidationState::Abandoned));
        assert!(!view.publish_enabled());
        assert_eq!(drain(&mut rx), vec![UiEvent::PublishReadiness { enabled: false }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_revalidation_keeps_earlier_pass() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.script(1, vec![finished("Accepted", 5, 5)]);
        let (tracker, mut rx) = tracker(&judge);
        let python = SubjectKey::from("python");

        tracker.submit(JobKind::Validate, python.clone(), validate(1)).await.unwrap();
        next_settled(&mut rx).await;
        assert!(tracker.publish_enabled());

        tracker.submit(JobKind::Validate, python.clone(), validate(1)).await.unwrap();
        assert!(!tracker.publish_enabled());
        drain(&mut rx);

        assert!(tracker.cancel(&python));
        assert_eq!(tracker.view().validation(&python), Some(&ValidationState::Passed));
        assert!(tracker.publish_enabled());
        assert_eq!(drain(&mut rx), vec![UiEvent::PublishReadiness { enabled: true }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_still_polls_and_releases() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.script(1, vec![pending(), finished("Accepted", 1, 1)]);
        // set directly, bypassing the builder's floor
        let mut config = ClientConfig::default();
        config.poll_interval = Duration::ZERO;
        let (tracker, mut rx) = tracker_with(&judge, config);
        let slot = SubjectKey::workbench();

        tracker.submit(JobKind::Submit, slot.clone(), code("print(1)")).await.unwrap();
        let outcome = next_settled(&mut rx).await;

        assert_eq!(outcome.verdict, Verdict::Success);
        assert_eq!(judge.fetches(1), 2);
        assert!(!tracker.is_tracking(&slot));
        assert_eq!(tracker.metrics().sessions_released.get(), 1);
        assert_eq!(tracker.metrics().sessions_active.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let judge = Arc::new(ScriptedJudge::default());
        let (tracker, _rx) = tracker(&judge);
        let slot = SubjectKey::workbench();

        tracker.submit(JobKind::Submit, slot.clone(), code("print(1)")).await.unwrap();
        assert!(tracker.cancel(&slot));
        assert!(!tracker.cancel(&slot));
        assert!(!tracker.cancel(&SubjectKey::from("never-tracked")));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(judge.fetches(1), 0);
        assert_eq!(tracker.metrics().sessions_released.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_fetch_errors_do_not_end_polling() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.script(
            1,
            vec![Reply::Fail, Reply::Fail, pending(), finished("Runtime Error", 0, 3)],
        );
        let (tracker, mut rx) = tracker(&judge);

        tracker
            .submit(JobKind::Submit, SubjectKey::workbench(), code("boom()"))
            .await
            .unwrap();
        let outcome = next_settled(&mut rx).await;

        assert_eq!(
            outcome.verdict,
            Verdict::Failure {
                reason: "Runtime Error".to_string()
            }
        );
        assert_eq!(judge.fetches(1), 4);
        assert_eq!(tracker.metrics().fetch_errors.get(), 2);
        assert_eq!(tracker.view().history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boilerplate_cap_is_soft_success() {
        let judge = Arc::new(ScriptedJudge::default());
        let (tracker, mut rx) = tracker(&judge);

        let subject = tracker.track_boilerplates(42, 5);
        let ready = loop {
            match rx.recv().await {
                Some(UiEvent::BoilerplatesReady { confirmed, languages, .. }) => break (confirmed, languages),
                Some(UiEvent::Notify { level, .. }) => assert_eq!(level, NotifyLevel::Info),
                Some(_) => {}
                None => panic!("event channel closed"),
            }
        };

        assert_eq!(ready, (false, vec!["python".to_string()]));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(*judge.boilerplate_fetches.lock().unwrap(), 15);
        assert!(!tracker.is_tracking(&subject));
        assert_eq!(tracker.metrics().sessions_released.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boilerplates_confirmed_when_target_reached() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.boilerplate_script.lock().unwrap().extend([1, 2, 3]);
        let (tracker, mut rx) = tracker(&judge);

        tracker.track_boilerplates(42, 3);
        let confirmed = loop {
            if let Some(UiEvent::BoilerplatesReady { confirmed, .. }) = rx.recv().await {
                break confirmed;
            }
        };

        assert!(confirmed);
        assert_eq!(*judge.boilerplate_fetches.lock().unwrap(), 3);
        assert_eq!(tracker.view().boilerplates[&42].total_languages, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capped_submission_gives_up_quietly() {
        let judge = Arc::new(ScriptedJudge::default());
        let config = ClientConfig::default().with_submission_max_attempts(Some(3));
        let (tracker, mut rx) = tracker_with(&judge, config);
        let python = SubjectKey::from("python");

        tracker.submit(JobKind::Validate, python.clone(), validate(1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(judge.fetches(1), 3);
        assert!(!tracker.is_tracking(&python));
        assert_eq!(tracker.view().validation(&python), Some(&ValidationState::Abandoned));

        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, UiEvent::Settled { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, UiEvent::Notify { level: NotifyLevel::Info, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_submission_starts_nothing() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.on_submit(SubmitReply::Reject(422, "unsupported language"));
        let (tracker, _rx) = tracker(&judge);

        let err = tracker
            .submit(JobKind::Submit, SubjectKey::workbench(), code("x"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::Rejected { status: 422, .. }));
        assert!(!tracker.is_tracking(&SubjectKey::workbench()));
        assert_eq!(tracker.metrics().sessions_started.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_code_rejected_before_network() {
        let judge = Arc::new(ScriptedJudge::default());
        let (tracker, _rx) = tracker(&judge);

        let err = tracker
            .submit(JobKind::Run, SubjectKey::workbench(), code("  \n"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::InvalidPayload(_)));
        assert_eq!(judge.next_id.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_run_result_is_never_polled() {
        let judge = Arc::new(ScriptedJudge::default());
        judge.on_submit(SubmitReply::Inline(json!({
            "status": "Accepted",
            "passed_test_cases": 2,
            "total_test_cases": 2,
            "results": [
                { "input": "[1]", "expected_output": "1", "actual_output": "1", "status": "Accepted", "is_sample": true }
            ]
        })));
        let (tracker, mut rx) = tracker(&judge);

        tracker
            .submit(JobKind::Run, SubjectKey::workbench(), code("print(1)"))
            .await
            .unwrap();
        let outcome = next_settled(&mut rx).await;

        assert_eq!(outcome.cases.len(), 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(judge.fetches(1), 0);
        assert_eq!(tracker.metrics().sessions_started.get(), 0);
        assert!(tracker.view().last_run.is_some());
        assert!(tracker.view().history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_tracker_releases_every_session() {
        let judge = Arc::new(ScriptedJudge::default());
        let (tracker, _rx) = tracker(&judge);
        let metrics = tracker.metrics().clone();

        tracker.submit(JobKind::Validate, "python".into(), validate(1)).await.unwrap();
        tracker.submit(JobKind::Validate, "cpp".into(), validate(2)).await.unwrap();
        tracker.track_boilerplates(42, 2);
        assert_eq!(metrics.sessions_active.get(), 3);

        drop(tracker);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(metrics.sessions_active.get(), 0);
        assert_eq!(metrics.sessions_released.get(), 3);
        assert_eq!(judge.fetches(1) + judge.fetches(2), 0);
    }
}

// CLI commands: submit work to the judge and follow it until it settles
use anyhow::{bail, Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;
use verdict_common::config::ClientConfig;
use verdict_common::types::{JobKind, Parameter, SubjectKey, SubmitPayload};
use verdict_tracker::importer::{generate_template, import_test_cases};
use verdict_tracker::{
    JobTracker, JudgeClient, NotifyLevel, Outcome, TrackerMetrics, UiEvent, ValidationState,
};

fn build_tracker(
    config: &ClientConfig,
    registry: &Registry,
) -> Result<(JobTracker, UnboundedReceiver<UiEvent>)> {
    let client = JudgeClient::new(config.clone()).context("Failed to build HTTP client")?;
    let metrics = TrackerMetrics::new().context("Failed to create tracker metrics")?;
    metrics
        .register(registry)
        .context("Failed to register tracker metrics")?;
    Ok(JobTracker::new(Arc::new(client), config.clone(), metrics))
}

/// Print events until no session is left running. Ctrl-C cancels everything
/// still tracked; returns false in that case.
async fn follow(tracker: &JobTracker, events: &mut UnboundedReceiver<UiEvent>) -> Result<bool> {
    loop {
        // sessions are removed before their final events are sent, so once
        // nothing is active every remaining event is already queued
        while let Ok(event) = events.try_recv() {
            print_event(&event);
        }
        if tracker.active_sessions().is_empty() {
            return Ok(true);
        }

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => print_event(&event),
                None => bail!("Tracker event channel closed"),
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                let cancelled = tracker.cancel_all();
                println!("\n🛑 Interrupted, stopped tracking {} job(s)", cancelled);
                return Ok(false);
            }
        }
    }
}

fn print_event(event: &UiEvent) {
    match event {
        UiEvent::Notify { level, message } => match level {
            NotifyLevel::Info => println!("ℹ️  {}", message),
            NotifyLevel::Success => println!("✅ {}", message),
            NotifyLevel::Error => println!("❌ {}", message),
        },
        other => debug!(event = ?other, "Tracker event"),
    }
}

fn print_outcome(outcome: &Outcome) {
    println!(
        "\n📋 Job {}: {}{}",
        outcome.job_id,
        outcome.status,
        outcome.pass_rate()
    );
    if let Some(message) = &outcome.error_message {
        println!("   {}", message);
    }

    for (i, case) in outcome.cases.iter().enumerate() {
        let mark = if case.status == "Accepted" { "✅" } else { "❌" };
        let sample = if case.is_sample { " (sample)" } else { "" };
        println!("  {} #{} {}{}", mark, i + 1, case.status, sample);
        println!("     input:    {}", case.input);
        println!("     expected: {}", case.expected_output);
        println!("     got:      {}", case.actual_output);
    }
}

/// Run or submit a source file and wait for the verdict
pub async fn execute(
    config: &ClientConfig,
    registry: &Registry,
    kind: JobKind,
    problem: u64,
    language: u64,
    file: &Path,
) -> Result<()> {
    let code = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let (tracker, mut events) = build_tracker(config, registry)?;

    println!(
        "🚀 {} {} on problem {} (language {})",
        if kind == JobKind::Run { "Running" } else { "Submitting" },
        file.display(),
        problem,
        language
    );

    let payload = SubmitPayload {
        problem_id: problem,
        language_id: language,
        code,
    };
    let job_id = tracker
        .submit(kind, SubjectKey::workbench(), payload)
        .await
        .context("Judge did not accept the job")?;
    println!("⏳ Job {} accepted, waiting for a verdict...", job_id);

    if !follow(&tracker, &mut events).await? {
        return Ok(());
    }

    let view = tracker.view();
    let outcome = match kind {
        JobKind::Run => view.last_run.as_ref(),
        _ => view.history.last(),
    };
    match outcome {
        Some(outcome) => print_outcome(outcome),
        None => println!("⚠️  Job {} has no verdict yet, check again later", job_id),
    }

    Ok(())
}

fn language_subject(language: u64) -> SubjectKey {
    SubjectKey::new(format!("language-{}", language))
}

/// Validate every language concurrently and report whether publishing unlocks
pub async fn validate(
    config: &ClientConfig,
    registry: &Registry,
    problem: u64,
    languages: &[u64],
) -> Result<()> {
    let (tracker, mut events) = build_tracker(config, registry)?;
    println!(
        "🧪 Validating problem {} in {} language(s)",
        problem,
        languages.len()
    );

    for &language in languages {
        let subject = language_subject(language);
        let payload = SubmitPayload {
            problem_id: problem,
            language_id: language,
            code: String::new(),
        };
        match tracker.submit(JobKind::Validate, subject.clone(), payload).await {
            Ok(job_id) => println!("⏳ {}: job {} queued", subject, job_id),
            Err(e) => println!("❌ {}: {}", subject, e),
        }
    }

    if !follow(&tracker, &mut events).await? {
        return Ok(());
    }

    let view = tracker.view();
    println!("\n📋 Validation summary:");
    for (subject, state) in &view.validations {
        match state {
            ValidationState::Passed => println!("  ✅ {}", subject),
            ValidationState::Failed { reason } => println!("  ❌ {}: {}", subject, reason),
            ValidationState::InProgress => println!("  ⏳ {}: still running", subject),
            ValidationState::Abandoned => println!("  ⏹️  {}: stopped before a verdict", subject),
        }
    }

    if view.publish_enabled() {
        println!("\n🚀 Every language passed, the problem can be published");
    } else {
        println!("\n⚠️  Publishing stays locked until every language passes");
    }

    Ok(())
}

/// Poll boilerplate generation until the expected count shows up or attempts run out
pub async fn boilerplates(
    config: &ClientConfig,
    registry: &Registry,
    problem: u64,
    expect: u32,
) -> Result<()> {
    let (tracker, mut events) = build_tracker(config, registry)?;
    println!(
        "🔧 Waiting for {} boilerplate(s) on problem {}",
        expect, problem
    );
    tracker.track_boilerplates(problem, expect);

    if !follow(&tracker, &mut events).await? {
        return Ok(());
    }

    match tracker.view().boilerplates.get(&problem) {
        Some(stats) => println!(
            "📦 {} language(s): {}",
            stats.total_languages,
            stats.languages.join(", ")
        ),
        None => println!("⚠️  The judge never reported boilerplate progress"),
    }

    Ok(())
}

/// `name` or `name:type`; the type defaults to string
pub fn parse_params(raw: &[String]) -> Result<Vec<Parameter>> {
    raw.iter()
        .map(|arg| {
            let (name, param_type) = arg.split_once(':').unwrap_or((arg.as_str(), "string"));
            let name = name.trim();
            if name.is_empty() {
                bail!("Parameter '{}' has no name", arg);
            }
            Ok(Parameter::new(name, param_type.trim()))
        })
        .collect()
}

/// Canonical test cases go to stdout as JSON; the summary goes to stderr
pub fn import(file: &Path, parameters: &[Parameter]) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let cases = import_test_cases(&raw, parameters)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    let samples = cases.iter().filter(|c| c.is_sample).count();
    let hidden = cases.iter().filter(|c| c.is_hidden).count();
    eprintln!(
        "✅ Imported {} test case(s) ({} sample, {} hidden)",
        cases.len(),
        samples,
        hidden
    );

    let json = serde_json::to_string_pretty(&cases).context("Failed to serialize test cases")?;
    println!("{}", json);
    Ok(())
}

pub fn template(parameters: &[Parameter], return_type: Option<&str>) {
    println!("{}", generate_template(parameters, return_type));
}

pub fn print_metrics(registry: &Registry) -> Result<()> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    eprint!("{}", String::from_utf8_lossy(&buffer));
    Ok(())
}

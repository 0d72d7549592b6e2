//! Client-side tracking of judge jobs: submit, poll until settled, reconcile.

pub mod api;
pub mod client;
pub mod error;
pub mod importer;
pub mod metrics;
pub mod reconciler;
pub mod registry;
pub mod session;
pub mod tracker;

mod scheduler;
#[cfg(test)]
mod scheduler_tests;

pub use api::{JobSnapshot, JobSubmitter, JudgeApi, StatusFetcher, SubmitReceipt};
pub use client::JudgeClient;
pub use error::{FetchError, ParseError, SubmissionError};
pub use metrics::TrackerMetrics;
pub use reconciler::{NotifyLevel, Outcome, UiEvent, ValidationState, Verdict, ViewState};
pub use session::{SessionExit, SessionSnapshot};
pub use tracker::JobTracker;

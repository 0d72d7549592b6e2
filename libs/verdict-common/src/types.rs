use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque job handle assigned by the judge at submission time.
/// The admin API hands out integers, some endpoints hand out strings;
/// both round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Numeric(id) => write!(f, "{}", id),
            JobId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        JobId::Numeric(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        JobId::Text(id.to_string())
    }
}

/// Key under which concurrently tracked jobs are told apart
/// (a language slug on the validation screen, a fixed slot on the workbench).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectKey(String);

impl SubjectKey {
    pub const WORKBENCH: &'static str = "workbench";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Single slot used by the run/submit workbench
    pub fn workbench() -> Self {
        Self(Self::WORKBENCH.to_string())
    }

    /// Slot used by boilerplate-generation polling for one problem
    pub fn boilerplates(problem_id: u64) -> Self {
        Self(format!("boilerplates:{}", problem_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SubjectKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Run,
    Submit,
    Validate,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobKind::Run => "run",
            JobKind::Submit => "submit",
            JobKind::Validate => "validate",
        };
        f.write_str(s)
    }
}

/// Submission status as reported by the judge.
///
/// The judge speaks in display strings (`"Wrong Answer"`, `"Time Limit Exceeded"`).
/// Anything outside the known vocabulary lands in `Other` and is treated as a
/// terminal failure whose reason is the raw string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubmissionStatus {
    Pending,
    Processing,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    CompilationError,
    InternalError,
    Other(String),
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SubmissionStatus::Pending => "Pending",
            SubmissionStatus::Processing => "Processing",
            SubmissionStatus::Accepted => "Accepted",
            SubmissionStatus::WrongAnswer => "Wrong Answer",
            SubmissionStatus::TimeLimitExceeded => "Time Limit Exceeded",
            SubmissionStatus::MemoryLimitExceeded => "Memory Limit Exceeded",
            SubmissionStatus::RuntimeError => "Runtime Error",
            SubmissionStatus::CompilationError => "Compilation Error",
            SubmissionStatus::InternalError => "Internal Error",
            SubmissionStatus::Other(raw) => raw,
        }
    }

    /// No further state change happens after a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending | SubmissionStatus::Processing)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionStatus::Accepted)
    }
}

impl From<String> for SubmissionStatus {
    fn from(raw: String) -> Self {
        let folded: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "pending" | "queued" => SubmissionStatus::Pending,
            "processing" | "running" => SubmissionStatus::Processing,
            "accepted" => SubmissionStatus::Accepted,
            "wronganswer" => SubmissionStatus::WrongAnswer,
            "timelimitexceeded" => SubmissionStatus::TimeLimitExceeded,
            "memorylimitexceeded" => SubmissionStatus::MemoryLimitExceeded,
            "runtimeerror" => SubmissionStatus::RuntimeError,
            "compilationerror" => SubmissionStatus::CompilationError,
            "internalerror" => SubmissionStatus::InternalError,
            _ => SubmissionStatus::Other(raw),
        }
    }
}

impl From<&str> for SubmissionStatus {
    fn from(raw: &str) -> Self {
        SubmissionStatus::from(raw.to_string())
    }
}

impl From<SubmissionStatus> for String {
    fn from(status: SubmissionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One server-side execution request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub subject: SubjectKey,
    pub problem_id: u64,
    pub status: SubmissionStatus,
}

impl Job {
    pub fn new(id: JobId, kind: JobKind, subject: SubjectKey, problem_id: u64) -> Self {
        Self {
            id,
            kind,
            subject,
            problem_id,
            status: SubmissionStatus::Pending,
        }
    }

    /// Apply a freshly observed status.
    ///
    /// Returns false (and leaves the job untouched) when the move would go
    /// backwards: out of a terminal status, or from Processing to Pending.
    pub fn advance(&mut self, next: SubmissionStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if self.status == SubmissionStatus::Processing && next == SubmissionStatus::Pending {
            return false;
        }
        self.status = next;
        true
    }
}

/// What the caller hands to the submitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitPayload {
    pub problem_id: u64,
    pub language_id: u64,
    /// Empty for validation runs that use the stored reference solution
    #[serde(default)]
    pub code: String,
}

/// Terminal result body of `GET .../submissions/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    #[serde(default)]
    pub passed_test_cases: u32,
    #[serde(default)]
    pub total_test_cases: u32,
    #[serde(default, alias = "results")]
    pub test_case_results: Vec<TestCaseResult>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub expected_output: String,
    #[serde(default)]
    pub actual_output: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub is_sample: bool,
}

/// Body of `GET .../boilerplates/{problemId}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoilerplateStats {
    pub total_languages: u32,
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Function parameter as declared on a problem signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
        }
    }
}

/// Test case in the shape the test-case API accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTestCase {
    /// JSON-encoded positional argument array
    pub input: String,
    /// JSON-encoded return value
    pub expected_output: String,
    pub is_sample: bool,
    pub is_hidden: bool,
}

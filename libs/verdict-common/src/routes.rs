use crate::types::JobId;

/// Judge HTTP surface - defines only paths, no transport.
/// Keeps the submitter and the fetcher agreeing on where a job lives.

/// POST - execute against sample tests without persisting a submission
pub fn run_path(problem_id: u64) -> String {
    format!("/problems/{}/run", problem_id)
}

/// POST - create a graded submission
pub fn submit_path(problem_id: u64) -> String {
    format!("/problems/{}/submissions", problem_id)
}

/// POST - validate one language's reference solution against all test cases
pub fn validate_path(problem_id: u64, language_id: u64) -> String {
    format!(
        "/admin/problems/{}/languages/{}/validate",
        problem_id, language_id
    )
}

/// GET - current status of a submission, full result once terminal
pub fn submission_path(problem_id: u64, job_id: &JobId) -> String {
    format!("/problems/{}/submissions/{}", problem_id, job_id)
}

/// GET - how many languages have generated boilerplates
pub fn boilerplates_path(problem_id: u64) -> String {
    format!("/api/v2/problems/{}/boilerplates", problem_id)
}

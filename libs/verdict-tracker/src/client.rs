// HTTP implementation of the judge seams

use crate::api::{JobSnapshot, JobSubmitter, StatusFetcher, SubmitReceipt};
use crate::error::{FetchError, SubmissionError};
use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;
use verdict_common::config::ClientConfig;
use verdict_common::routes;
use verdict_common::types::{
    BoilerplateStats, Job, JobId, JobKind, SubjectKey, SubmissionStatus, SubmitPayload,
};

#[derive(Debug, Serialize)]
struct ExecuteBody<'a> {
    language_id: u64,
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct ValidateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
}

#[derive(Clone)]
pub struct JudgeClient {
    client: Client,
    config: ClientConfig,
}

impl JudgeClient {
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.config.url(path);
        debug!(%method, %url, "Judge request");

        let request = self.client.request(method, url);
        match &self.config.api_token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, SubmissionError> {
        let response = self
            .request(Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, path, "Submission request failed");
                SubmissionError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            error!(status = status.as_u16(), %message, "Judge rejected submission");
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SubmissionError::MalformedResponse(e.to_string()))?;
        Ok(unwrap_envelope(body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        serde_json::from_value(unwrap_envelope(body)).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl JobSubmitter for JudgeClient {
    async fn submit(
        &self,
        kind: JobKind,
        subject: &SubjectKey,
        payload: &SubmitPayload,
    ) -> Result<SubmitReceipt, SubmissionError> {
        let body = match kind {
            JobKind::Run => {
                let path = routes::run_path(payload.problem_id);
                self.post_json(&path, &execute_body(payload)).await?
            }
            JobKind::Submit => {
                let path = routes::submit_path(payload.problem_id);
                self.post_json(&path, &execute_body(payload)).await?
            }
            JobKind::Validate => {
                let path = routes::validate_path(payload.problem_id, payload.language_id);
                let code = Some(payload.code.as_str()).filter(|c| !c.trim().is_empty());
                self.post_json(&path, &ValidateBody { code }).await?
            }
        };

        let receipt = receipt_from_body(kind, subject, payload.problem_id, body)?;
        info!(
            job_id = %receipt.job.id,
            kind = %kind,
            subject = %subject,
            status = %receipt.job.status,
            "Job submitted"
        );
        Ok(receipt)
    }
}

#[async_trait]
impl StatusFetcher for JudgeClient {
    async fn fetch_status(&self, job: &Job) -> Result<JobSnapshot, FetchError> {
        let path = routes::submission_path(job.problem_id, &job.id);
        let body: Value = self.get_json(&path).await?;
        JobSnapshot::from_body(body)
    }

    async fn fetch_boilerplates(&self, problem_id: u64) -> Result<BoilerplateStats, FetchError> {
        self.get_json(&routes::boilerplates_path(problem_id)).await
    }
}

fn execute_body(payload: &SubmitPayload) -> ExecuteBody<'_> {
    ExecuteBody {
        language_id: payload.language_id,
        code: &payload.code,
    }
}

/// Admin endpoints wrap bodies in `{"data": ...}`, user endpoints do not
fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Turn a submission response into a job.
///
/// A missing status means the job was queued. A missing id is only tolerated
/// when the result is already terminal (inline run results carry no id).
fn receipt_from_body(
    kind: JobKind,
    subject: &SubjectKey,
    problem_id: u64,
    body: Value,
) -> Result<SubmitReceipt, SubmissionError> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .map(SubmissionStatus::from)
        .unwrap_or(SubmissionStatus::Pending);

    let id = body
        .get("id")
        .or_else(|| body.get("submission_id"))
        .and_then(|raw| serde_json::from_value::<JobId>(raw.clone()).ok());

    let id = match id {
        Some(id) => id,
        None if status.is_terminal() => JobId::Text(format!("local-{}", Uuid::new_v4())),
        None => {
            return Err(SubmissionError::MalformedResponse(
                "response carries no job id".to_string(),
            ))
        }
    };

    let mut job = Job::new(id, kind, subject.clone(), problem_id);
    job.advance(status.clone());

    Ok(SubmitReceipt {
        job,
        initial: JobSnapshot::new(status, body),
    })
}

async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(text)
}

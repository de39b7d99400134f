use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::core::config::{BackendSettings, Settings};
use crate::exam::submission::{SubmissionOutcome, SubmissionPayload};
use crate::schemas::exam::{ExamDefinition, ExamEnvelope, SubmissionReceipt};

/// External service that owns exam content and grades submissions.
#[async_trait]
pub(crate) trait GradingBackend: Send + Sync {
    async fn fetch_exam(&self, batch_id: &str) -> Result<ExamDefinition>;

    async fn submit_exam(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt>;
}

/// Folds a delivery attempt into the outcome recorded on the session. There is
/// no retry: failures end the session just like acceptance does.
pub(crate) fn outcome_of(result: Result<SubmissionReceipt>) -> SubmissionOutcome {
    match result {
        Ok(receipt) if receipt.success => SubmissionOutcome::Accepted {
            message: if receipt.message.is_empty() {
                "Exam submitted".to_string()
            } else {
                receipt.message
            },
            analysis: receipt.analysis,
        },
        Ok(receipt) => SubmissionOutcome::Rejected {
            message: if receipt.message.is_empty() {
                "Submission was rejected".to_string()
            } else {
                receipt.message
            },
        },
        Err(err) => SubmissionOutcome::Rejected { message: format!("{err:#}") },
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HttpGradingBackend {
    client: Client,
    settings: BackendSettings,
}

impl HttpGradingBackend {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let backend = settings.backend();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(backend.timeout_seconds))
            .build()
            .context("Failed to build grading backend HTTP client")?;

        Ok(Self {
            client,
            settings: backend.clone(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.settings.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.settings.token)
        }
    }
}

#[async_trait]
impl GradingBackend for HttpGradingBackend {
    async fn fetch_exam(&self, batch_id: &str) -> Result<ExamDefinition> {
        let endpoint = self.settings.endpoint(&["exams", "batch", batch_id])?;
        let response = self
            .authorize(self.client.get(endpoint))
            .send()
            .await
            .context("Failed to call grading backend exam endpoint")?;

        let (status, parsed) = read_json(response, "exam definition").await?;
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "Exam fetch failed for batch {} (status {}): {}",
                batch_id,
                status,
                extract_error_message(&parsed)
            ));
        }

        let envelope: ExamEnvelope = serde_json::from_value(parsed)
            .with_context(|| format!("Malformed exam definition for batch {batch_id}"))?;
        Ok(envelope.into_definition())
    }

    async fn submit_exam(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt> {
        let endpoint = self.settings.endpoint(&["exams", payload.exam_id.as_str(), "submit"])?;
        let response = self
            .authorize(self.client.post(endpoint).json(payload))
            .send()
            .await
            .context("Failed to reach grading backend")?;

        let (status, parsed) = read_json(response, "submission").await?;
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "Submission failed (status {}): {}",
                status,
                extract_error_message(&parsed)
            ));
        }

        serde_json::from_value(parsed).context("Malformed submission receipt")
    }
}

async fn read_json(response: Response, what: &str) -> Result<(reqwest::StatusCode, Value)> {
    let status = response.status();
    let raw_body = response
        .text()
        .await
        .with_context(|| format!("Failed to read grading backend {what} response"))?;

    let parsed = serde_json::from_str::<Value>(&raw_body).map_err(|err| {
        anyhow::anyhow!(
            "Grading backend returned non-JSON {} body (status {}): {}: {}",
            what,
            status,
            err,
            raw_body
        )
    })?;
    Ok((status, parsed))
}

fn extract_error_message(payload: &Value) -> String {
    if let Some(detail) = payload.get("detail").and_then(Value::as_str) {
        return detail.to_string();
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .unwrap_or("unknown_error")
        .to_string()
}

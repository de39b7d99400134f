use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::api::router::App;
use crate::core::{config::Settings, state::AppState};
use crate::exam::submission::SubmissionPayload;
use crate::schemas::exam::{ExamDefinition, SubmissionReceipt};
use crate::services::grading_backend::GradingBackend;

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: App,
    pub(crate) backend: Arc<FakeBackend>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("CONDUCTOR_ENV", "test");
    std::env::set_var("CONDUCTOR_STRICT_CONFIG", "0");
    std::env::remove_var("GRADING_BACKEND_URL");
    std::env::remove_var("GRADING_BACKEND_TOKEN");
    std::env::remove_var("MAX_ACTIVE_SESSIONS");
    std::env::remove_var("EXAM_TAB_SWITCH_POLICY");
    std::env::remove_var("EXAM_TAB_SWITCH_TOLERANCE");
    std::env::remove_var("API_V1_STR");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
}

pub(crate) async fn setup_test_context(backend: Arc<FakeBackend>) -> TestContext {
    setup_test_context_with_env(backend, &[]).await
}

pub(crate) async fn setup_test_context_with_env(
    backend: Arc<FakeBackend>,
    overrides: &[(&str, &str)],
) -> TestContext {
    let guard = env_lock().await;
    set_test_env();
    for (key, value) in overrides {
        std::env::set_var(key, value);
    }

    let settings = Settings::load().expect("settings");
    let state = AppState::new(settings, backend.clone());
    let app = api::router::router(state.clone());

    TestContext { state, app, backend, _guard: guard }
}

enum SubmitBehaviour {
    Accept,
    Refuse(String),
}

/// In-process grading backend: serves one exam by batch id and records completed
/// submissions.
pub(crate) struct FakeBackend {
    exam: Option<serde_json::Value>,
    behaviour: SubmitBehaviour,
    delay: Option<Duration>,
    submissions: AtomicUsize,
    last_payload: StdMutex<Option<serde_json::Value>>,
}

impl FakeBackend {
    pub(crate) fn accepting() -> Arc<Self> {
        Arc::new(Self::build(None, SubmitBehaviour::Accept))
    }

    pub(crate) fn rejecting(message: &str) -> Arc<Self> {
        Arc::new(Self::build(None, SubmitBehaviour::Refuse(message.to_string())))
    }

    pub(crate) fn serving(exam: serde_json::Value) -> Arc<Self> {
        Arc::new(Self::build(Some(exam), SubmitBehaviour::Accept))
    }

    fn build(exam: Option<serde_json::Value>, behaviour: SubmitBehaviour) -> Self {
        Self {
            exam,
            behaviour,
            delay: None,
            submissions: AtomicUsize::new(0),
            last_payload: StdMutex::new(None),
        }
    }

    /// Accepts submissions only after `delay`, like a grader under load.
    pub(crate) fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay: Some(delay), ..Self::build(None, SubmitBehaviour::Accept) })
    }

    pub(crate) fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub(crate) fn last_payload(&self) -> Option<serde_json::Value> {
        self.last_payload.lock().expect("payload lock").clone()
    }
}

#[async_trait]
impl GradingBackend for FakeBackend {
    async fn fetch_exam(&self, batch_id: &str) -> Result<ExamDefinition> {
        let exam = self
            .exam
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no exam published for batch {batch_id}"))?;
        Ok(serde_json::from_value(exam)?)
    }

    async fn submit_exam(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.submissions.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock().expect("payload lock") = Some(serde_json::to_value(payload)?);
        match &self.behaviour {
            SubmitBehaviour::Accept => Ok(SubmissionReceipt {
                success: true,
                message: "Exam submitted successfully".to_string(),
                analysis: Some(serde_json::json!({"answered": payload.answers.len()})),
            }),
            SubmitBehaviour::Refuse(message) => Err(anyhow::anyhow!(message.clone())),
        }
    }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}

/// Two easy MCQs and one hard coding question, 30 minutes overall.
pub(crate) fn sample_exam() -> serde_json::Value {
    serde_json::json!({
        "examId": "exam-http",
        "totalExamTime": 30,
        "subjects": [{
            "subject": "Programming",
            "MCQs": [
                {"_id": "m1", "question": "Output of print(2**3)?", "options": [
                    {"key": "a", "text": "6"}, {"key": "b", "text": "8"}
                ], "correctAnswer": "b", "difficulty": "easy", "score": 1},
                {"_id": "m2", "question": "Immutable type?", "options": [
                    {"key": "a", "text": "list"}, {"key": "b", "text": "tuple"}
                ], "correctAnswer": "b", "difficulty": "easy", "score": 1}
            ],
            "Coding": [{
                "_id": "c1",
                "title": "Sum",
                "problemStatement": "Read two integers and print their sum",
                "testCases": [{"input": "1 2", "expectedOutput": "3"}],
                "difficulty": "hard",
                "score": 10
            }],
            "timeConstraints": {"MCQs": {"easy": 4}, "Coding": {"hard": 15}}
        }]
    })
}

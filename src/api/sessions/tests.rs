use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::test_support::{self, FakeBackend, TestContext};

const SESSIONS: &str = "/api/v1/sessions";

async fn create(ctx: &TestContext, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, SESSIONS, Some(body)))
        .await
        .expect("create session");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn call(
    ctx: &TestContext,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, uri, body))
        .await
        .expect("response");
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return (status, serde_json::Value::Null);
    }
    (status, test_support::read_json(response).await)
}

async fn start_inline(ctx: &TestContext) -> String {
    let (status, body) = create(ctx, json!({"exam": test_support::sample_exam()})).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["session_id"].as_str().expect("session id").to_string()
}

#[tokio::test]
async fn inline_exam_starts_on_first_question() {
    let ctx = test_support::setup_test_context(FakeBackend::accepting()).await;

    let (status, body) = create(&ctx, json!({"exam": test_support::sample_exam()})).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["phase"], "in_progress");
    assert_eq!(body["exam_id"], "exam-http");
    assert_eq!(body["current_question"]["id"], "m1");
    assert_eq!(body["current_question"]["time_left"], 120);
    assert!(body["current_question"].get("correct_option").is_none());
    assert!(body["remaining_seconds"].as_i64().expect("remaining") > 1790);
    assert_eq!(body["palette"].as_array().expect("palette").len(), 3);
    assert_eq!(body["submission"]["state"], "not_submitted");
    assert_eq!(ctx.state.sessions().len().await, 1);
}

#[tokio::test]
async fn batch_id_fetches_exam_from_backend() {
    let ctx =
        test_support::setup_test_context(FakeBackend::serving(test_support::sample_exam())).await;

    let (status, body) = create(&ctx, json!({"batchId": "batch-42"})).await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["exam_id"], "exam-http");
}

#[tokio::test]
async fn unknown_batch_is_a_bad_gateway() {
    let ctx = test_support::setup_test_context(FakeBackend::accepting()).await;

    let (status, body) = create(&ctx, json!({"batchId": "missing"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], 502);
}

#[tokio::test]
async fn batch_id_with_path_characters_is_rejected() {
    let ctx =
        test_support::setup_test_context(FakeBackend::serving(test_support::sample_exam())).await;

    let (status, _) = create(&ctx, json!({"batchId": "../../admin/users?role=all"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ctx.state.sessions().len().await, 0);
}

#[tokio::test]
async fn create_requires_an_exam_source() {
    let ctx = test_support::setup_test_context(FakeBackend::accepting()).await;

    let (status, _) = create(&ctx, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut duplicate = test_support::sample_exam();
    duplicate["subjects"][0]["MCQs"][1]["_id"] = json!("m1");
    let (status, body) = create(&ctx, json!({"exam": duplicate})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().expect("detail").contains("m1"));
}

#[tokio::test]
async fn capacity_limit_returns_503() {
    let ctx = test_support::setup_test_context_with_env(
        FakeBackend::accepting(),
        &[("MAX_ACTIVE_SESSIONS", "1")],
    )
    .await;

    start_inline(&ctx).await;
    let (status, _) = create(&ctx, json!({"exam": test_support::sample_exam()})).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn answer_navigate_and_submit_once() {
    let ctx = test_support::setup_test_context(FakeBackend::accepting()).await;
    let id = start_inline(&ctx).await;
    let base = format!("{SESSIONS}/{id}");

    let (status, body) = call(
        &ctx,
        Method::POST,
        &format!("{base}/answers"),
        Some(json!({"question_id": "m1", "type": "mcq", "selected_option": "b"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["palette"][0]["answered"], true);
    assert_eq!(body["current_question"]["response"]["selected_option"], "b");

    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("{base}/answers"),
        Some(json!({"question_id": "m2", "type": "mcq", "selected_option": "a"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &ctx,
        Method::POST,
        &format!("{base}/navigation"),
        Some(json!({"action": "select", "questionId": "c1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_question"]["type"], "coding");
    assert!(body["current_question"].get("hidden_test_cases").is_none());
    assert_eq!(body["current_question"]["hidden_tests"], 1);

    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("{base}/answers"),
        Some(json!({
            "questionId": "c1",
            "type": "coding",
            "sourceCode": "a, b = map(int, input().split()); print(a + b)",
            "language": "python",
            "testCaseSummary": {"passed": 1, "failed": 0}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&ctx, Method::POST, &format!("{base}/submit"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["phase"], "ended");
    assert_eq!(body["submission"]["state"], "submitted");
    assert_eq!(body["submission"]["trigger"]["kind"], "manual");
    assert_eq!(ctx.backend.submissions(), 1);

    let payload = ctx.backend.last_payload().expect("payload");
    assert_eq!(payload["examId"], "exam-http");
    assert_eq!(payload["m1"], "b");
    assert_eq!(payload["c1"]["language"], "python");
    assert!(payload.get("m2").is_none());

    let (status, body) = call(&ctx, Method::POST, &format!("{base}/submit"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["submission"]["state"], "submitted");
    assert_eq!(ctx.backend.submissions(), 1);

    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("{base}/navigation"),
        Some(json!({"action": "next"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn tab_switch_ends_exam_immediately() {
    let ctx = test_support::setup_test_context(FakeBackend::accepting()).await;
    let id = start_inline(&ctx).await;
    let uri = format!("{SESSIONS}/{id}/integrity-events");

    let (status, body) =
        call(&ctx, Method::POST, &uri, Some(json!({"type": "context_menu"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verdict"]["verdict"], "suppressed");
    assert_eq!(body["session"]["phase"], "in_progress");

    let (status, body) =
        call(&ctx, Method::POST, &uri, Some(json!({"type": "visibility_hidden"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verdict"]["verdict"], "terminate");
    assert_eq!(body["verdict"]["violation"], "tab_switch");
    assert_eq!(body["session"]["phase"], "ended");
    assert_eq!(body["session"]["submission"]["trigger"]["kind"], "integrity");

    let (_, body) = call(
        &ctx,
        Method::POST,
        &uri,
        Some(json!({"type": "key_pressed", "key": "F12"})),
    )
    .await;
    assert_eq!(body["verdict"]["verdict"], "ignored");
    assert_eq!(ctx.backend.submissions(), 1);
}

#[tokio::test]
async fn warn_policy_tolerates_configured_switches() {
    let ctx = test_support::setup_test_context_with_env(
        FakeBackend::accepting(),
        &[("EXAM_TAB_SWITCH_POLICY", "warn"), ("EXAM_TAB_SWITCH_TOLERANCE", "1")],
    )
    .await;
    let id = start_inline(&ctx).await;
    let uri = format!("{SESSIONS}/{id}/integrity-events");

    let (_, first) = call(&ctx, Method::POST, &uri, Some(json!({"type": "visibility_hidden"}))).await;
    assert_eq!(first["verdict"]["verdict"], "warned");
    assert_eq!(first["session"]["integrity"]["tab_switches"], 1);

    let (_, second) =
        call(&ctx, Method::POST, &uri, Some(json!({"type": "visibility_hidden"}))).await;
    assert_eq!(second["verdict"]["verdict"], "terminate");
    assert_eq!(ctx.backend.submissions(), 1);
}

#[tokio::test]
async fn failed_submission_is_reported_in_view() {
    let ctx = test_support::setup_test_context(FakeBackend::rejecting("grader unavailable")).await;
    let id = start_inline(&ctx).await;

    let (status, body) = call(&ctx, Method::POST, &format!("{SESSIONS}/{id}/submit"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "ended");
    assert_eq!(body["submission"]["state"], "failed");
    assert!(body["submission"]["message"].as_str().expect("message").contains("grader unavailable"));
}

#[tokio::test]
async fn delete_tears_session_down() {
    let ctx = test_support::setup_test_context(FakeBackend::accepting()).await;
    let id = start_inline(&ctx).await;
    let uri = format!("{SESSIONS}/{id}");

    let (status, _) = call(&ctx, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&ctx, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(ctx.state.sessions().len().await, 0);
    assert_eq!(ctx.backend.submissions(), 0);
}

#[tokio::test]
async fn malformed_session_id_is_not_found() {
    let ctx = test_support::setup_test_context(FakeBackend::accepting()).await;

    let (status, _) = call(&ctx, Method::GET, &format!("{SESSIONS}/not-a-uuid"), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

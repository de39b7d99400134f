use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::exam::ExamDefinition;
use crate::schemas::session::CreateSessionRequest;
use crate::services::session_runtime::SessionHandle;

pub(super) async fn find_session(state: &AppState, raw_id: &str) -> Result<SessionHandle, ApiError> {
    let not_found = || ApiError::NotFound(format!("Session {raw_id} not found"));
    let id = Uuid::parse_str(raw_id).map_err(|_| not_found())?;
    state.sessions().get(id).await.ok_or_else(not_found)
}

/// Inline definitions are used as-is; otherwise the batch is fetched upstream.
pub(super) async fn resolve_definition(
    state: &AppState,
    request: CreateSessionRequest,
) -> Result<ExamDefinition, ApiError> {
    if let Some(exam) = request.exam {
        return Ok(exam);
    }

    let batch_id = request
        .batch_id
        .ok_or_else(|| ApiError::BadRequest("batch_id or exam is required".to_string()))?;
    state
        .backend()
        .fetch_exam(&batch_id)
        .await
        .map_err(|err| ApiError::upstream(err, "Failed to load exam definition"))
}

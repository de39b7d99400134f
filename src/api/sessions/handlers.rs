use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::core::time::SessionClock;
use crate::exam::monitor::IntegritySignal;
use crate::exam::navigation::NavigationRequest;
use crate::exam::session::{Command, ExamSession};
use crate::exam::ExamError;
use crate::schemas::session::{
    AnswerRequest, CreateSessionRequest, IntegrityEventResponse, SessionView,
};
use crate::services::session_runtime::SessionHandle;

use super::helpers::{find_session, resolve_definition};

pub(super) async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.sessions().ensure_capacity().await?;

    let definition = resolve_definition(&state, payload).await?;
    definition.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let clock = SessionClock::start();
    let session = ExamSession::from_definition(
        definition,
        clock.now(),
        state.settings().exam().tab_switch_policy,
    )?;
    let (handle, _) = SessionHandle::launch(session, state.backend(), clock).await?;

    if let Err(err) = state.sessions().insert(handle.clone()).await {
        handle.tear_down().await;
        return Err(err.into());
    }

    Ok((StatusCode::CREATED, Json(handle.view().await)))
}

pub(super) async fn get_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    Ok(Json(handle.view().await))
}

pub(super) async fn record_answer(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    handle
        .dispatch(Command::Answer { question_id: payload.question_id, response: payload.response })
        .await?;
    Ok(Json(handle.view().await))
}

pub(super) async fn navigate(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<NavigationRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    handle.dispatch(Command::Navigate(payload)).await?;
    Ok(Json(handle.view().await))
}

pub(super) async fn report_integrity_event(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(signal): Json<IntegritySignal>,
) -> Result<Json<IntegrityEventResponse>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    let verdict = handle.report(signal).await?;
    Ok(Json(IntegrityEventResponse { verdict, session: handle.view().await }))
}

/// Repeated submits are not errors: the caller gets the state of the first one.
pub(super) async fn submit_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    match handle.dispatch(Command::Submit).await {
        Ok(_) | Err(ExamError::SessionEnded) => Ok(Json(handle.view().await)),
        Err(err) => Err(err.into()),
    }
}

pub(super) async fn delete_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let handle = find_session(&state, &session_id).await?;
    handle.tear_down().await;
    state.sessions().remove(handle.id()).await;
    Ok(StatusCode::NO_CONTENT)
}

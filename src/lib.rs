pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod exam;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Request, ServiceExt};

use crate::core::{config::Settings, shutdown::ShutdownNotifier, state::AppState, telemetry};
use crate::services::grading_backend::HttpGradingBackend;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let backend = Arc::new(HttpGradingBackend::from_settings(&settings)?);
    let state = AppState::new(settings, backend);

    let (notifier, shutdown_rx) = ShutdownNotifier::new();
    let exam = state.settings().exam();
    let sweeper = tokio::spawn(tasks::sweeper::run(
        state.sessions().clone(),
        Duration::from_secs(exam.sweep_interval_seconds),
        Duration::from_secs(exam.ended_retention_seconds),
        shutdown_rx,
    ));

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        backend = %state.settings().backend().base_url,
        "Exam conductor listening"
    );

    let result =
        axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
            .with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    notifier.notify();
    if let Err(err) = sweeper.await {
        tracing::error!(error = %err, "Session sweeper task failed");
    }
    let sessions = state.sessions().len().await;
    tracing::info!(sessions, "Exam conductor stopped");

    result?;

    Ok(())
}

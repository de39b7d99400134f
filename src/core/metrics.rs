use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }
    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    metrics::describe_counter!("http_requests_total", "HTTP responses by status");
    metrics::describe_histogram!("http_request_duration_seconds", "HTTP request latency");
    metrics::describe_counter!("exam_sessions_started_total", "Exam sessions started");
    metrics::describe_counter!(
        "exam_questions_locked_total",
        "Questions locked because their time budget ran out"
    );
    metrics::describe_counter!(
        "exam_integrity_events_total",
        "Integrity signals by kind and verdict"
    );
    metrics::describe_counter!("exam_submissions_total", "Submissions by trigger and outcome");
    metrics::describe_gauge!("exam_sessions_active", "Sessions held in memory");
}

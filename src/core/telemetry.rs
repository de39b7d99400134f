use anyhow::Context;
use tracing_subscriber::{fmt, fmt::format::FmtSpan, EnvFilter};

use crate::core::config::Settings;

const QUIET_DEPENDENCIES: &str = "hyper=warn,reqwest=warn,tower_http=info";

pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = build_filter(&settings.telemetry().log_level)?;
    let builder =
        fmt().with_env_filter(filter).with_target(false).with_span_events(FmtSpan::CLOSE);

    let result = if settings.telemetry().json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.compact().try_init()
    };
    result.map_err(|err| anyhow::anyhow!(err.to_string()))?;

    tracing::debug!(
        level = %settings.telemetry().log_level,
        json = settings.telemetry().json,
        "tracing initialised"
    );
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level with noisy HTTP crates held back.
fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(format!("{level},{QUIET_DEPENDENCIES}"))
        .with_context(|| format!("invalid log level: {level}"))
}

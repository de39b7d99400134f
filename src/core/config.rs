mod parsing;
mod settings;
mod types;

pub(crate) use types::{
    ApiSettings, BackendSettings, ConfigError, CorsSettings, Environment, ExamSettings,
    RuntimeSettings, Settings, TelemetrySettings,
};

use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment,
    parse_tab_switch_policy, parse_u32, parse_u64, parse_usize,
};
use super::types::{
    ApiSettings, BackendSettings, ConfigError, CorsSettings, ExamSettings, RuntimeSettings,
    ServerHost, ServerPort, ServerSettings, Settings, TelemetrySettings,
};

const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/api";

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("CONDUCTOR_HOST", "0.0.0.0");
        let port = env_or_default("CONDUCTOR_PORT", "8000");

        let environment = parse_environment(
            env_optional("CONDUCTOR_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("CONDUCTOR_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Exam Conductor");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let explicit_backend_url = env_optional("GRADING_BACKEND_URL");
        let backend_timeout_seconds = parse_u64(
            "GRADING_BACKEND_TIMEOUT_SECONDS",
            env_or_default("GRADING_BACKEND_TIMEOUT_SECONDS", "30"),
        )?;

        let max_active_sessions =
            parse_usize("MAX_ACTIVE_SESSIONS", env_or_default("MAX_ACTIVE_SESSIONS", "500"))?;
        let tab_switch_tolerance = parse_u32(
            "EXAM_TAB_SWITCH_TOLERANCE",
            env_or_default("EXAM_TAB_SWITCH_TOLERANCE", "2"),
        )?;
        let tab_switch_policy =
            parse_tab_switch_policy(env_optional("EXAM_TAB_SWITCH_POLICY"), tab_switch_tolerance)?;
        let ended_retention_seconds = parse_u64(
            "EXAM_ENDED_RETENTION_SECONDS",
            env_or_default("EXAM_ENDED_RETENTION_SECONDS", "300"),
        )?;
        let sweep_interval_seconds = parse_u64(
            "EXAM_SWEEP_INTERVAL_SECONDS",
            env_or_default("EXAM_SWEEP_INTERVAL_SECONDS", "30"),
        )?;

        let log_level = env_or_default("CONDUCTOR_LOG_LEVEL", "info");
        let json = env_optional("CONDUCTOR_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            backend: BackendSettings {
                explicit_url: explicit_backend_url.is_some(),
                base_url: explicit_backend_url.unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
                token: env_or_default("GRADING_BACKEND_TOKEN", ""),
                timeout_seconds: backend_timeout_seconds,
            },
            exam: ExamSettings {
                max_active_sessions,
                tab_switch_policy,
                ended_retention_seconds,
                sweep_interval_seconds,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn backend(&self) -> &BackendSettings {
        &self.backend
    }

    pub(crate) fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.api.api_v1_str.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "API_V1_STR",
                value: self.api.api_v1_str.clone(),
            });
        }

        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_BACKEND_URL",
                value: self.backend.base_url.clone(),
            });
        }

        if self.backend.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_BACKEND_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.exam.max_active_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_ACTIVE_SESSIONS",
                value: "0".to_string(),
            });
        }

        if self.exam.sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_SWEEP_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if !self.backend.explicit_url {
            return Err(ConfigError::MissingSetting("GRADING_BACKEND_URL"));
        }

        Ok(())
    }
}

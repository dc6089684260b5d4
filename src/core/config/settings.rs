use std::path::PathBuf;

use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_u32, parse_u64,
};
#[cfg(test)]
use super::types::Environment;
use super::types::{
    ApiBaseUrl, ApiSettings, ConfigError, CredentialSettings, ExamSettings, RuntimeSettings,
    Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment = parse_environment(
            env_optional("EXAM_PORTAL_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("EXAM_PORTAL_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let base_url = env_or_default("EXAM_PORTAL_API_URL", "http://localhost:8080/api");
        let connect_timeout_seconds = parse_u64(
            "EXAM_PORTAL_CONNECT_TIMEOUT_SECONDS",
            env_or_default("EXAM_PORTAL_CONNECT_TIMEOUT_SECONDS", "10"),
        )?;
        let request_timeout_seconds = parse_u64(
            "EXAM_PORTAL_REQUEST_TIMEOUT_SECONDS",
            env_or_default("EXAM_PORTAL_REQUEST_TIMEOUT_SECONDS", "30"),
        )?;

        let credentials_path = PathBuf::from(env_or_default(
            "EXAM_PORTAL_CREDENTIALS_PATH",
            ".exam-portal/credentials.json",
        ));

        let autosave_max_retries = parse_u32(
            "EXAM_PORTAL_AUTOSAVE_MAX_RETRIES",
            env_or_default("EXAM_PORTAL_AUTOSAVE_MAX_RETRIES", "3"),
        )?;
        let autosave_backoff_ms = parse_u64(
            "EXAM_PORTAL_AUTOSAVE_BACKOFF_MS",
            env_or_default("EXAM_PORTAL_AUTOSAVE_BACKOFF_MS", "500"),
        )?;
        let timer_warning_seconds = parse_u64(
            "EXAM_PORTAL_TIMER_WARNING_SECONDS",
            env_or_default("EXAM_PORTAL_TIMER_WARNING_SECONDS", "300"),
        )?;

        let log_level = env_or_default("EXAM_PORTAL_LOG_LEVEL", "info");
        let json = env_optional("EXAM_PORTAL_LOG_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings {
                base_url: ApiBaseUrl::parse(base_url)?,
                connect_timeout_seconds,
                request_timeout_seconds,
            },
            credentials: CredentialSettings { path: credentials_path },
            exam: ExamSettings { autosave_max_retries, autosave_backoff_ms, timer_warning_seconds },
            telemetry: TelemetrySettings { log_level, json },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn credentials(&self) -> &CredentialSettings {
        &self.credentials
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

    /// Settings pointing at a local mock backend, with fast autosave retries.
    #[cfg(test)]
    pub(crate) fn for_tests(base_url: &str, credentials_path: PathBuf) -> Self {
        Self {
            runtime: RuntimeSettings { environment: Environment::Test, strict_config: false },
            api: ApiSettings {
                base_url: ApiBaseUrl(base_url.trim_end_matches('/').to_string()),
                connect_timeout_seconds: 2,
                request_timeout_seconds: 5,
            },
            credentials: CredentialSettings { path: credentials_path },
            exam: ExamSettings {
                autosave_max_retries: 2,
                autosave_backoff_ms: 5,
                timer_warning_seconds: 300,
            },
            telemetry: TelemetrySettings { log_level: "debug".to_string(), json: false },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_PORTAL_REQUEST_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.api.connect_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_PORTAL_CONNECT_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.credentials.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_PORTAL_CREDENTIALS_PATH",
                value: String::from("<empty>"),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if !self.api.base_url.is_https() {
            return Err(ConfigError::InsecureApiUrl(self.api.base_url().to_string()));
        }

        Ok(())
    }
}

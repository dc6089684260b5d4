use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) credentials: CredentialSettings,
    pub(super) exam: ExamSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(super) base_url: ApiBaseUrl,
    pub(crate) connect_timeout_seconds: u64,
    pub(crate) request_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct CredentialSettings {
    pub(crate) path: PathBuf,
}

#[derive(Debug, Clone)]
pub(crate) struct ExamSettings {
    pub(crate) autosave_max_retries: u32,
    pub(crate) autosave_backoff_ms: u64,
    pub(crate) timer_warning_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Normalized API root, always without a trailing slash.
#[derive(Debug, Clone)]
pub(crate) struct ApiBaseUrl(pub(super) String);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid api url: {0}")]
    InvalidApiUrl(String),
    #[error("api url must use https in strict mode: {0}")]
    InsecureApiUrl(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl ApiSettings {
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url.0
    }
}

impl ApiBaseUrl {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        let trimmed = value.trim().trim_end_matches('/');
        let parsed =
            reqwest::Url::parse(trimmed).map_err(|_| ConfigError::InvalidApiUrl(value.clone()))?;

        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(ConfigError::InvalidApiUrl(value));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub(super) fn is_https(&self) -> bool {
        self.0.starts_with("https://")
    }
}
